//! flipctl: a page-flip catalog viewer for Linux touch kiosks.

pub mod audio;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod flipbook;
pub mod input;
pub mod locale;
pub mod logging;
pub mod pipeline;
pub mod router;
pub mod session;
pub mod tracker;
pub mod watch;
