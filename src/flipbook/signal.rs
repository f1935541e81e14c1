//! Single-writer, multi-reader `f64` cells.
//!
//! A [`Signal`] is the only handle that can write; it is deliberately not
//! `Clone`. Any number of [`SignalReader`]s can be handed out, including to
//! other threads. Readers take one [`FrameSnapshot`] per frame and evaluate
//! every page against that immutable copy.

use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug)]
pub struct Signal {
    cell: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
pub struct SignalReader {
    cell: Arc<AtomicU64>,
}

impl Signal {
    pub fn new(value: f64) -> Self {
        Self {
            cell: Arc::new(AtomicU64::new(value.to_bits())),
        }
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.cell.load(Ordering::Acquire))
    }

    pub fn set(&mut self, value: f64) {
        self.cell.store(value.to_bits(), Ordering::Release);
    }

    pub fn reader(&self) -> SignalReader {
        SignalReader {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl SignalReader {
    pub fn get(&self) -> f64 {
        f64::from_bits(self.cell.load(Ordering::Acquire))
    }
}

/// Immutable copy of both continuous values, taken once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameSnapshot {
    pub position: f64,
    pub drag: f64,
}

impl FrameSnapshot {
    pub fn new(position: f64, drag: f64) -> Self {
        Self { position, drag }
    }

    pub fn capture(position: &SignalReader, drag: &SignalReader) -> Self {
        Self {
            position: position.get(),
            drag: drag.get(),
        }
    }

    pub fn at_rest(index: usize) -> Self {
        Self::new(index as f64, 0.0)
    }
}
