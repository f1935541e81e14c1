//! Flipbook engine: gesture interpretation, page-turn animation and the
//! per-frame page transforms derived from it.
//!
//! Two continuous values drive everything a frame shows:
//!   position : committed page index (changes only when a turn settles)
//!   drag     : horizontal displacement in surface pixels, 0 at rest
//!
//! `animation::page_transform` and `shadow::shadow_style` are pure functions
//! of a [`FrameSnapshot`] of those two values, so a frame can be evaluated on
//! any thread without touching controller state. Side effects (committing the
//! index, sound) happen only on the thread that owns the controller.

pub mod animation;
pub mod controller;
pub mod gesture;
pub mod page;
pub mod shadow;
pub mod signal;

use serde::Serialize;

pub use animation::{AnimationDriver, PageTransform, Settled, page_transform};
pub use controller::{FlipEvent, FlipbookController, Frame, PageFrame};
pub use gesture::{
    Bounds, GestureEvent, GestureInterpreter, PointerEvent, PointerKind, PointerRecognizer,
    Resolution,
};
pub use page::{PageContent, PageRenderer};
pub use shadow::{ShadowStyle, shadow_style};
pub use signal::{FrameSnapshot, Signal, SignalReader};

/// Drawable area of one page, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Surface {
    pub width: f64,
    pub height: f64,
}

impl Surface {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn orientation(&self) -> Orientation {
        if self.width > self.height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Page indices kept mounted around `committed`: `radius` each side,
/// clipped to `[0, len-1]`. Empty when `len == 0`.
pub fn window_set(committed: usize, len: usize, radius: usize) -> std::ops::Range<usize> {
    if len == 0 {
        return 0..0;
    }
    let committed = committed.min(len - 1);
    let lo = committed.saturating_sub(radius);
    let hi = (committed + radius + 1).min(len);
    lo..hi
}
