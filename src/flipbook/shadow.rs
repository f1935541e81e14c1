//! Paper-fold shading overlay, derived from the same snapshot as the page
//! transforms. Opacity only; always composited above the page it darkens.

use serde::Serialize;

use super::animation::interpolate;
use super::signal::FrameSnapshot;

const SHADOW_Z: i32 = 100;
const BENEATH_MAX: f64 = 0.5;
const FOLD_MAX: f64 = 0.15;
const COVER_MAX: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShadowStyle {
    pub opacity: f64,
    pub z_index: i32,
}

pub fn shadow_style(page: usize, snap: FrameSnapshot, page_width: f64) -> ShadowStyle {
    let offset = page as f64 - snap.position;
    let drag = snap.drag;

    let opacity = if offset == 1.0 && drag < 0.0 {
        // page being uncovered: darkest while the top page barely lifts
        interpolate(drag, (0.0, -page_width), (BENEATH_MAX, 0.0))
    } else if offset == 0.0 && drag < 0.0 {
        interpolate(drag, (0.0, -page_width / 2.0), (0.0, FOLD_MAX))
    } else if offset == 0.0 && drag > 0.0 {
        interpolate(drag, (0.0, page_width), (0.0, COVER_MAX))
    } else {
        0.0
    };

    ShadowStyle {
        opacity,
        z_index: SHADOW_Z,
    }
}
