//! Multitouch slot tracking reduced to one primary pointer in surface pixels.

use std::time::Instant;

use crate::flipbook::{PointerEvent, PointerKind, Surface};

const MAX_SLOTS: usize = 10;

#[derive(Debug, Clone, Default)]
struct SlotState {
    tracking_id: i32, // -1 = inactive
    x_norm: f64,
    y_norm: f64,
    /// Set once any contact in this slot reported X. The kernel drops
    /// unchanged axis values, so a new contact may inherit it.
    x_known: bool,
    active: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self {
            min,
            max: max.max(min + 1),
        }
    }

    fn normalize(&self, raw: i32) -> f64 {
        ((raw - self.min) as f64 / (self.max - self.min) as f64).clamp(0.0, 1.0)
    }
}

impl Default for AxisRange {
    fn default() -> Self {
        Self::new(0, 4096)
    }
}

/// Follows the first finger down until it lifts; other fingers are ignored.
#[derive(Debug)]
pub struct Tracker {
    slots: Vec<SlotState>,
    cur_slot: usize,
    x_range: AxisRange,
    y_range: AxisRange,
    surface: Surface,
    epoch: Instant,
    primary: Option<usize>,
    last_sent: Option<(f64, f64)>,
}

impl Tracker {
    /// Timestamps are milliseconds since `epoch`, which should be the clock
    /// the animation is ticked against.
    pub fn new(surface: Surface, epoch: Instant) -> Self {
        Self {
            slots: vec![SlotState::default(); MAX_SLOTS],
            cur_slot: 0,
            x_range: AxisRange::default(),
            y_range: AxisRange::default(),
            surface,
            epoch,
            primary: None,
            last_sent: None,
        }
    }

    pub fn set_ranges(&mut self, x: AxisRange, y: AxisRange) {
        self.x_range = x;
        self.y_range = y;
    }

    pub fn set_surface(&mut self, surface: Surface) {
        self.surface = surface;
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub fn on_slot(&mut self, slot: i32) {
        self.cur_slot = slot.clamp(0, MAX_SLOTS as i32 - 1) as usize;
    }

    pub fn on_tracking_id(&mut self, tracking_id: i32) {
        let s = &mut self.slots[self.cur_slot];
        if tracking_id < 0 {
            s.tracking_id = -1;
            s.active = false;
        } else {
            s.tracking_id = tracking_id;
            s.active = true;
        }
    }

    pub fn on_pos_x(&mut self, raw: i32) {
        let nx = self.x_range.normalize(raw);
        let s = &mut self.slots[self.cur_slot];
        s.x_norm = nx;
        s.x_known = true;
    }

    pub fn on_pos_y(&mut self, raw: i32) {
        let ny = self.y_range.normalize(raw);
        let s = &mut self.slots[self.cur_slot];
        s.y_norm = ny;
    }

    pub fn on_syn_report(&mut self) -> Option<PointerEvent> {
        let now = self.now_ms();
        self.report_at(now)
    }

    /// Close one input frame and return the primary pointer's change, if any.
    pub fn report_at(&mut self, t_ms: u64) -> Option<PointerEvent> {
        match self.primary {
            None => {
                let slot = self
                    .slots
                    .iter()
                    .position(|s| s.active && s.tracking_id >= 0 && s.x_known)?;
                self.primary = Some(slot);
                Some(self.emit(PointerKind::Down, slot, t_ms))
            }
            Some(slot) if !self.slots[slot].active => {
                self.primary = None;
                let ev = self.emit(PointerKind::Up, slot, t_ms);
                self.last_sent = None;
                Some(ev)
            }
            Some(slot) => {
                let pos = self.position(slot);
                if self.last_sent == Some(pos) {
                    return None;
                }
                Some(self.emit(PointerKind::Move, slot, t_ms))
            }
        }
    }

    fn position(&self, slot: usize) -> (f64, f64) {
        let s = &self.slots[slot];
        (s.x_norm * self.surface.width, s.y_norm * self.surface.height)
    }

    fn emit(&mut self, kind: PointerKind, slot: usize, t_ms: u64) -> PointerEvent {
        let (x, y) = self.position(slot);
        self.last_sent = Some((x, y));
        PointerEvent { kind, x, y, t_ms }
    }
}
