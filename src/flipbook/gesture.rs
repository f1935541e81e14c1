use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::Thresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Down,
    Move,
    Up,
}

/// Raw pointer sample in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub t_ms: u64,
}

impl PointerEvent {
    pub fn down(x: f64, t_ms: u64) -> Self {
        Self { kind: PointerKind::Down, x, y: 0.0, t_ms }
    }

    pub fn moved(x: f64, t_ms: u64) -> Self {
        Self { kind: PointerKind::Move, x, y: 0.0, t_ms }
    }

    pub fn up(x: f64, t_ms: u64) -> Self {
        Self { kind: PointerKind::Up, x, y: 0.0, t_ms }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    /// Cumulative horizontal displacement since the contact went down.
    PanUpdate { dx: f64 },
    /// `vx` in px/s, negative towards the left.
    PanEnd { dx: f64, vx: f64 },
    /// Discrete tap at surface x.
    Tap { x: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    CommitForward,
    CommitBackward,
    Cancel,
}

impl Resolution {
    /// Signed page step this resolution commits to.
    pub fn step(self) -> isize {
        match self {
            Resolution::CommitForward => 1,
            Resolution::CommitBackward => -1,
            Resolution::Cancel => 0,
        }
    }
}

/// Which ends of the catalog the committed page touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub at_first: bool,
    pub at_last: bool,
}

impl Bounds {
    pub fn new(committed: usize, len: usize) -> Self {
        Self {
            at_first: committed == 0,
            at_last: committed + 1 >= len,
        }
    }
}

#[derive(Debug, Clone)]
struct Contact {
    start_ms: u64,
    start_x: f64,
    panning: bool,
    samples: VecDeque<(u64, f64)>,
}

impl Contact {
    fn new(ev: &PointerEvent) -> Self {
        let mut samples = VecDeque::with_capacity(16);
        samples.push_back((ev.t_ms, ev.x));
        Self {
            start_ms: ev.t_ms,
            start_x: ev.x,
            panning: false,
            samples,
        }
    }

    fn push(&mut self, ev: &PointerEvent, window_ms: u64) {
        self.samples.push_back((ev.t_ms, ev.x));
        while let Some(&(t0, _)) = self.samples.front() {
            if ev.t_ms.saturating_sub(t0) > window_ms && self.samples.len() > 2 {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn velocity(&self) -> f64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(&(t0, x0)), Some(&(t1, x1))) if t1 > t0 => {
                (x1 - x0) / ((t1 - t0) as f64 / 1000.0)
            }
            _ => 0.0,
        }
    }
}

/// Turns a single-contact pointer stream into pan and tap gestures.
///
/// Pan and tap race for every contact. The pan recognizer claims it as soon
/// as `|dx|` reaches `touch_slop` (reaching the slop exactly counts), and the
/// tap recognizer fails from then on. An unclaimed contact released within
/// `tap_ms` is a tap; anything else resolves to nothing.
#[derive(Debug)]
pub struct PointerRecognizer {
    touch_slop: f64,
    tap_ms: u64,
    velocity_window_ms: u64,
    contact: Option<Contact>,
}

impl PointerRecognizer {
    pub fn new(th: &Thresholds) -> Self {
        Self {
            touch_slop: th.touch_slop,
            tap_ms: th.tap_ms,
            velocity_window_ms: th.velocity_window_ms,
            contact: None,
        }
    }

    pub fn update_thresholds(&mut self, th: &Thresholds) {
        self.touch_slop = th.touch_slop;
        self.tap_ms = th.tap_ms;
        self.velocity_window_ms = th.velocity_window_ms;
    }

    pub fn is_tracking(&self) -> bool {
        self.contact.is_some()
    }

    pub fn reset(&mut self) {
        self.contact = None;
    }

    pub fn update(&mut self, ev: &PointerEvent) -> Option<GestureEvent> {
        match ev.kind {
            PointerKind::Down => {
                // a lost Up must not leave a pan hanging
                let abandoned = self.contact.take().filter(|c| c.panning).map(|c| {
                    let last_x = c.samples.back().map_or(c.start_x, |s| s.1);
                    GestureEvent::PanEnd {
                        dx: last_x - c.start_x,
                        vx: 0.0,
                    }
                });
                self.contact = Some(Contact::new(ev));
                abandoned
            }
            PointerKind::Move => {
                let window = self.velocity_window_ms;
                let slop = self.touch_slop;
                let c = self.contact.as_mut()?;
                c.push(ev, window);
                let dx = ev.x - c.start_x;
                if !c.panning && dx.abs() >= slop {
                    c.panning = true;
                }
                c.panning.then_some(GestureEvent::PanUpdate { dx })
            }
            PointerKind::Up => {
                let mut c = self.contact.take()?;
                c.push(ev, self.velocity_window_ms);
                let dx = ev.x - c.start_x;
                if c.panning {
                    Some(GestureEvent::PanEnd {
                        dx,
                        vx: c.velocity(),
                    })
                } else if ev.t_ms.saturating_sub(c.start_ms) <= self.tap_ms
                    && dx.abs() < self.touch_slop
                {
                    Some(GestureEvent::Tap { x: ev.x })
                } else {
                    None
                }
            }
        }
    }
}

/// Boundary clamping and end-of-gesture classification.
#[derive(Debug, Clone)]
pub struct GestureInterpreter {
    commit_fraction: f64,
    fling_velocity: f64,
}

impl GestureInterpreter {
    pub fn new(th: &Thresholds) -> Self {
        Self {
            commit_fraction: th.commit_fraction,
            fling_velocity: th.fling_velocity,
        }
    }

    pub fn update_thresholds(&mut self, th: &Thresholds) {
        self.commit_fraction = th.commit_fraction;
        self.fling_velocity = th.fling_velocity;
    }

    /// Drag offset to publish for a pan update, or `None` when the update
    /// would pull past the first or last page.
    pub fn on_pan_update(&self, dx: f64, bounds: Bounds) -> Option<f64> {
        if (bounds.at_last && dx < 0.0) || (bounds.at_first && dx > 0.0) {
            return None;
        }
        Some(dx)
    }

    pub fn classify_pan_end(&self, dx: f64, vx: f64, bounds: Bounds, page_width: f64) -> Resolution {
        let distance = self.commit_fraction * page_width;
        if (dx < -distance || vx < -self.fling_velocity) && !bounds.at_last {
            Resolution::CommitForward
        } else if (dx > distance || vx > self.fling_velocity) && !bounds.at_first {
            Resolution::CommitBackward
        } else {
            Resolution::Cancel
        }
    }

    /// Right half turns forward, left half turns back. `None` when the tap
    /// points past either end.
    pub fn classify_tap(&self, x: f64, bounds: Bounds, page_width: f64) -> Option<Resolution> {
        if x > page_width / 2.0 {
            (!bounds.at_last).then_some(Resolution::CommitForward)
        } else {
            (!bounds.at_first).then_some(Resolution::CommitBackward)
        }
    }
}
