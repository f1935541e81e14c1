//! Animation driver and the per-page 3D transform.

use log::{debug, trace};
use serde::Serialize;

use super::gesture::Resolution;
use super::signal::{FrameSnapshot, Signal, SignalReader};

/// Rotation parked on the previous page while it is out of view.
pub const PREVIOUS_PARKED_DEG: f64 = -110.0;
const ACTIVE_Z: i32 = 10;
const PREVIOUS_Z: i32 = 20;
const PARKED_Z: i32 = -1;
const HIDDEN_Z: i32 = -100;
const OFFSCREEN_X: f64 = 10_000.0;

/// Linear map of `x` from `input` onto `output`, clamped to `output`.
pub fn interpolate(x: f64, input: (f64, f64), output: (f64, f64)) -> f64 {
    let span = input.1 - input.0;
    if span == 0.0 {
        return output.0;
    }
    let t = ((x - input.0) / span).clamp(0.0, 1.0);
    output.0 + (output.1 - output.0) * t
}

pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// Not yet revealed, flat under the active page.
    Future,
    Active,
    /// One behind the active page; swings back in on a backward drag.
    Previous,
    Hidden,
}

pub fn regime(page: usize, position: f64) -> Regime {
    let offset = page as f64 - position;
    if offset > 0.0 {
        Regime::Future
    } else if offset == 0.0 {
        Regime::Active
    } else if offset == -1.0 {
        Regime::Previous
    } else {
        Regime::Hidden
    }
}

/// Style for one page in one frame. The rotation is applied as
/// `perspective, translateX(-pivot), rotateY, translateX(pivot)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageTransform {
    pub regime: Regime,
    pub perspective: Option<f64>,
    pub pivot: f64,
    pub rotate_y: f64,
    pub translate_x: f64,
    pub z_index: i32,
    pub opacity: f64,
}

impl PageTransform {
    fn flat(regime: Regime, z_index: i32) -> Self {
        Self {
            regime,
            perspective: None,
            pivot: 0.0,
            rotate_y: 0.0,
            translate_x: 0.0,
            z_index,
            opacity: 1.0,
        }
    }

    fn rotated(regime: Regime, rotate_y: f64, page_width: f64, perspective: f64) -> Self {
        Self {
            regime,
            perspective: Some(perspective),
            pivot: page_width / 2.0,
            rotate_y,
            translate_x: 0.0,
            z_index: ACTIVE_Z,
            opacity: 1.0,
        }
    }
}

/// Pure per-frame transform of page `page` for the given snapshot.
pub fn page_transform(
    page: usize,
    snap: FrameSnapshot,
    page_width: f64,
    perspective: f64,
) -> PageTransform {
    let drag = snap.drag;
    match regime(page, snap.position) {
        Regime::Future => PageTransform::flat(Regime::Future, -(page as i32)),
        Regime::Active => {
            if drag > 0.0 {
                // the previous page is falling back over this one
                return PageTransform::flat(Regime::Active, ACTIVE_Z);
            }
            let rotate_y = interpolate(drag, (0.0, -page_width), (0.0, -180.0));
            let mut t = PageTransform::rotated(Regime::Active, rotate_y, page_width, perspective);
            if rotate_y < -90.0 {
                t.opacity = 0.0;
            }
            t
        }
        Regime::Previous => {
            if drag <= 0.0 {
                return PageTransform {
                    regime: Regime::Previous,
                    perspective: None,
                    pivot: 0.0,
                    rotate_y: PREVIOUS_PARKED_DEG,
                    translate_x: 0.0,
                    z_index: PARKED_Z,
                    opacity: 0.0,
                };
            }
            let rotate_y = interpolate(drag, (0.0, page_width), (PREVIOUS_PARKED_DEG, 0.0));
            let mut t =
                PageTransform::rotated(Regime::Previous, rotate_y, page_width, perspective);
            t.z_index = PREVIOUS_Z;
            t
        }
        Regime::Hidden => PageTransform {
            regime: Regime::Hidden,
            perspective: None,
            pivot: 0.0,
            rotate_y: 0.0,
            translate_x: OFFSCREEN_X,
            z_index: HIDDEN_Z,
            opacity: 0.0,
        },
    }
}

pub type RunId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransitionKind {
    Commit(isize),
    Return,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    run: RunId,
    kind: TransitionKind,
    from: f64,
    to: f64,
    start_ms: u64,
    duration_ms: u64,
}

/// Terminal outcome of a transition that ran to completion. Produced
/// exactly once per run; interrupted runs produce nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Committed { run: RunId, index: usize },
    Returned { run: RunId },
}

/// Owns the position and drag signals and runs timed transitions on the
/// drag value. Position only moves when a commit settles.
#[derive(Debug)]
pub struct AnimationDriver {
    position: Signal,
    drag: Signal,
    transition: Option<Transition>,
    next_run: RunId,
    len: usize,
    page_width: f64,
}

impl AnimationDriver {
    pub fn new(len: usize, page_width: f64) -> Self {
        Self {
            position: Signal::new(0.0),
            drag: Signal::new(0.0),
            transition: None,
            next_run: 1,
            len,
            page_width,
        }
    }

    pub fn position_reader(&self) -> SignalReader {
        self.position.reader()
    }

    pub fn drag_reader(&self) -> SignalReader {
        self.drag.reader()
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot::new(self.position.get(), self.drag.get())
    }

    pub fn committed(&self) -> usize {
        self.position.get() as usize
    }

    pub fn drag(&self) -> f64 {
        self.drag.get()
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    pub fn page_width(&self) -> f64 {
        self.page_width
    }

    /// Live 1:1 drag tracking. Refused while a transition owns the drag value.
    pub fn track(&mut self, dx: f64) -> bool {
        if self.is_animating() {
            return false;
        }
        self.drag.set(dx);
        true
    }

    /// Animate the drag to the full page width in the resolution's direction.
    /// Returns `None` for `Cancel` or when the step would leave the catalog.
    pub fn start_commit(
        &mut self,
        resolution: Resolution,
        duration_ms: u64,
        now_ms: u64,
    ) -> Option<RunId> {
        let step = resolution.step();
        let target = self.committed() as isize + step;
        if step == 0 || target < 0 || target as usize >= self.len {
            return None;
        }
        let to = -(step as f64) * self.page_width;
        Some(self.start(TransitionKind::Commit(step), to, duration_ms, now_ms))
    }

    /// Ease the drag back to rest without changing the page.
    pub fn start_return(&mut self, duration_ms: u64, now_ms: u64) -> RunId {
        self.start(TransitionKind::Return, 0.0, duration_ms, now_ms)
    }

    fn start(&mut self, kind: TransitionKind, to: f64, duration_ms: u64, now_ms: u64) -> RunId {
        self.interrupt();
        let run = self.next_run;
        self.next_run += 1;
        let from = self.drag.get();
        debug!("animation: run {run} {kind:?} from {from:.1} to {to:.1} over {duration_ms}ms");
        self.transition = Some(Transition {
            run,
            kind,
            from,
            to,
            start_ms: now_ms,
            duration_ms,
        });
        run
    }

    /// Stop the running transition where it is. Its completion never fires.
    pub fn interrupt(&mut self) -> Option<RunId> {
        let t = self.transition.take()?;
        let w = self.page_width;
        let clamped = self.drag.get().clamp(-w, w);
        self.drag.set(clamped);
        debug!("animation: run {} interrupted at {clamped:.1}", t.run);
        Some(t.run)
    }

    /// Advance the running transition to `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> Option<Settled> {
        let t = self.transition?;
        let progress = if t.duration_ms == 0 {
            1.0
        } else {
            now_ms.saturating_sub(t.start_ms) as f64 / t.duration_ms as f64
        };
        if progress < 1.0 {
            let value = t.from + (t.to - t.from) * ease_out_cubic(progress);
            trace!("animation: run {} at {progress:.3} drag={value:.1}", t.run);
            self.drag.set(value);
            return None;
        }

        self.transition = None;
        self.drag.set(0.0);
        match t.kind {
            TransitionKind::Commit(step) => {
                let index = (self.committed() as isize + step) as usize;
                self.position.set(index as f64);
                Some(Settled::Committed { run: t.run, index })
            }
            TransitionKind::Return => Some(Settled::Returned { run: t.run }),
        }
    }

    /// New catalog: back to page 0, nothing in flight.
    pub fn reset(&mut self, len: usize) {
        self.interrupt();
        self.len = len;
        self.position.set(0.0);
        self.drag.set(0.0);
    }

    pub fn set_page_width(&mut self, page_width: f64) {
        self.interrupt();
        self.page_width = page_width;
        self.drag.set(0.0);
    }
}
