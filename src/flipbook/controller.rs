//! Top-level flipbook: owns the committed page, wires gestures into the
//! animation driver, mounts the page window and fires page-turn feedback.

use log::{debug, info};
use serde::Serialize;
use std::ops::Range;
use std::sync::{Arc, mpsc};

use super::animation::{AnimationDriver, PageTransform, Settled, page_transform};
use super::gesture::{
    Bounds, GestureEvent, GestureInterpreter, PointerEvent, PointerKind, PointerRecognizer,
    Resolution,
};
use super::page::{PageContent, PageRenderer};
use super::shadow::{ShadowStyle, shadow_style};
use super::signal::{FrameSnapshot, SignalReader};
use super::{Surface, window_set};
use crate::audio::FeedbackGate;
use crate::catalog::CatalogItem;
use crate::config::Thresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FlipEvent {
    /// A page turn settled; `index` is the new committed page.
    Committed { index: usize },
    /// A gesture resolved without turning; the page eases back.
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageFrame {
    pub index: usize,
    pub content: Arc<PageContent>,
    pub transform: PageTransform,
    pub shadow: ShadowStyle,
}

/// Everything needed to paint one frame. `pages` is in paint order
/// (lowest z first).
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub snapshot: FrameSnapshot,
    pub committed: usize,
    pub pages: Vec<PageFrame>,
}

impl Frame {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// The page the reader currently sees on top, if any.
    pub fn top(&self) -> Option<&PageFrame> {
        self.pages.iter().rev().find(|p| p.transform.opacity > 0.0)
    }
}

/// Pure frame composition over the mounted pages.
pub fn compose_frame(
    mounted: &[(usize, Arc<PageContent>)],
    snapshot: FrameSnapshot,
    surface: Surface,
    perspective: f64,
) -> Vec<PageFrame> {
    let mut pages: Vec<PageFrame> = mounted
        .iter()
        .map(|(index, content)| PageFrame {
            index: *index,
            content: Arc::clone(content),
            transform: page_transform(*index, snapshot, surface.width, perspective),
            shadow: shadow_style(*index, snapshot, surface.width),
        })
        .collect();
    pages.sort_by_key(|p| p.transform.z_index);
    pages
}

pub struct FlipbookController {
    items: Vec<CatalogItem>,
    committed: usize,
    surface: Surface,
    th: Thresholds,
    recognizer: PointerRecognizer,
    interpreter: GestureInterpreter,
    driver: AnimationDriver,
    renderer: PageRenderer,
    mounted: Vec<(usize, Arc<PageContent>)>,
    feedback: FeedbackGate,
    contact_blocked: bool,
    listeners: Vec<mpsc::Sender<FlipEvent>>,
}

impl FlipbookController {
    pub fn new(
        items: Vec<CatalogItem>,
        surface: Surface,
        th: &Thresholds,
        feedback: FeedbackGate,
    ) -> Self {
        let driver = AnimationDriver::new(items.len(), surface.width);
        let mut c = Self {
            items,
            committed: 0,
            surface,
            th: th.clone(),
            recognizer: PointerRecognizer::new(th),
            interpreter: GestureInterpreter::new(th),
            driver,
            renderer: PageRenderer::new(),
            mounted: Vec::new(),
            feedback,
            contact_blocked: false,
            listeners: Vec::new(),
        };
        c.remount();
        c
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn committed_index(&self) -> usize {
        self.committed
    }

    pub fn drag_offset(&self) -> f64 {
        self.driver.drag()
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        self.driver.snapshot()
    }

    /// Readers for observers outside the logic thread.
    pub fn signals(&self) -> (SignalReader, SignalReader) {
        (self.driver.position_reader(), self.driver.drag_reader())
    }

    pub fn is_animating(&self) -> bool {
        self.driver.is_animating()
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    pub fn window(&self) -> Range<usize> {
        window_set(self.committed, self.items.len(), self.th.window_radius)
    }

    pub fn mounted_indices(&self) -> Vec<usize> {
        self.mounted.iter().map(|(i, _)| *i).collect()
    }

    pub fn renders(&self) -> u64 {
        self.renderer.renders()
    }

    pub fn feedback_played(&self) -> u64 {
        self.feedback.played()
    }

    pub fn subscribe(&mut self) -> mpsc::Receiver<FlipEvent> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }

    fn bounds(&self) -> Bounds {
        Bounds::new(self.committed, self.items.len())
    }

    /// Feed one raw pointer sample. Returns the resolution when the sample
    /// ended a gesture that was acted on.
    pub fn handle_pointer(&mut self, ev: &PointerEvent) -> Option<Resolution> {
        if self.is_empty() {
            return None;
        }
        let previous_blocked = self.contact_blocked;
        if ev.kind == PointerKind::Down {
            self.contact_blocked = self.driver.is_animating();
            if self.contact_blocked {
                debug!("flipbook: contact at {}ms ignored, transition in flight", ev.t_ms);
            }
        }
        let gesture = self.recognizer.update(ev)?;
        // a Down only ever yields the close of the previous contact
        let blocked = if ev.kind == PointerKind::Down {
            previous_blocked
        } else {
            self.contact_blocked
        };
        if blocked {
            return None;
        }
        self.handle_gesture(gesture, ev.t_ms)
    }

    pub fn handle_gesture(&mut self, gesture: GestureEvent, now_ms: u64) -> Option<Resolution> {
        if self.is_empty() || self.driver.is_animating() {
            return None;
        }
        let bounds = self.bounds();
        let width = self.surface.width;
        match gesture {
            GestureEvent::PanUpdate { dx } => {
                if let Some(drag) = self.interpreter.on_pan_update(dx, bounds) {
                    self.driver.track(drag);
                }
                None
            }
            GestureEvent::PanEnd { dx, vx } => {
                let resolution = self.interpreter.classify_pan_end(dx, vx, bounds, width);
                debug!("flipbook: pan end dx={dx:.1} vx={vx:.1} -> {resolution:?}");
                match resolution {
                    Resolution::Cancel => {
                        self.driver.start_return(self.th.cancel_ms, now_ms);
                        self.notify(FlipEvent::Cancelled);
                    }
                    _ => self.begin_commit(resolution, self.th.commit_ms, now_ms),
                }
                Some(resolution)
            }
            GestureEvent::Tap { x } => {
                let resolution = self.interpreter.classify_tap(x, bounds, width)?;
                debug!("flipbook: tap x={x:.1} -> {resolution:?}");
                self.begin_commit(resolution, self.th.tap_commit_ms, now_ms);
                Some(resolution)
            }
        }
    }

    fn begin_commit(&mut self, resolution: Resolution, duration_ms: u64, now_ms: u64) {
        if self
            .driver
            .start_commit(resolution, duration_ms, now_ms)
            .is_some()
        {
            self.feedback.trigger(now_ms);
        }
    }

    /// Advance animation to `now_ms`, apply any settled transition and
    /// return the frame to present.
    pub fn tick(&mut self, now_ms: u64) -> Frame {
        if let Some(settled) = self.driver.tick(now_ms) {
            self.on_settled(settled);
        }
        self.frame()
    }

    fn on_settled(&mut self, settled: Settled) {
        match settled {
            Settled::Committed { run, index } => {
                self.committed = index;
                self.remount();
                info!(
                    "flipbook: page {}/{} (run {run})",
                    index + 1,
                    self.items.len()
                );
                self.notify(FlipEvent::Committed { index });
            }
            Settled::Returned { run } => debug!("flipbook: run {run} returned to rest"),
        }
    }

    pub fn frame(&self) -> Frame {
        let snapshot = self.driver.snapshot();
        Frame {
            snapshot,
            committed: self.committed,
            pages: compose_frame(&self.mounted, snapshot, self.surface, self.th.perspective),
        }
    }

    /// Replace the catalog. Starts again at page 0 with nothing in flight.
    pub fn load(&mut self, items: Vec<CatalogItem>) {
        self.items = items;
        self.committed = 0;
        self.driver.reset(self.items.len());
        self.recognizer.reset();
        self.contact_blocked = false;
        self.renderer.clear();
        self.remount();
        info!("flipbook: loaded {} page(s)", self.items.len());
    }

    /// New surface size: any running transition stops and every mounted page
    /// is rendered again.
    pub fn resize(&mut self, surface: Surface) {
        self.surface = surface;
        self.driver.set_page_width(surface.width);
        self.recognizer.reset();
        self.renderer.clear();
        self.remount();
    }

    pub fn set_thresholds(&mut self, th: &Thresholds) {
        self.th = th.clone();
        self.interpreter.update_thresholds(th);
        self.recognizer.update_thresholds(th);
        self.feedback.set_debounce(th.sound_debounce_ms);
        self.remount();
    }

    fn remount(&mut self) {
        let window = self.window();
        self.renderer.retain(&window);
        let orientation = self.surface.orientation();
        let mut mounted = Vec::with_capacity(window.len());
        for index in window {
            let content = self.renderer.render(index, &self.items[index], orientation);
            mounted.push((index, content));
        }
        self.mounted = mounted;
    }

    fn notify(&mut self, event: FlipEvent) {
        self.listeners.retain(|tx| tx.send(event).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: f64 = 1000.0;

    fn items(n: usize) -> Vec<CatalogItem> {
        (0..n)
            .map(|i| CatalogItem::new(format!("P-{i}"), format!("https://img.invalid/{i}.jpg")))
            .collect()
    }

    fn book(n: usize) -> FlipbookController {
        FlipbookController::new(
            items(n),
            Surface::new(W, 1600.0),
            &Thresholds::default(),
            FeedbackGate::silent(200),
        )
    }

    #[test]
    fn empty_book_renders_nothing() {
        let mut b = book(0);
        assert!(b.tick(0).is_empty());
        assert_eq!(b.handle_gesture(GestureEvent::Tap { x: 900.0 }, 0), None);
        assert_eq!(b.handle_pointer(&PointerEvent::down(900.0, 0)), None);
        assert!(b.window().is_empty());
    }

    #[test]
    fn forward_pan_commits_once() {
        let mut b = book(3);
        let rx = b.subscribe();
        b.handle_gesture(GestureEvent::PanUpdate { dx: -0.4 * W }, 0);
        assert_eq!(b.drag_offset(), -0.4 * W);
        let r = b.handle_gesture(GestureEvent::PanEnd { dx: -0.4 * W, vx: 0.0 }, 0);
        assert_eq!(r, Some(Resolution::CommitForward));
        b.tick(150);
        assert_eq!(b.committed_index(), 0);
        b.tick(300);
        b.tick(316);
        assert_eq!(b.committed_index(), 1);
        assert_eq!(b.drag_offset(), 0.0);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![FlipEvent::Committed { index: 1 }]);
        assert_eq!(b.feedback_played(), 1);
    }

    #[test]
    fn short_pan_cancels_and_eases_back() {
        let mut b = book(3);
        let rx = b.subscribe();
        b.handle_gesture(GestureEvent::PanUpdate { dx: -0.1 * W }, 0);
        let r = b.handle_gesture(GestureEvent::PanEnd { dx: -0.1 * W, vx: 0.0 }, 0);
        assert_eq!(r, Some(Resolution::Cancel));
        b.tick(100);
        assert!(b.drag_offset() > -0.1 * W && b.drag_offset() < 0.0);
        b.tick(250);
        assert_eq!(b.drag_offset(), 0.0);
        assert_eq!(b.committed_index(), 0);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![FlipEvent::Cancelled]);
        assert_eq!(b.feedback_played(), 0);
    }

    #[test]
    fn gestures_ignored_while_animating() {
        let mut b = book(5);
        b.handle_gesture(GestureEvent::Tap { x: 900.0 }, 0);
        assert!(b.is_animating());
        assert_eq!(b.handle_gesture(GestureEvent::Tap { x: 900.0 }, 50), None);
        b.handle_gesture(GestureEvent::PanUpdate { dx: 300.0 }, 60);
        b.tick(600);
        assert_eq!(b.committed_index(), 1);
        assert_eq!(b.drag_offset(), 0.0);
    }

    #[test]
    fn contact_started_mid_transition_is_ignored_to_the_end() {
        let mut b = book(5);
        b.handle_gesture(GestureEvent::Tap { x: 900.0 }, 0);
        b.handle_pointer(&PointerEvent::down(900.0, 100));
        b.tick(600);
        assert!(!b.is_animating());
        b.handle_pointer(&PointerEvent::moved(400.0, 620));
        assert_eq!(b.handle_pointer(&PointerEvent::up(300.0, 640)), None);
        assert_eq!(b.drag_offset(), 0.0);
        assert_eq!(b.committed_index(), 1);
    }

    #[test]
    fn window_follows_commits() {
        let mut b = book(10);
        assert_eq!(b.mounted_indices(), vec![0, 1, 2]);
        for step in 0..4u64 {
            let t = step * 1_000;
            b.handle_gesture(GestureEvent::Tap { x: 900.0 }, t);
            b.tick(t + 600);
        }
        assert_eq!(b.committed_index(), 4);
        assert_eq!(b.mounted_indices(), vec![2, 3, 4, 5, 6]);
        // slots 2..=4 survived every remount without re-rendering
        assert_eq!(b.renders(), 7);
    }

    #[test]
    fn frame_orders_pages_for_painting() {
        let mut b = book(5);
        b.handle_gesture(GestureEvent::Tap { x: 900.0 }, 0);
        b.tick(600);
        b.handle_gesture(GestureEvent::PanUpdate { dx: 200.0 }, 700);
        let f = b.frame();
        let z: Vec<i32> = f.pages.iter().map(|p| p.transform.z_index).collect();
        let mut sorted = z.clone();
        sorted.sort();
        assert_eq!(z, sorted);
        // previous page swinging back in is on top
        assert_eq!(f.top().map(|p| p.index), Some(0));
    }

    #[test]
    fn load_resets_to_first_page() {
        let mut b = book(5);
        b.handle_gesture(GestureEvent::Tap { x: 900.0 }, 0);
        b.tick(600);
        b.handle_gesture(GestureEvent::Tap { x: 900.0 }, 1_000);
        b.load(items(2));
        assert_eq!(b.committed_index(), 0);
        assert!(!b.is_animating());
        b.tick(5_000);
        assert_eq!(b.committed_index(), 0);
        assert_eq!(b.mounted_indices(), vec![0, 1]);
    }

    #[test]
    fn resize_mid_turn_drops_commit_but_keeps_cue() {
        let mut b = book(3);
        let rx = b.subscribe();
        b.handle_gesture(GestureEvent::Tap { x: 900.0 }, 0);
        assert_eq!(b.feedback_played(), 1);
        b.tick(100);
        b.resize(Surface::new(1600.0, 1000.0));
        assert!(!b.is_animating());
        b.tick(2_000);
        assert_eq!(b.committed_index(), 0);
        assert_eq!(b.drag_offset(), 0.0);
        assert!(rx.try_iter().next().is_none());
        assert_eq!(b.feedback_played(), 1);
    }

    #[test]
    fn resize_rerenders_for_orientation() {
        let mut b = book(3);
        let before = b.renders();
        b.resize(Surface::new(1600.0, 1000.0));
        assert_eq!(b.renders(), before + 3);
        let f = b.frame();
        assert!(f.pages.iter().all(|p| p.content.padding == 50.0));
    }
}
