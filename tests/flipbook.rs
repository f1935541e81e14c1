use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flipctl::audio::{AudioCue, FeedbackGate};
use flipctl::catalog::CatalogItem;
use flipctl::config::Thresholds;
use flipctl::flipbook::{
    FlipEvent, FlipbookController, FrameSnapshot, GestureEvent, PointerEvent, Resolution,
    Surface, page_transform, window_set,
};

const WIDTH: f64 = 1000.0;

struct CountingCue(Arc<AtomicUsize>);

impl AudioCue for CountingCue {
    fn play(&self) -> anyhow::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn items(n: usize) -> Vec<CatalogItem> {
    (0..n)
        .map(|i| CatalogItem::new(format!("C-{i}"), format!("https://img.invalid/{i}.jpg")))
        .collect()
}

fn book(n: usize) -> (FlipbookController, Arc<AtomicUsize>) {
    let plays = Arc::new(AtomicUsize::new(0));
    let th = Thresholds::default();
    let gate = FeedbackGate::new(Box::new(CountingCue(Arc::clone(&plays))), th.sound_debounce_ms);
    let fb = FlipbookController::new(items(n), Surface::new(WIDTH, 1600.0), &th, gate);
    (fb, plays)
}

fn settle(fb: &mut FlipbookController, from_ms: u64) -> u64 {
    let mut now = from_ms;
    while fb.is_animating() {
        now += 16;
        fb.tick(now);
    }
    now
}

#[test]
fn window_is_radius_two_clamped_to_catalog() {
    for n in 1..=8 {
        for committed in 0..n {
            let w = window_set(committed, n, 2);
            let expected: Vec<usize> = (0..n)
                .filter(|i| (*i as isize - committed as isize).abs() <= 2)
                .collect();
            assert_eq!(w.collect::<Vec<_>>(), expected, "n={n} committed={committed}");
        }
    }
}

#[test]
fn forward_drag_on_last_page_is_clamped() {
    let (mut fb, _) = book(3);
    fb.handle_gesture(GestureEvent::PanEnd { dx: -0.5 * WIDTH, vx: -900.0 }, 0);
    settle(&mut fb, 0);
    fb.handle_gesture(GestureEvent::PanEnd { dx: -0.5 * WIDTH, vx: -900.0 }, 1000);
    settle(&mut fb, 1000);
    assert_eq!(fb.committed_index(), 2);

    for dx in [-1.0, -300.0, -5000.0] {
        fb.handle_gesture(GestureEvent::PanUpdate { dx }, 3000);
        assert_eq!(fb.drag_offset(), 0.0);
    }
}

#[test]
fn backward_drag_on_first_page_is_clamped() {
    let (mut fb, _) = book(3);
    for dx in [1.0, 400.0, 5000.0] {
        fb.handle_gesture(GestureEvent::PanUpdate { dx }, 0);
        assert_eq!(fb.drag_offset(), 0.0);
    }
    assert_eq!(
        fb.handle_gesture(GestureEvent::PanEnd { dx: 400.0, vx: 900.0 }, 0),
        Some(Resolution::Cancel)
    );
}

#[test]
fn slow_drag_past_fraction_commits_once() {
    let (mut fb, plays) = book(3);
    let flips = fb.subscribe();

    fb.handle_gesture(GestureEvent::PanUpdate { dx: -0.4 * WIDTH }, 0);
    let r = fb.handle_gesture(GestureEvent::PanEnd { dx: -0.4 * WIDTH, vx: 0.0 }, 0);
    assert_eq!(r, Some(Resolution::CommitForward));
    assert_eq!(fb.committed_index(), 0, "index moves only when the turn settles");

    let end = settle(&mut fb, 0);
    fb.tick(end + 100);
    assert_eq!(fb.committed_index(), 1);
    assert_eq!(fb.drag_offset(), 0.0);
    assert_eq!(
        flips.try_iter().collect::<Vec<_>>(),
        vec![FlipEvent::Committed { index: 1 }]
    );
    assert_eq!(plays.load(Ordering::SeqCst), 1);
}

#[test]
fn short_drag_eases_back() {
    let (mut fb, plays) = book(3);
    fb.handle_gesture(GestureEvent::PanUpdate { dx: -0.1 * WIDTH }, 0);
    assert_eq!(fb.drag_offset(), -0.1 * WIDTH);
    let r = fb.handle_gesture(GestureEvent::PanEnd { dx: -0.1 * WIDTH, vx: 0.0 }, 0);
    assert_eq!(r, Some(Resolution::Cancel));

    fb.tick(100);
    let mid = fb.drag_offset();
    assert!(mid < 0.0 && mid > -0.1 * WIDTH, "mid={mid}");
    settle(&mut fb, 100);
    assert_eq!(fb.drag_offset(), 0.0);
    assert_eq!(fb.committed_index(), 0);
    assert_eq!(plays.load(Ordering::SeqCst), 0);
}

#[test]
fn active_page_rotation_is_monotonic_and_clamped() {
    let mut prev = f64::INFINITY;
    for step in 0..=20 {
        let drag = -WIDTH * step as f64 / 20.0;
        let t = page_transform(0, FrameSnapshot::new(0.0, drag), WIDTH, 2000.0);
        assert!(t.rotate_y <= prev);
        assert_eq!(t.opacity == 0.0, t.rotate_y < -90.0, "drag={drag}");
        prev = t.rotate_y;
    }
    assert_eq!(prev, -180.0);
    let beyond = page_transform(0, FrameSnapshot::new(0.0, -3.0 * WIDTH), WIDTH, 2000.0);
    assert_eq!(beyond.rotate_y, -180.0);
}

#[test]
fn tap_forward_on_last_page_does_nothing() {
    let (mut fb, plays) = book(1);
    assert_eq!(fb.handle_gesture(GestureEvent::Tap { x: 0.9 * WIDTH }, 0), None);
    assert!(!fb.is_animating());
    assert_eq!(plays.load(Ordering::SeqCst), 0);
}

#[test]
fn feedback_within_debounce_plays_once() {
    let plays = Arc::new(AtomicUsize::new(0));
    let mut gate = FeedbackGate::new(Box::new(CountingCue(Arc::clone(&plays))), 200);
    assert!(gate.trigger(1000));
    assert!(!gate.trigger(1150));
    assert!(gate.trigger(1200));
    assert_eq!(plays.load(Ordering::SeqCst), 2);
}

#[test]
fn pointer_tap_on_right_half_turns_forward() {
    let (mut fb, _) = book(4);
    fb.handle_pointer(&PointerEvent::down(800.0, 0));
    let r = fb.handle_pointer(&PointerEvent::up(801.0, 120));
    assert_eq!(r, Some(Resolution::CommitForward));
    settle(&mut fb, 120);
    assert_eq!(fb.committed_index(), 1);
    assert_eq!(fb.mounted_indices(), vec![0, 1, 2, 3]);
}

#[test]
fn contact_during_transition_is_ignored() {
    let (mut fb, plays) = book(5);
    fb.handle_gesture(GestureEvent::Tap { x: 0.9 * WIDTH }, 0);
    assert!(fb.is_animating());

    // a fast swipe while the tap turn is still running
    fb.handle_pointer(&PointerEvent::down(900.0, 50));
    fb.handle_pointer(&PointerEvent::moved(300.0, 80));
    assert_eq!(fb.handle_pointer(&PointerEvent::up(200.0, 100)), None);

    settle(&mut fb, 100);
    assert_eq!(fb.committed_index(), 1);
    assert_eq!(plays.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_catalog_renders_nothing() {
    let (mut fb, _) = book(0);
    assert!(fb.tick(16).is_empty());
    assert_eq!(fb.handle_gesture(GestureEvent::Tap { x: 900.0 }, 0), None);
    assert_eq!(fb.handle_pointer(&PointerEvent::down(10.0, 0)), None);
}
