use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use evdev::{AbsoluteAxisCode, Device, EventType, SynchronizationCode};

use crate::flipbook::{PointerEvent, PointerKind, Surface};
use crate::input;
use crate::tracker::Tracker;

/// Handle to the running input thread.
pub struct InputThread {
    handle: JoinHandle<()>,
    surface_tx: Sender<Surface>,
}

impl InputThread {
    /// Rescale touch coordinates to a new surface from the next input frame on.
    pub fn resize(&self, surface: Surface) {
        if self.surface_tx.send(surface).is_err() {
            debug!("input: thread gone, resize dropped");
        }
    }

    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("input thread panicked");
        }
    }
}

/// Applies the latest pending surface, if any, to every tracker.
fn apply_resize<'a>(rx: &Receiver<Surface>, trackers: impl Iterator<Item = &'a mut Tracker>) {
    let Some(surface) = rx.try_iter().last() else {
        return;
    };
    for t in trackers {
        t.set_surface(surface);
    }
    debug!("input: surface now {}x{}", surface.width, surface.height);
}

/// Reads every touchscreen on a background thread and forwards the primary
/// contact as pointer events stamped against `epoch`. Returns `None` when
/// there is nothing to read from.
pub fn spawn_input(
    surface: Surface,
    epoch: Instant,
    tx: Sender<PointerEvent>,
    stop: Arc<AtomicBool>,
) -> Result<Option<InputThread>> {
    let mut devs: Vec<(Device, Tracker)> = vec![];
    for d in input::discover_touch_surfaces() {
        match Device::open(&d.path) {
            Ok(mut dev) => {
                if let Err(e) = dev.set_nonblocking(true) {
                    warn!("{}: cannot set non-blocking: {e}", d.path);
                    continue;
                }
                let mut tracker = Tracker::new(surface, epoch);
                tracker.set_ranges(d.x, d.y);
                info!("input: {} ({})", d.path, d.name);
                devs.push((dev, tracker));
            }
            Err(e) => warn!("failed to open {}: {e}", d.path),
        }
    }
    if devs.is_empty() {
        warn!("no touchscreen could be opened; input disabled");
        return Ok(None);
    }

    let (surface_tx, surface_rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name("flipctl-input".into())
        .spawn(move || run_input(devs, tx, surface_rx, stop))
        .context("spawn input thread")?;
    Ok(Some(InputThread { handle, surface_tx }))
}

fn run_input(
    mut devs: Vec<(Device, Tracker)>,
    tx: Sender<PointerEvent>,
    surface_rx: Receiver<Surface>,
    stop: Arc<AtomicBool>,
) {
    let mut grabbed = false;

    while !stop.load(Ordering::Relaxed) {
        apply_resize(&surface_rx, devs.iter_mut().map(|(_, t)| t));
        let mut any_event = false;
        let mut want_grab: Option<bool> = None;

        for (dev, tracker) in devs.iter_mut() {
            let Ok(events) = dev.fetch_events() else {
                continue;
            };
            for ev in events {
                any_event = true;
                if ev.event_type() == EventType::ABSOLUTE {
                    match ev.code() {
                        c if c == AbsoluteAxisCode::ABS_MT_SLOT.0 => tracker.on_slot(ev.value()),
                        c if c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => {
                            tracker.on_tracking_id(ev.value())
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 => {
                            tracker.on_pos_x(ev.value())
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_POSITION_Y.0 => {
                            tracker.on_pos_y(ev.value())
                        }
                        _ => {}
                    }
                } else if ev.event_type() == EventType::SYNCHRONIZATION
                    && ev.code() == SynchronizationCode::SYN_REPORT.0
                {
                    let Some(pe) = tracker.on_syn_report() else {
                        continue;
                    };
                    match pe.kind {
                        PointerKind::Down => want_grab = Some(true),
                        PointerKind::Up => want_grab = Some(false),
                        PointerKind::Move => {}
                    }
                    if tx.send(pe).is_err() {
                        debug!("input: receiver gone, stopping");
                        return;
                    }
                }
            }
        }

        // keep the desktop from also seeing the swipe
        match want_grab {
            Some(true) if !grabbed => {
                for (d, _) in devs.iter_mut() {
                    let _ = d.grab();
                }
                grabbed = true;
                debug!("input: grabbed touch devices");
            }
            Some(false) if grabbed => {
                for (d, _) in devs.iter_mut() {
                    let _ = d.ungrab();
                }
                grabbed = false;
                debug!("input: released touch devices");
            }
            _ => {}
        }

        if !any_event {
            thread::sleep(Duration::from_millis(4));
        }
    }

    if grabbed {
        for (d, _) in devs.iter_mut() {
            let _ = d.ungrab();
        }
    }
}
