//! Running a flipbook: the live viewer loop on real touch input, and
//! deterministic replay of recorded pointer scripts on a virtual clock.

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::json;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Instant;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::audio::{CommandCue, FeedbackGate};
use crate::catalog::SheetCatalog;
use crate::config::{self, AppConfigState};
use crate::flipbook::{FlipEvent, FlipbookController, Frame, PointerEvent, Surface};
use crate::locale::Locale;
use crate::pipeline;
use crate::router;
use crate::watch::ProfileWatcher;

/// Where composed frames go.
pub trait FrameSink {
    fn present(&mut self, t_ms: u64, frame: &Frame) -> Result<()>;

    fn event(&mut self, _t_ms: u64, _ev: &FlipEvent) -> Result<()> {
        Ok(())
    }
}

/// Logs the visible page whenever it changes.
#[derive(Debug, Default)]
pub struct LogSink {
    last_top: Option<usize>,
}

impl FrameSink for LogSink {
    fn present(&mut self, _t_ms: u64, frame: &Frame) -> Result<()> {
        let top = frame.top().map(|p| p.index);
        if top != self.last_top {
            if let Some(p) = frame.top() {
                info!("showing {}", p.content);
            }
            self.last_top = top;
        }
        Ok(())
    }
}

/// One JSON object per line. Frames are written only when `frames` is set;
/// flip events always are.
pub struct JsonSink<W: Write> {
    out: W,
    frames: bool,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W, frames: bool) -> Self {
        Self { out, frames }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FrameSink for JsonSink<W> {
    fn present(&mut self, t_ms: u64, frame: &Frame) -> Result<()> {
        if self.frames {
            let line = json!({ "t_ms": t_ms, "frame": frame });
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    fn event(&mut self, t_ms: u64, ev: &FlipEvent) -> Result<()> {
        let line = json!({ "t_ms": t_ms, "flip": ev });
        writeln!(self.out, "{line}")?;
        Ok(())
    }
}

fn forward_events(
    rx: &Receiver<FlipEvent>,
    t_ms: u64,
    sink: &mut dyn FrameSink,
) -> Result<(usize, usize)> {
    let (mut commits, mut cancels) = (0, 0);
    for ev in rx.try_iter() {
        match ev {
            FlipEvent::Committed { .. } => commits += 1,
            FlipEvent::Cancelled => cancels += 1,
        }
        sink.event(t_ms, &ev)?;
    }
    Ok((commits, cancels))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub events: usize,
    pub frames: u64,
    pub commits: usize,
    pub cancels: usize,
    pub final_index: usize,
    pub end_ms: u64,
    pub feedback_played: u64,
}

/// Longest idle stretch a script may contain, counted from 0 for the first
/// event. Replay ticks through every frame of it.
pub const MAX_SCRIPT_GAP_MS: u64 = 60_000;

/// Pointer script: one `PointerEvent` JSON object per line. Blank lines and
/// lines starting with `#` are skipped. Timestamps must not go backwards or
/// jump ahead by more than [`MAX_SCRIPT_GAP_MS`].
pub fn read_script<R: BufRead>(reader: R) -> Result<Vec<PointerEvent>> {
    let mut out: Vec<PointerEvent> = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let ev: PointerEvent =
            serde_json::from_str(line).with_context(|| format!("script line {}", n + 1))?;
        let prev_ms = out.last().map_or(0, |p| p.t_ms);
        if ev.t_ms < prev_ms {
            bail!(
                "script line {}: t_ms {} is earlier than {}",
                n + 1,
                ev.t_ms,
                prev_ms
            );
        }
        if ev.t_ms - prev_ms > MAX_SCRIPT_GAP_MS {
            bail!(
                "script line {}: t_ms {} is more than {MAX_SCRIPT_GAP_MS}ms after {}",
                n + 1,
                ev.t_ms,
                prev_ms
            );
        }
        out.push(ev);
    }
    Ok(out)
}

/// Drive `flipbook` through `script`, ticking every `frame_ms` of virtual
/// time, then keep ticking until the last transition settles.
pub fn replay(
    flipbook: &mut FlipbookController,
    script: &[PointerEvent],
    frame_ms: u64,
    sink: &mut dyn FrameSink,
) -> Result<ReplaySummary> {
    let rx = flipbook.subscribe();
    let frame_ms = frame_ms.max(1);
    let mut s = ReplaySummary {
        events: script.len(),
        ..Default::default()
    };
    let mut now = 0u64;

    let mut step = |flipbook: &mut FlipbookController,
                    now: u64,
                    s: &mut ReplaySummary|
     -> Result<()> {
        let frame = flipbook.tick(now);
        sink.present(now, &frame)?;
        s.frames += 1;
        let (c, x) = forward_events(&rx, now, &mut *sink)?;
        s.commits += c;
        s.cancels += x;
        Ok(())
    };

    step(flipbook, now, &mut s)?;
    for ev in script {
        while now.saturating_add(frame_ms) <= ev.t_ms {
            now += frame_ms;
            step(flipbook, now, &mut s)?;
        }
        flipbook.handle_pointer(ev);
    }
    // cancellations are reported as soon as the gesture ends
    now = now.saturating_add(frame_ms);
    step(flipbook, now, &mut s)?;
    while flipbook.is_animating() {
        now = now.saturating_add(frame_ms);
        step(flipbook, now, &mut s)?;
    }

    s.final_index = flipbook.committed_index();
    s.end_ms = now;
    s.feedback_played = flipbook.feedback_played();
    Ok(s)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ViewOptions {
    /// Emit every frame as JSON lines on stdout.
    pub frames: bool,
}

/// Mount a catalog screen and run it on the local touchscreen until
/// SIGINT/SIGTERM. The active profile is reloaded when its file changes.
pub fn run_viewer(state: &mut AppConfigState, target: &str, opts: ViewOptions) -> Result<()> {
    let route = router::resolve(target)?;
    let locale = Locale::detect(state.saved_language().as_deref());
    let source = SheetCatalog::from_profile(&state.profile, config::cache_dir()?);
    let th = state.profile.thresholds.clone();
    let mut surface: Surface = state.profile.surface.into();
    let feedback = FeedbackGate::new(
        CommandCue::from_config(&state.profile.sound),
        th.sound_debounce_ms,
    );

    let mut screen = router::mount(route, &source, &locale, surface, &th, feedback);
    info!(
        "{} / {}: {} page(s)",
        screen.title,
        screen.name,
        screen.flipbook.len()
    );
    if screen.flipbook.is_empty() {
        warn!("{} has no pages; nothing to show", route.catalog_key);
        return Ok(());
    }
    let flips = screen.flipbook.subscribe();

    let stop = Arc::new(AtomicBool::new(false));
    let mut signals = Signals::new([SIGINT, SIGTERM]).context("install signal handlers")?;
    let signal_handle = signals.handle();
    {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("signal {sig}: stopping");
                stop.store(true, Ordering::Relaxed);
            }
        });
    }

    let epoch = Instant::now();
    let (tx, pointer_rx) = mpsc::channel();
    let input = pipeline::spawn_input(surface, epoch, tx, Arc::clone(&stop))?;

    let watcher = match ProfileWatcher::new(&state.profiles_dir) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("profile hot-reload disabled: {e:#}");
            None
        }
    };

    let mut sink: Box<dyn FrameSink> = if opts.frames {
        Box::new(JsonSink::new(std::io::stdout(), true))
    } else {
        Box::new(LogSink::default())
    };

    while !stop.load(Ordering::Relaxed) {
        for ev in pointer_rx.try_iter() {
            screen.flipbook.handle_pointer(&ev);
        }

        if watcher
            .as_ref()
            .is_some_and(|w| w.touched(&state.profile_path()))
        {
            match state.reload() {
                Ok(()) => {
                    screen.flipbook.set_thresholds(&state.profile.thresholds);
                    let next: Surface = state.profile.surface.into();
                    if next != surface {
                        surface = next;
                        screen.flipbook.resize(surface);
                        if let Some(input) = &input {
                            input.resize(surface);
                        }
                    }
                    info!("profile '{}' reloaded", state.active_name);
                }
                Err(e) => warn!("reload failed, keeping last good profile: {e:#}"),
            }
        }

        let now = epoch.elapsed().as_millis() as u64;
        let frame = screen.flipbook.tick(now);
        sink.present(now, &frame)?;
        forward_events(&flips, now, sink.as_mut())?;

        thread::sleep(state.profile.thresholds.frame_interval());
    }

    signal_handle.close();
    if let Some(input) = input {
        input.join();
    }
    debug!("viewer stopped at page {}", screen.flipbook.committed_index());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogItem;
    use crate::config::Thresholds;

    fn book(n: usize) -> FlipbookController {
        let items = (0..n)
            .map(|i| CatalogItem::new(format!("P-{i}"), format!("{i}.jpg")))
            .collect();
        FlipbookController::new(
            items,
            Surface::new(1000.0, 1600.0),
            &Thresholds::default(),
            FeedbackGate::silent(200),
        )
    }

    const SCRIPT: &str = r#"
# slow drag past the commit fraction
{"kind":"down","x":900,"t_ms":0}
{"kind":"move","x":700,"t_ms":100}
{"kind":"move","x":500,"t_ms":400}
{"kind":"up","x":500,"t_ms":800}
"#;

    #[test]
    fn script_parses_and_skips_comments() {
        let evs = read_script(SCRIPT.as_bytes()).unwrap();
        assert_eq!(evs.len(), 4);
        assert_eq!(evs[3].t_ms, 800);
    }

    #[test]
    fn script_rejects_time_travel() {
        let bad = "{\"kind\":\"down\",\"x\":1,\"t_ms\":50}\n{\"kind\":\"up\",\"x\":1,\"t_ms\":10}\n";
        assert!(read_script(bad.as_bytes()).is_err());
    }

    #[test]
    fn script_rejects_far_future_timestamps() {
        let huge = format!("{{\"kind\":\"down\",\"x\":1,\"t_ms\":{}}}\n", u64::MAX - 5);
        assert!(read_script(huge.as_bytes()).is_err());

        let idle = "{\"kind\":\"down\",\"x\":1,\"t_ms\":0}\n{\"kind\":\"up\",\"x\":1,\"t_ms\":60001}\n";
        assert!(read_script(idle.as_bytes()).is_err());

        let ok = "{\"kind\":\"down\",\"x\":1,\"t_ms\":60000}\n{\"kind\":\"up\",\"x\":1,\"t_ms\":120000}\n";
        assert_eq!(read_script(ok.as_bytes()).unwrap().len(), 2);
    }

    #[test]
    fn replay_commits_a_drag() {
        let mut fb = book(5);
        let evs = read_script(SCRIPT.as_bytes()).unwrap();
        let mut sink = JsonSink::new(Vec::new(), false);
        let s = replay(&mut fb, &evs, 16, &mut sink).unwrap();
        assert_eq!(s.commits, 1);
        assert_eq!(s.final_index, 1);
        assert!(!fb.is_animating());
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let line: serde_json::Value = serde_json::from_str(out.lines().next().unwrap()).unwrap();
        assert_eq!(line["flip"]["event"], "committed");
        assert_eq!(line["flip"]["index"], 1);
    }

    #[test]
    fn replay_short_drag_cancels() {
        let mut fb = book(5);
        let evs = read_script(
            "{\"kind\":\"down\",\"x\":900,\"t_ms\":0}\n\
             {\"kind\":\"move\",\"x\":850,\"t_ms\":300}\n\
             {\"kind\":\"up\",\"x\":850,\"t_ms\":600}\n"
                .as_bytes(),
        )
        .unwrap();
        let mut sink = JsonSink::new(Vec::new(), true);
        let s = replay(&mut fb, &evs, 16, &mut sink).unwrap();
        assert_eq!((s.commits, s.cancels, s.final_index), (0, 1, 0));
        assert_eq!(fb.drag_offset(), 0.0);
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.lines().count() as u64 > s.frames);
    }
}
