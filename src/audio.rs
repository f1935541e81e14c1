use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use std::{
    path::PathBuf,
    process::{Child, Command, Stdio},
    thread,
};

use crate::config::SoundConfig;

/// A short sound played on each page turn. Implementations must not block.
pub trait AudioCue: Send {
    fn play(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct SilentCue;

impl AudioCue for SilentCue {
    fn play(&self) -> Result<()> {
        Ok(())
    }
}

/// Plays the cue file through an external player, one process per play.
#[derive(Debug, Clone)]
pub struct CommandCue {
    player: String,
    path: PathBuf,
}

impl CommandCue {
    pub fn new(player: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            player: player.into(),
            path: path.into(),
        }
    }

    pub fn from_config(sound: &SoundConfig) -> Box<dyn AudioCue> {
        match (&sound.path, sound.enabled) {
            (Some(path), true) => Box::new(Self::new(sound.player.clone(), path.clone())),
            (None, true) => {
                warn!("sound enabled but no cue path configured; running silent");
                Box::new(SilentCue)
            }
            _ => Box::new(SilentCue),
        }
    }
}

impl AudioCue for CommandCue {
    fn play(&self) -> Result<()> {
        if !self.path.exists() {
            return Err(anyhow!("cue not found: {}", self.path.display()));
        }
        let child = Command::new(&self.player)
            .arg(&self.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start {}", self.player))?;
        let playback = Playback { child };
        // if the thread cannot start, the closure drops and reaps the child
        thread::Builder::new()
            .name("flipctl-cue".into())
            .spawn(move || playback.finish())
            .context("failed to start playback thread")?;
        Ok(())
    }
}

/// An in-flight player process. Reaped on completion; killed and reaped if
/// dropped while still running.
struct Playback {
    child: Child,
}

impl Playback {
    fn finish(mut self) {
        match self.child.wait() {
            Ok(status) if !status.success() => debug!("sound: player exited with {status}"),
            Ok(_) => {}
            Err(e) => debug!("sound: wait failed: {e}"),
        }
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Debounced, fire-and-forget feedback. A trigger within `debounce_ms` of
/// the last accepted one is dropped; playback errors are swallowed.
pub struct FeedbackGate {
    cue: Box<dyn AudioCue>,
    debounce_ms: u64,
    last_ms: Option<u64>,
    played: u64,
}

impl FeedbackGate {
    pub fn new(cue: Box<dyn AudioCue>, debounce_ms: u64) -> Self {
        Self {
            cue,
            debounce_ms,
            last_ms: None,
            played: 0,
        }
    }

    pub fn silent(debounce_ms: u64) -> Self {
        Self::new(Box::new(SilentCue), debounce_ms)
    }

    pub fn set_debounce(&mut self, debounce_ms: u64) {
        self.debounce_ms = debounce_ms;
    }

    pub fn trigger(&mut self, now_ms: u64) -> bool {
        if let Some(last) = self.last_ms {
            if now_ms.saturating_sub(last) < self.debounce_ms {
                debug!("sound: suppressed re-trigger {}ms after last", now_ms.saturating_sub(last));
                return false;
            }
        }
        self.last_ms = Some(now_ms);
        self.played += 1;
        if let Err(e) = self.cue.play() {
            debug!("sound: {e:#}");
        }
        true
    }

    pub fn played(&self) -> u64 {
        self.played
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    struct Counting(Arc<AtomicUsize>);

    impl AudioCue for Counting {
        fn play(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Broken;

    impl AudioCue for Broken {
        fn play(&self) -> Result<()> {
            Err(anyhow!("no audio device"))
        }
    }

    #[test]
    fn two_triggers_within_window_play_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut gate = FeedbackGate::new(Box::new(Counting(hits.clone())), 200);
        assert!(gate.trigger(1_000));
        assert!(!gate.trigger(1_150));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(gate.trigger(1_200));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn playback_errors_are_swallowed() {
        let mut gate = FeedbackGate::new(Box::new(Broken), 200);
        assert!(gate.trigger(0));
        assert_eq!(gate.played(), 1);
    }

    #[test]
    fn missing_cue_file_is_an_error_not_a_panic() {
        let cue = CommandCue::new("true", "/nonexistent/flip.ogg");
        assert!(cue.play().is_err());
    }

    #[test]
    fn disabled_sound_is_silent() {
        let cfg = SoundConfig {
            enabled: false,
            player: "paplay".into(),
            path: Some("/tmp/x.ogg".into()),
        };
        assert!(CommandCue::from_config(&cfg).play().is_ok());
    }
}
