//! Profile directory watcher (notify / inotify).

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::{Context, Result};
use log::debug;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

/// Watches one directory; editors save by rename, so the directory is
/// watched rather than the file itself.
pub struct ProfileWatcher {
    rx: mpsc::Receiver<PathBuf>,
    _watcher: RecommendedWatcher,
}

impl ProfileWatcher {
    pub fn new(dir: &Path) -> Result<Self> {
        let dir = dir
            .canonicalize()
            .with_context(|| format!("watch {}", dir.display()))?;
        let (tx, rx) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                let Ok(event) = res else { return };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }
                for p in event.paths {
                    if p.extension().is_some_and(|e| e == "toml") {
                        let _ = tx.send(p);
                    }
                }
            },
            notify::Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        debug!("watching {}", dir.display());

        Ok(Self {
            rx,
            _watcher: watcher,
        })
    }

    /// Drains pending notifications; true if `path` was among them.
    pub fn touched(&self, path: &Path) -> bool {
        let target = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut hit = false;
        while let Ok(p) = self.rx.try_recv() {
            let p = p.canonicalize().unwrap_or(p);
            hit |= p == target;
        }
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn reports_edits_to_the_watched_profile() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("kiosk.toml");
        std::fs::write(&file, "[meta]\nname = \"kiosk\"\n").unwrap();
        let w = ProfileWatcher::new(dir.path()).unwrap();

        std::fs::write(&file, "[meta]\nname = \"kiosk2\"\n").unwrap();
        let deadline = Instant::now() + Duration::from_secs(3);
        let mut seen = false;
        while Instant::now() < deadline && !seen {
            seen = w.touched(&file);
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(seen);
    }
}
