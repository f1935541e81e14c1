use anyhow::{Context, Result, anyhow};
use directories::UserDirs;
use log::{debug, info};
use serde::{Deserialize, Deserializer};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::flipbook::Surface;
use crate::input;

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

/// Gesture, animation and feedback tuning. Distances are surface pixels,
/// durations milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct Thresholds {
    pub commit_fraction: f64,
    pub fling_velocity: f64,
    pub commit_ms: u64,
    pub tap_commit_ms: u64,
    pub cancel_ms: u64,
    pub window_radius: usize,
    pub sound_debounce_ms: u64,
    pub tap_ms: u64,
    pub touch_slop: f64,
    pub velocity_window_ms: u64,
    pub frame_ms: u64,
    pub perspective: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            commit_fraction: 0.3,
            fling_velocity: 500.0,
            commit_ms: 300,
            tap_commit_ms: 600,
            cancel_ms: 250,
            window_radius: 2,
            sound_debounce_ms: 200,
            tap_ms: 250,
            touch_slop: 10.0,
            velocity_window_ms: 100,
            frame_ms: 16,
            perspective: 2000.0,
        }
    }
}

impl Thresholds {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SurfaceConfig {
    pub width: f64,
    pub height: f64,
}

impl From<SurfaceConfig> for Surface {
    fn from(s: SurfaceConfig) -> Self {
        Surface::new(s.width, s.height)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SoundConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_player")]
    pub player: String,
    pub path: Option<PathBuf>,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            player: default_player(),
            path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_player() -> String {
    "paplay".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriveConfig {
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    pub thresholds: Thresholds,
    pub surface: SurfaceConfig,
    #[serde(default)]
    pub sound: SoundConfig,
    #[serde(default)]
    pub drive: DriveConfig,

    // `catalog1 = "url"` and `[catalogs.catalog1] url = "..."` are both accepted
    #[serde(default, deserialize_with = "deserialize_catalog_urls")]
    pub catalogs: BTreeMap<String, String>,
}

impl Profile {
    pub fn catalog_url(&self, key: &str) -> Option<&str> {
        self.catalogs
            .get(key)
            .map(String::as_str)
            .filter(|u| !u.trim().is_empty())
    }

    /// Drive API key; the environment wins over the profile.
    pub fn drive_api_key(&self) -> String {
        std::env::var("FLIPCTL_DRIVE_API_KEY").unwrap_or_else(|_| self.drive.api_key.clone())
    }
}

fn deserialize_catalog_urls<'de, D>(
    de: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = toml::Value::deserialize(de)?;
    let table = match val {
        toml::Value::Table(t) => t,
        other => {
            return Err(serde::de::Error::custom(format!(
                "catalogs must be a table, got {}",
                other.type_str()
            )));
        }
    };

    let mut out = BTreeMap::new();
    for (key, v) in table {
        let url = match v {
            toml::Value::String(s) => s,
            toml::Value::Table(sub) => match sub.get("url") {
                Some(toml::Value::String(s)) => s.clone(),
                Some(other) => {
                    return Err(serde::de::Error::custom(format!(
                        "catalog '{key}' url must be a string, got {}",
                        other.type_str()
                    )));
                }
                None => String::new(),
            },
            other => {
                return Err(serde::de::Error::custom(format!(
                    "catalog '{key}' must be a string or table, got {}",
                    other.type_str()
                )));
            }
        };
        out.insert(key, url);
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct AppConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
    pub language_ptr: PathBuf,
}

fn home_dir() -> Result<PathBuf> {
    UserDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or_else(|| anyhow!("cannot determine home directory"))
}

/// `FLIPCTL_CONFIG_DIR` overrides `~/.config/flipctl`.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("FLIPCTL_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    Ok(home_dir()?.join(".config").join("flipctl"))
}

/// `FLIPCTL_CACHE_DIR` overrides `~/.cache/flipctl`.
pub fn cache_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("FLIPCTL_CACHE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    Ok(home_dir()?.join(".cache").join("flipctl"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl AppConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        Self::load_from(&config_dir()?)
    }

    pub fn load_from(cfgdir: &Path) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)
            .with_context(|| format!("failed to create {}", profdir.display()))?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            fs::write(&active_ptr, b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir.to_path_buf(),
            profiles_dir: profdir,
            active_ptr,
            language_ptr: cfgdir.join("language"),
        })
    }

    pub fn profile_path(&self) -> PathBuf {
        self.profiles_dir.join(format!("{}.toml", self.active_name))
    }

    /// Re-read the active profile; on error the last good one is kept.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        debug!("config: reloaded profile '{}'", self.active_name);
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn saved_language(&self) -> Option<String> {
        fs::read_to_string(&self.language_ptr)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn save_language(&self, code: &str) -> Result<()> {
        fs::write(&self.language_ptr, code.as_bytes())
            .with_context(|| format!("failed to write {}", self.language_ptr.display()))
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let devices: Vec<String> = input::discover_touch_surfaces()
            .into_iter()
            .map(|d| format!("{} ({})", d.name, d.path))
            .collect();
        let sound_present = self
            .profile
            .sound
            .path
            .as_deref()
            .is_some_and(Path::exists);
        let configured: Vec<&String> = self
            .profile
            .catalogs
            .iter()
            .filter(|(_, url)| !url.trim().is_empty())
            .map(|(k, _)| k)
            .collect();
        serde_json::json!({
            "input_group_member": check_in_input_group(),
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "cache_dir": cache_dir().ok(),
            "devices": devices,
            "sound": {
                "enabled": self.profile.sound.enabled,
                "player": self.profile.sound.player,
                "cue_present": sound_present,
            },
            "catalogs_configured": configured,
            "hints": {
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

fn load_profile(profdir: &Path, name: &str) -> Result<Profile> {
    let path = profdir.join(format!("{name}.toml"));
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    let profile = parse_profile(&txt).map_err(|e| anyhow!("{}: {e:#}", path.display()))?;
    Ok(profile)
}

pub fn parse_profile(txt: &str) -> Result<Profile> {
    let profile: Profile = toml::from_str(txt).map_err(|e| anyhow!("failed to parse: {e}"))?;
    validate_profile(&profile)?;
    Ok(profile)
}

fn validate_profile(p: &Profile) -> Result<()> {
    let th = &p.thresholds;
    if th.commit_ms == 0 || th.tap_commit_ms == 0 || th.cancel_ms == 0 || th.frame_ms == 0 {
        return Err(anyhow!("thresholds must be positive durations"));
    }
    if !(th.commit_fraction > 0.0 && th.commit_fraction < 1.0) {
        return Err(anyhow!(
            "thresholds.commit_fraction must be in (0,1) page widths"
        ));
    }
    if th.window_radius == 0 {
        return Err(anyhow!("thresholds.window_radius must be at least 1"));
    }
    if th.fling_velocity <= 0.0 || th.touch_slop < 0.0 {
        return Err(anyhow!(
            "thresholds.fling_velocity must be positive and touch_slop non-negative"
        ));
    }
    if !(p.surface.width > 0.0 && p.surface.height > 0.0) {
        return Err(anyhow!("surface width and height must be positive"));
    }
    if p.sound.enabled && p.sound.player.trim().is_empty() {
        return Err(anyhow!("sound.player is empty but sound is enabled"));
    }
    for key in p.catalogs.keys() {
        if key.trim().is_empty() {
            return Err(anyhow!("empty catalog key"));
        }
    }
    Ok(())
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:")
                && line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
            {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_profile_parses() {
        let p = parse_profile(default_profile_text()).unwrap();
        assert_eq!(p.meta.name.as_deref(), Some("default"));
        assert_eq!(p.thresholds.window_radius, 2);
        assert_eq!(p.thresholds.commit_ms, 300);
        assert_eq!(p.thresholds.tap_commit_ms, 600);
        assert_eq!(p.thresholds.sound_debounce_ms, 200);
        assert_eq!(p.catalogs.len(), 3);
        assert!(p.catalog_url("catalog1").is_none());
    }

    #[test]
    fn catalogs_accept_strings_and_tables() {
        let txt = r#"
            [meta]
            [thresholds]
            commit_fraction = 0.3
            fling_velocity = 500.0
            commit_ms = 300
            tap_commit_ms = 600
            cancel_ms = 250
            window_radius = 2
            sound_debounce_ms = 200
            tap_ms = 250
            touch_slop = 10.0
            velocity_window_ms = 100
            frame_ms = 16
            perspective = 2000.0
            [surface]
            width = 800.0
            height = 600.0
            [catalogs]
            catalog1 = "https://sheets.invalid/one.csv"
            [catalogs.catalog2]
            url = "https://sheets.invalid/two.csv"
        "#;
        let p = parse_profile(txt).unwrap();
        assert_eq!(p.catalog_url("catalog1"), Some("https://sheets.invalid/one.csv"));
        assert_eq!(p.catalog_url("catalog2"), Some("https://sheets.invalid/two.csv"));
        assert!(!p.sound.enabled);
    }

    #[test]
    fn rejects_bad_commit_fraction() {
        let txt = default_profile_text().replace("commit_fraction = 0.3", "commit_fraction = 1.5");
        assert!(parse_profile(&txt).is_err());
    }

    #[test]
    fn rejects_zero_duration() {
        let txt = default_profile_text().replace("cancel_ms = 250", "cancel_ms = 0");
        assert!(parse_profile(&txt).is_err());
    }

    #[test]
    fn installs_default_and_switches_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let mut st = AppConfigState::load_from(dir.path()).unwrap();
        assert_eq!(st.active_name, "default");
        assert_eq!(st.list_profiles(), vec!["default".to_string()]);

        let alt = default_profile_text().replace("commit_ms = 300", "commit_ms = 450");
        fs::write(st.profiles_dir.join("slow.toml"), alt).unwrap();
        st.set_active("slow").unwrap();
        assert_eq!(st.profile.thresholds.commit_ms, 450);
        assert_eq!(fs::read_to_string(&st.active_ptr).unwrap(), "slow");

        assert!(st.set_active("missing").is_err());
        assert_eq!(st.active_name, "slow");
    }

    #[test]
    fn reload_keeps_last_good_profile() {
        let dir = tempfile::tempdir().unwrap();
        let mut st = AppConfigState::load_from(dir.path()).unwrap();
        fs::write(st.profile_path(), "not toml [[[").unwrap();
        assert!(st.reload().is_err());
        assert_eq!(st.profile.thresholds.commit_ms, 300);
    }

    #[test]
    fn language_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let st = AppConfigState::load_from(dir.path()).unwrap();
        assert_eq!(st.saved_language(), None);
        st.save_language("ru").unwrap();
        assert_eq!(st.saved_language().as_deref(), Some("ru"));
    }
}
