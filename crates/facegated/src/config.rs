use facegate_core::Registry;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which D-Bus bus the daemon registers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    Session,
    System,
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path.
    pub camera_device: String,
    /// Requested capture resolution.
    pub capture_width: u32,
    pub capture_height: u32,
    /// Base URL the kiosk assets (models, photos, worker script) are served from.
    pub asset_base_url: String,
    /// SQLite database holding the caches and the session marker.
    pub db_path: PathBuf,
    /// TOML file listing the registered accounts.
    pub accounts_path: PathBuf,
    /// Maximum descriptor distance for a match.
    pub match_threshold: f32,
    /// Live match loop period.
    pub scan_interval: Duration,
    /// Countdown start value.
    pub countdown_from: u32,
    /// Countdown tick period.
    pub countdown_tick: Duration,
    /// Worker script poll period; `None` disables update checks.
    pub update_period: Option<Duration>,
    /// Worker script path under the asset base URL.
    pub worker_path: String,
    /// Protected route prefixes; the first one is the post-login landing route.
    pub protected_paths: Vec<String>,
    /// Session lifetime; `None` means sessions never expire.
    pub session_ttl: Option<Duration>,
    /// Overlay coordinate space.
    pub display_width: u32,
    pub display_height: u32,
    pub bus: BusKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            capture_width: 640,
            capture_height: 360,
            asset_base_url: "http://127.0.0.1:4173".to_string(),
            db_path: data_dir().join("facegate.db"),
            accounts_path: PathBuf::from("/etc/facegate/accounts.toml"),
            match_threshold: facegate_core::matcher::DEFAULT_MATCH_THRESHOLD,
            scan_interval: Duration::from_millis(1000 / 15),
            countdown_from: facegate_core::countdown::DEFAULT_COUNTDOWN_FROM,
            countdown_tick: Duration::from_secs(1),
            update_period: Some(Duration::from_millis(1000)),
            worker_path: "/sw.js".to_string(),
            protected_paths: vec![facegate_core::guard::PROTECTED_ROOT.to_string()],
            session_ttl: None,
            display_width: 640,
            display_height: 360,
            bus: BusKind::Session,
        }
    }
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            camera_device: env_string("FACEGATE_CAMERA_DEVICE", d.camera_device),
            capture_width: env_parse("FACEGATE_CAPTURE_WIDTH", d.capture_width),
            capture_height: env_parse("FACEGATE_CAPTURE_HEIGHT", d.capture_height),
            asset_base_url: env_string("FACEGATE_ASSET_BASE_URL", d.asset_base_url),
            db_path: std::env::var("FACEGATE_DB_PATH").map(PathBuf::from).unwrap_or(d.db_path),
            accounts_path: std::env::var("FACEGATE_ACCOUNTS").map(PathBuf::from).unwrap_or(d.accounts_path),
            match_threshold: env_parse("FACEGATE_MATCH_THRESHOLD", d.match_threshold),
            scan_interval: env_period("FACEGATE_SCAN_INTERVAL_MS").unwrap_or(d.scan_interval),
            countdown_from: env_parse("FACEGATE_COUNTDOWN_FROM", d.countdown_from),
            countdown_tick: env_period("FACEGATE_COUNTDOWN_TICK_MS").unwrap_or(d.countdown_tick),
            update_period: match env_millis("FACEGATE_UPDATE_PERIOD_MS") {
                Some(p) if p.is_zero() => None,
                Some(p) => Some(p),
                None => d.update_period,
            },
            worker_path: env_string("FACEGATE_WORKER_PATH", d.worker_path),
            protected_paths: std::env::var("FACEGATE_PROTECTED_PATHS")
                .map(|v| parse_list(&v))
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(d.protected_paths),
            session_ttl: std::env::var("FACEGATE_SESSION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|&s| s > 0)
                .map(Duration::from_secs),
            display_width: env_parse("FACEGATE_DISPLAY_WIDTH", d.display_width),
            display_height: env_parse("FACEGATE_DISPLAY_HEIGHT", d.display_height),
            bus: match std::env::var("FACEGATE_BUS").as_deref() {
                Ok("system") => BusKind::System,
                _ => BusKind::Session,
            },
        }
    }

    /// Full URL of an asset path such as `/models/det_10g.onnx`.
    pub fn asset_url(&self, path: &str) -> String {
        join_url(&self.asset_base_url, path)
    }

    pub fn worker_url(&self) -> String {
        self.asset_url(&self.worker_path)
    }
}

/// Join a base URL and an absolute or relative path with exactly one slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Load the account registry from a TOML file of `[[accounts]]` tables.
pub fn load_registry(path: &Path) -> anyhow::Result<Registry> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading account registry {}: {e}", path.display()))?;
    parse_registry(&text)
}

pub fn parse_registry(text: &str) -> anyhow::Result<Registry> {
    let registry: Registry = toml::from_str(text)?;
    let mut seen = std::collections::HashSet::new();
    for account in registry.iter() {
        if !seen.insert(account.id.as_str()) {
            anyhow::bail!("duplicate account id {:?} in registry", account.id);
        }
    }
    Ok(registry)
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegate")
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// A timer period in milliseconds. Zero is rejected since tokio intervals panic on it.
fn env_period(key: &str) -> Option<Duration> {
    let period = env_millis(key)?;
    if period.is_zero() {
        tracing::warn!(key, "zero period ignored");
        return None;
    }
    Some(period)
}
