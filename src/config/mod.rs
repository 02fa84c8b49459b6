use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4400;
const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com/v18.0";
const DEFAULT_SOURCE_URL_FALLBACK: &str = "https://www.example.com";

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── MetaConfig ───────────────────────────────────────────────────────────────

/// Graph API dispatch configuration (`[meta]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetaConfig {
    /// Versioned Graph API root the relay posts events to.
    /// Point this at a stub for integration testing.
    pub graph_base_url: String,
    /// event_source_url used when a signal carries no page URL and the
    /// container has no verified domain.
    pub source_url_fallback: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            source_url_fallback: DEFAULT_SOURCE_URL_FALLBACK.to_string(),
        }
    }
}

// ─── ScriptsConfig ────────────────────────────────────────────────────────────

/// Generated-script configuration (`[scripts]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Public base URL of this daemon's `/api/v1` root as reachable from
    /// a visitor's browser — interpolated into generated GTM scripts.
    pub public_api_url: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            public_api_url: format!("http://127.0.0.1:{DEFAULT_PORT}/api/v1"),
        }
    }
}

// ─── ObservabilityConfig ──────────────────────────────────────────────────────

/// Daemon observability configuration (`[observability]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log SQLite queries that exceed this threshold (milliseconds). Default: 100.
    /// Set to 0 to disable slow query logging.
    pub slow_query_threshold_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: 100,
        }
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// REST server port (default: 4400).
    port: Option<u16>,
    /// Bind address (default: "127.0.0.1"; use "0.0.0.0" to accept relay
    /// traffic from the network).
    bind_address: Option<String>,
    /// Log level filter string, e.g. "debug", "info,capifyd=trace" (default: "info").
    log: Option<String>,
    /// Graph API dispatch configuration (`[meta]`).
    meta: Option<MetaConfig>,
    /// Generated-script configuration (`[scripts]`).
    scripts: Option<ScriptsConfig>,
    /// Observability configuration (`[observability]`).
    observability: Option<ObservabilityConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── CapifyConfig ─────────────────────────────────────────────────────────────

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct CapifyConfig {
    pub port: u16,
    pub bind_address: String,
    pub data_dir: PathBuf,
    pub log_level: String,
    pub meta: MetaConfig,
    pub scripts: ScriptsConfig,
    pub observability: ObservabilityConfig,
}

impl CapifyConfig {
    /// Resolve the effective config: CLI/env overrides on top of
    /// `{data_dir}/config.toml` on top of built-in defaults.
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let toml = load_toml(&data_dir).unwrap_or_default();

        Self {
            port: port.or(toml.port).unwrap_or(DEFAULT_PORT),
            bind_address: bind_address
                .or(toml.bind_address)
                .unwrap_or_else(default_bind_address),
            data_dir,
            log_level: log.or(toml.log).unwrap_or_else(|| "info".to_string()),
            meta: toml.meta.unwrap_or_default(),
            scripts: toml.scripts.unwrap_or_default(),
            observability: toml.observability.unwrap_or_default(),
        }
    }
}

/// Platform data directory: `$CAPIFYD_DATA_DIR` > XDG data dir > `./data`.
fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CAPIFYD_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/share/capifyd");
    }
    PathBuf::from("./data")
}

// ─── Tests ────────────────────────────────────────────────────────────────────
