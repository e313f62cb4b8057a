use crate::profiles::Profile;
use crate::views::StatsScope;
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "EDUTRACKD_CONFIG";
pub const LOG_ENV: &str = "EDUTRACKD_LOG";
pub const STATS_SCOPE_ENV: &str = "EDUTRACKD_STATS_SCOPE";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub log_filter: String,
    pub stats_scope: StatsScope,
    pub max_records_per_view: usize,
    pub profiles: Vec<Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: "edutrackd=info".to_string(),
            stats_scope: StatsScope::All,
            max_records_per_view: 10_000,
            profiles: Vec::new(),
        }
    }
}

pub fn read_config_file(path: &Path) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.to_string_lossy()))?;
    let cfg: Config = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.to_string_lossy()))?;
    if cfg.max_records_per_view == 0 {
        anyhow::bail!("maxRecordsPerView must be at least 1");
    }
    Ok(cfg)
}

/// Startup configuration: optional file, then environment overrides.
///
/// A broken config file must not keep the sidecar from starting; the problem
/// is returned alongside the defaults so it can be logged once logging is up.
pub fn load() -> (Config, Option<anyhow::Error>) {
    let from_file = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let (mut cfg, problem) = match from_file {
        Some(path) => match read_config_file(&path) {
            Ok(cfg) => (cfg, None),
            Err(e) => (Config::default(), Some(e)),
        },
        None => (Config::default(), None),
    };
    apply_env(
        &mut cfg,
        std::env::var(LOG_ENV).ok(),
        std::env::var(STATS_SCOPE_ENV).ok(),
    );
    (cfg, problem)
}

fn apply_env(cfg: &mut Config, log: Option<String>, scope: Option<String>) {
    if let Some(log) = log.filter(|s| !s.trim().is_empty()) {
        cfg.log_filter = log;
    }
    if let Some(scope) = scope.as_deref().and_then(StatsScope::parse) {
        cfg.stats_scope = scope;
    }
}

/// Log to stderr; stdout carries the protocol.
pub fn init_logging(filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("edutrackd=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
