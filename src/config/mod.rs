// src/config/mod.rs
//! Service configuration: one TOML file plus environment overrides.
//!
//! Resolution order for every key: env var → `config/verify.toml` (or
//! `$VERIFY_CONFIG_PATH`) → built-in default. A missing file is not an error.

pub mod judgment;

use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

pub use judgment::{JudgmentConfig, ProviderKind};

// --- env defaults & names ---
pub const DEFAULT_CONFIG_PATH: &str = "config/verify.toml";
pub const ENV_CONFIG_PATH: &str = "VERIFY_CONFIG_PATH";
pub const ENV_HOST: &str = "VERIFY_HOST";
pub const ENV_PORT: &str = "VERIFY_PORT";
pub const ENV_LOG_LEVEL: &str = "VERIFY_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
pub const ENV_HIGH_RISK_THRESHOLD: &str = "VERIFY_HIGH_RISK_THRESHOLD";
pub const ENV_PERSIST_RETRIES: &str = "VERIFY_PERSIST_RETRIES";
pub const ENV_AUTO_ANALYZE_PARTIAL: &str = "VERIFY_AUTO_ANALYZE_PARTIAL";

const MAX_PERSIST_RETRIES: u8 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub judgment: JudgmentConfig,
    pub pipeline: PipelineConfig,
}

/// HTTP binding.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|e| anyhow::anyhow!("server.host `{}` is not an IP address: {e}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Knobs for the coordinator and the signal evaluator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Signals scoring below this are reported as high risk.
    pub high_risk_threshold: f32,
    /// Attempts to persist an analysis record before the AI stage is marked `error`.
    pub persist_retries: u8,
    /// Base backoff between persistence attempts (doubles per attempt).
    pub persist_backoff_ms: u64,
    /// Run the aggregator automatically for applicants below the eligibility gate.
    pub auto_analyze_partial: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            high_risk_threshold: 0.3,
            persist_retries: 3,
            persist_backoff_ms: 500,
            auto_analyze_partial: true,
        }
    }
}

impl AppConfig {
    /// Load from `$VERIFY_CONFIG_PATH` (or the default path) and apply env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut cfg = Self::from_path(&path)?;
        cfg.apply_env();
        cfg.judgment.resolve_api_key()?;
        Ok(cfg)
    }

    /// Read a TOML file; a missing file yields defaults.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        match fs::read_to_string(path) {
            Ok(s) => Self::from_toml_str(&s)
                .map_err(|e| anyhow::anyhow!("invalid config at {}: {e}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            )),
        }
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(h) = std::env::var(ENV_HOST) {
            if !h.trim().is_empty() {
                self.server.host = h.trim().to_string();
            }
        }
        if let Some(p) = env_parse::<u16>(ENV_PORT) {
            self.server.port = p;
        }
        if let Ok(l) = std::env::var(ENV_LOG_LEVEL) {
            if !l.trim().is_empty() {
                self.telemetry.log_level = l.trim().to_string();
            }
        }
        if let Ok(f) = std::env::var(ENV_LOG_FORMAT) {
            self.telemetry.format = if f.trim().eq_ignore_ascii_case("json") {
                LogFormat::Json
            } else {
                LogFormat::Compact
            };
        }
        if let Some(t) = env_parse::<f32>(ENV_HIGH_RISK_THRESHOLD) {
            self.pipeline.high_risk_threshold = t;
        }
        if let Some(r) = env_parse::<u8>(ENV_PERSIST_RETRIES) {
            self.pipeline.persist_retries = r;
        }
        if let Ok(v) = std::env::var(ENV_AUTO_ANALYZE_PARTIAL) {
            self.pipeline.auto_analyze_partial = parse_bool(&v);
        }
        self.judgment.apply_env();
        self.sanitize();
    }

    fn sanitize(&mut self) {
        let t = self.pipeline.high_risk_threshold;
        self.pipeline.high_risk_threshold = if t.is_finite() {
            t.clamp(0.0, 1.0)
        } else {
            PipelineConfig::default().high_risk_threshold
        };
        self.pipeline.persist_retries = self.pipeline.persist_retries.clamp(1, MAX_PERSIST_RETRIES);
        self.judgment.sanitize();
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

pub(crate) fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
