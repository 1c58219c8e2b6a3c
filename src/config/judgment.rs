// src/config/judgment.rs
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

pub const ENV_JUDGMENT_ENABLED: &str = "JUDGMENT_ENABLED";
pub const ENV_JUDGMENT_PROVIDER: &str = "JUDGMENT_PROVIDER";
pub const ENV_JUDGMENT_MODEL: &str = "JUDGMENT_MODEL";
pub const ENV_JUDGMENT_DAILY_LIMIT: &str = "JUDGMENT_DAILY_LIMIT";
pub const ENV_JUDGMENT_TIMEOUT_SECS: &str = "JUDGMENT_TIMEOUT_SECS";
/// `JUDGMENT_TEST_MODE=mock` forces the deterministic mock provider.
pub const ENV_JUDGMENT_TEST_MODE: &str = "JUDGMENT_TEST_MODE";

fn default_timeout_secs() -> u64 {
    30
}
fn default_daily_limit() -> u32 {
    500
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache/judgment")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Claude,
    OpenAi,
    Mock,
}

impl ProviderKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "claude" | "anthropic" => Some(Self::Claude),
            "openai" => Some(Self::OpenAi),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JudgmentConfig {
    pub enabled: bool,
    pub provider: ProviderKind,
    /// Provider default when `None`.
    pub model: Option<String>,
    /// "ENV" means: read from ANTHROPIC_API_KEY / OPENAI_API_KEY (by provider)
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Real provider calls per day; cache hits do not count.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for JudgmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: ProviderKind::Claude,
            model: None,
            api_key: "ENV".to_string(),
            timeout_secs: default_timeout_secs(),
            daily_limit: default_daily_limit(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl JudgmentConfig {
    pub(crate) fn apply_env(&mut self) {
        if let Ok(v) = env::var(ENV_JUDGMENT_ENABLED) {
            self.enabled = super::parse_bool(&v);
        }
        if let Some(p) = env::var(ENV_JUDGMENT_PROVIDER)
            .ok()
            .and_then(|v| ProviderKind::parse(&v))
        {
            self.provider = p;
        }
        if let Ok(m) = env::var(ENV_JUDGMENT_MODEL) {
            if !m.trim().is_empty() {
                self.model = Some(m.trim().to_string());
            }
        }
        if let Some(n) = env::var(ENV_JUDGMENT_DAILY_LIMIT)
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
        {
            self.daily_limit = n;
        }
        if let Some(n) = env::var(ENV_JUDGMENT_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.timeout_secs = n;
        }
    }

    pub(crate) fn sanitize(&mut self) {
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
    }

    /// Resolve an `"ENV"` api key from the provider's env var.
    /// A disabled or mock configuration never needs a key.
    pub fn resolve_api_key(&mut self) -> anyhow::Result<()> {
        if !self.enabled || self.provider == ProviderKind::Mock {
            return Ok(());
        }
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = match self.provider {
                ProviderKind::Claude => env::var("ANTHROPIC_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing ANTHROPIC_API_KEY env var"))?,
                ProviderKind::OpenAi => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                ProviderKind::Mock => String::new(),
            };
        }
        Ok(())
    }

    /// True when `JUDGMENT_TEST_MODE=mock` is set.
    pub fn mock_forced() -> bool {
        env::var(ENV_JUDGMENT_TEST_MODE)
            .map(|v| v.trim().eq_ignore_ascii_case("mock"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_parse_case_insensitively() {
        assert_eq!(ProviderKind::parse("Claude"), Some(ProviderKind::Claude));
        assert_eq!(ProviderKind::parse("anthropic"), Some(ProviderKind::Claude));
        assert_eq!(ProviderKind::parse("OPENAI"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::parse("gemini"), None);
    }

    #[test]
    fn disabled_config_skips_key_resolution() {
        let mut cfg = JudgmentConfig::default();
        assert!(cfg.resolve_api_key().is_ok());
        assert_eq!(cfg.api_key, "ENV");
    }

    #[test]
    fn toml_section_parses() {
        let cfg: JudgmentConfig = toml::from_str(
            r#"
            enabled = true
            provider = "openai"
            model = "gpt-4o-mini"
            api_key = "sk-test"
            daily_limit = 7
            "#,
        )
        .unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.provider, ProviderKind::OpenAi);
        assert_eq!(cfg.daily_limit, 7);
        assert_eq!(cfg.timeout_secs, 30);
    }
}
