//! Judgment adapter: the external reasoning service every analyzer talks to.
//!
//! A request is a rubric (`instructions`) plus a JSON `context`; the answer is a
//! single JSON object. Callers never trust the object's shape: every stage
//! validates and clamps what it reads.

use std::fs;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::{JudgmentConfig, ProviderKind};

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// The object returned by the reasoning service.
pub type JudgmentObject = Map<String, Value>;

/// One judgment call: rubric in, JSON object out.
#[derive(Debug, Clone, Serialize)]
pub struct JudgmentRequest {
    /// Short stage label used for metrics and logs ("signal", "cv", ...).
    pub task: &'static str,
    pub instructions: String,
    pub context: Value,
}

impl JudgmentRequest {
    pub fn new(task: &'static str, instructions: impl Into<String>, context: Value) -> Self {
        Self {
            task,
            instructions: instructions.into(),
            context,
        }
    }

    /// Stable SHA-256 over task, rubric and context. Used as cache key and as an
    /// anonymised id in logs (never log the raw context).
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.task.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.instructions.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.context.to_string().as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(64);
        for b in digest.iter() {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

/// Trait object injected into every analyzer.
pub trait JudgmentClient: Send + Sync {
    fn judge<'a>(
        &'a self,
        request: &'a JudgmentRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<JudgmentObject>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Process-wide client handle.
pub type DynJudge = Arc<dyn JudgmentClient>;

/// Build the process-wide client from config.
///
/// * `JUDGMENT_TEST_MODE=mock` or `provider = "mock"` → deterministic mock.
/// * `enabled = false` → [`DisabledClient`]; every stage degrades to its fallback.
/// * otherwise the real provider wrapped with caching + daily limit.
pub fn build_client(config: &JudgmentConfig) -> anyhow::Result<DynJudge> {
    if JudgmentConfig::mock_forced() {
        return Ok(mock_client(config));
    }

    if !config.enabled {
        return Ok(Arc::new(DisabledClient));
    }

    let timeout = Duration::from_secs(config.timeout_secs);
    let client: DynJudge = match config.provider {
        ProviderKind::Claude => Arc::new(CachingClient::new(
            ClaudeProvider::new(config.api_key.clone(), config.model.as_deref(), timeout)?,
            config.cache_dir.clone(),
            config.daily_limit,
        )),
        ProviderKind::OpenAi => Arc::new(CachingClient::new(
            OpenAiProvider::new(config.api_key.clone(), config.model.as_deref(), timeout)?,
            config.cache_dir.clone(),
            config.daily_limit,
        )),
        ProviderKind::Mock => mock_client(config),
    };
    Ok(client)
}

fn mock_client(config: &JudgmentConfig) -> DynJudge {
    Arc::new(CachingClient::new(
        MockProvider::neutral(),
        config.cache_dir.clone(),
        config.daily_limit,
    ))
}

/// Issue one judgment with metrics and anonymised logging.
pub async fn judge_logged(
    client: &dyn JudgmentClient,
    request: &JudgmentRequest,
) -> anyhow::Result<JudgmentObject> {
    counter!("judgment_calls_total", "task" => request.task).increment(1);
    match client.judge(request).await {
        Ok(obj) => {
            debug!(
                task = request.task,
                provider = client.provider_name(),
                keys = obj.len(),
                "judgment ok"
            );
            Ok(obj)
        }
        Err(e) => {
            counter!("judgment_failures_total", "task" => request.task).increment(1);
            let id = request.fingerprint();
            warn!(
                task = request.task,
                provider = client.provider_name(),
                id = %&id[..12],
                error = %e,
                "judgment failed"
            );
            Err(e)
        }
    }
}

// ------------------------------------------------------------
// Provider abstraction + concrete providers
// ------------------------------------------------------------

/// Low-level provider: does a *real* remote call. Separated so the same
/// caching wrapper serves production and tests.
pub trait Provider: Send + Sync + 'static {
    fn fetch<'a>(
        &'a self,
        request: &'a JudgmentRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<JudgmentObject>> + Send + 'a>>;
    fn name(&self) -> &'static str;
}

const SYSTEM_SUFFIX: &str =
    "Respond with ONE JSON object only. No prose before or after it, no Markdown.";
const MAX_TOKENS: u32 = 2048;

fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("applicant-verifier/0.1")
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .context("building reqwest client")
}

fn user_message(request: &JudgmentRequest) -> String {
    // Pretty JSON reads better for the model than a single line.
    serde_json::to_string_pretty(&request.context).unwrap_or_else(|_| request.context.to_string())
}

/// Anthropic Messages API.
pub struct ClaudeProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl ClaudeProvider {
    pub fn new(api_key: String, model: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            model: model.unwrap_or("claude-3-5-sonnet-latest").to_string(),
        })
    }
}

impl Provider for ClaudeProvider {
    fn fetch<'a>(
        &'a self,
        request: &'a JudgmentRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<JudgmentObject>> + Send + 'a>> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(anyhow!("claude: missing api key"));
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                max_tokens: u32,
                temperature: f32,
                system: &'a str,
                messages: Vec<Msg<'a>>,
            }
            #[derive(Deserialize)]
            struct Resp {
                content: Vec<Block>,
            }
            #[derive(Deserialize)]
            struct Block {
                #[serde(default)]
                text: Option<String>,
            }

            let system = format!("{}\n\n{}", request.instructions, SYSTEM_SUFFIX);
            let user = user_message(request);
            let req = Req {
                model: &self.model,
                max_tokens: MAX_TOKENS,
                temperature: 0.0,
                system: &system,
                messages: vec![Msg {
                    role: "user",
                    content: &user,
                }],
            };

            let resp = self
                .http
                .post("https://api.anthropic.com/v1/messages")
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&req)
                .send()
                .await
                .context("claude request")?
                .error_for_status()
                .context("claude status")?;
            let body: Resp = resp.json().await.context("claude body")?;
            let text: String = body.content.into_iter().filter_map(|b| b.text).collect();
            parse_judgment_object(&text)
        })
    }
    fn name(&self) -> &'static str {
        "claude"
    }
}

/// OpenAI Chat Completions API.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            model: model.unwrap_or("gpt-4o-mini").to_string(),
        })
    }
}

impl Provider for OpenAiProvider {
    fn fetch<'a>(
        &'a self,
        request: &'a JudgmentRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<JudgmentObject>> + Send + 'a>> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(anyhow!("openai: missing api key"));
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: String,
            }

            let system = format!("{}\n\n{}", request.instructions, SYSTEM_SUFFIX);
            let user = user_message(request);
            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: &system,
                    },
                    Msg {
                        role: "user",
                        content: &user,
                    },
                ],
                temperature: 0.0,
                max_tokens: MAX_TOKENS,
            };

            let resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .context("openai request")?
                .error_for_status()
                .context("openai status")?;
            let body: Resp = resp.json().await.context("openai body")?;
            let content = body
                .choices
                .first()
                .map(|c| c.message.content.as_str())
                .unwrap_or("");
            parse_judgment_object(content)
        })
    }
    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Always fails; used when judgment is disabled so every stage degrades.
pub struct DisabledClient;

impl JudgmentClient for DisabledClient {
    fn judge<'a>(
        &'a self,
        _request: &'a JudgmentRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<JudgmentObject>> + Send + 'a>> {
        Box::pin(async { Err(anyhow!("judgment service disabled")) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Returns the same object for every request.
#[derive(Clone)]
pub struct MockProvider {
    pub fixed: JudgmentObject,
}

impl MockProvider {
    /// Mid-range answer: a 0.5 signal score and no flags; analyzers fill the
    /// remaining metrics with their defaults.
    pub fn neutral() -> Self {
        let mut fixed = Map::new();
        fixed.insert("evaluation_score".into(), Value::from(0.5));
        fixed.insert("reason".into(), Value::from("Neutral judgment (mock)"));
        fixed.insert("credibilityScore".into(), Value::from(50));
        fixed.insert("summary".into(), Value::from("Mock assessment."));
        fixed.insert("flags".into(), Value::Array(Vec::new()));
        Self { fixed }
    }
}

impl Provider for MockProvider {
    fn fetch<'a>(
        &'a self,
        _request: &'a JudgmentRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<JudgmentObject>> + Send + 'a>> {
        let out = self.fixed.clone();
        Box::pin(async move { Ok(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Caching client wrapper (file cache + daily limit)
// ------------------------------------------------------------

/// Counter state is guarded by a `Mutex`; the file cache is best-effort.
pub struct CachingClient<P: Provider> {
    inner: P,
    cache_dir: PathBuf,
    daily_limit_max: u32,
    counter: Arc<Mutex<DailyCounter>>,
}

impl<P: Provider> CachingClient<P> {
    pub fn new(inner: P, cache_dir: PathBuf, daily_limit_max: u32) -> Self {
        let _ = fs::create_dir_all(&cache_dir); // best-effort
        let counter = Arc::new(Mutex::new(
            load_daily_counter(&cache_dir).unwrap_or_default(),
        ));
        Self {
            inner,
            cache_dir,
            daily_limit_max,
            counter,
        }
    }

    async fn judge_impl(&self, request: &JudgmentRequest) -> anyhow::Result<JudgmentObject> {
        let key = request.fingerprint();

        // Cache hits are free and do not count against the limit.
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            return Ok(hit);
        }

        {
            let mut g = self.counter.lock().unwrap_or_else(|p| p.into_inner());
            if g.is_expired() {
                g.reset_to_today();
                let _ = save_daily_counter(&self.cache_dir, &g);
            }
            if g.count >= self.daily_limit_max {
                return Err(anyhow!(
                    "daily judgment limit reached ({})",
                    self.daily_limit_max
                ));
            }
        }

        let fresh = self.inner.fetch(request).await?;
        let _ = write_cache_file(&self.cache_dir, &key, &fresh);
        let mut g = self.counter.lock().unwrap_or_else(|p| p.into_inner());
        g.count = g.count.saturating_add(1);
        let _ = save_daily_counter(&self.cache_dir, &g);
        Ok(fresh)
    }
}

impl<P: Provider> JudgmentClient for CachingClient<P> {
    fn judge<'a>(
        &'a self,
        request: &'a JudgmentRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<JudgmentObject>> + Send + 'a>> {
        Box::pin(self.judge_impl(request))
    }
    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}

// ------------------------------------------------------------
// File cache helpers
// ------------------------------------------------------------

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<JudgmentObject> {
    let s = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&s).ok()
}

fn write_cache_file(dir: &Path, key: &str, value: &JudgmentObject) -> io::Result<()> {
    let path = cache_path(dir, key);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    let mut f = fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    fs::rename(tmp, path)?;
    Ok(())
}

// ------------------------------------------------------------
// Daily counter helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}
impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}
impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }
    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Utc::now().date_naive().to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    let p = counter_path(dir);
    let tmp = p.with_extension("json.tmp");
    let s = serde_json::to_string(dc).unwrap_or_else(|_| "{}".to_string());
    let mut f = fs::File::create(&tmp)?;
    f.write_all(s.as_bytes())?;
    fs::rename(tmp, p)?;
    Ok(())
}

// ------------------------------------------------------------
// Response parsing
// ------------------------------------------------------------

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("fence regex"));

/// Extract the single JSON object from a model reply.
///
/// Accepts bare JSON, fenced ```json blocks, or an object embedded in prose
/// (outermost braces). Arrays, scalars and malformed JSON are errors.
pub fn parse_judgment_object(text: &str) -> anyhow::Result<JudgmentObject> {
    let unfenced = RE_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);

    let start = unfenced
        .find('{')
        .ok_or_else(|| anyhow!("no JSON object in judgment reply"))?;
    let end = unfenced
        .rfind('}')
        .filter(|&e| e > start)
        .ok_or_else(|| anyhow!("unterminated JSON object in judgment reply"))?;

    match serde_json::from_str::<Value>(&unfenced[start..=end]).context("judgment reply JSON")? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("judgment reply is not an object: {}", kind_of(&other))),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
