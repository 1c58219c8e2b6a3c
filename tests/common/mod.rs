// tests/common/mod.rs
//
// Shared test doubles: a scripted judgment client and a store that fails
// (or panics on) analysis writes.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{json, Value};

use applicant_verifier::judgment::JudgmentObject;
use applicant_verifier::{
    Applicant, ApplicantStore, AnalysisRecord, Coordinator, CoordinatorSettings, DynJudge,
    JudgmentClient, JudgmentRequest, MemoryStore, Pipeline, Stage, StageStatus,
};

#[derive(Clone)]
enum Reply {
    Object(Value),
    Fail(&'static str),
    Panic,
}

/// Answers by task label; signal judgments can be scripted per signal name.
/// Unscripted tasks fail, which drives every stage to its fallback.
#[derive(Default)]
pub struct ScriptedJudge {
    replies: HashMap<&'static str, Reply>,
    signals: HashMap<String, Value>,
    calls: Mutex<Vec<JudgmentRequest>>,
    delay: Option<Duration>,
}

impl ScriptedJudge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every task answers with a plausible, fully populated object.
    pub fn healthy() -> Self {
        Self::new()
            .reply("cv", json!({
                "completenessScore": 80, "consistencyScore": 90, "experienceRealismScore": 70,
                "skillsCredibilityScore": 75, "educationVerificationScore": 85,
                "timelineGapScore": 100, "hasEmploymentGaps": false,
                "strengths": ["clear history"], "concerns": [], "flags": []
            }))
            .reply("linkedin", json!({
                "profileCompletenessScore": 90, "experienceConsistencyScore": 80,
                "networkAuthenticityScore": 70, "endorsementCredibilityScore": 60,
                "activityScore": 50, "accountMaturityScore": 90,
                "hasActivity": true, "hasRecommendations": true, "flags": []
            }))
            .reply("github", json!({
                "codeQualityScore": 70, "activityConsistencyScore": 70,
                "contributionRealismScore": 70, "profileCompletenessScore": 70,
                "skillsAlignmentScore": 70, "projectQualityScore": 70,
                "hasActivity": true, "hasOriginalProjects": true, "topLanguages": ["Rust"]
            }))
            .reply("cross_reference", json!({
                "cvLinkedInConsistency": 88, "cvGitHubConsistency": 75,
                "linkedInGitHubConsistency": 70, "overallConsistency": 80,
                "discrepancies": [], "flags": []
            }))
            .reply("signal", json!({ "evaluation_score": 0.9, "reason": "consistent" }))
            .reply("aggregate", json!({
                "credibilityScore": 82,
                "summary": "Sources agree on employment history.",
                "flags": [{"type": "yellow", "category": "activity", "message": "Low LinkedIn activity", "severity": 3}],
                "suggestedQuestions": ["Walk us through your last role."]
            }))
    }

    pub fn reply(mut self, task: &'static str, obj: Value) -> Self {
        self.replies.insert(task, Reply::Object(obj));
        self
    }

    pub fn fail(mut self, task: &'static str) -> Self {
        self.replies.insert(task, Reply::Fail("scripted failure"));
        self
    }

    pub fn panic_on(mut self, task: &'static str) -> Self {
        self.replies.insert(task, Reply::Panic);
        self
    }

    /// Every answer waits `delay` first.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn signal(mut self, name: &str, obj: Value) -> Self {
        self.signals.insert(name.to_string(), obj);
        self
    }

    pub fn shared(self) -> Arc<ScriptedJudge> {
        Arc::new(self)
    }

    pub fn calls(&self, task: &str) -> usize {
        self.requests(task).len()
    }

    pub fn requests(&self, task: &str) -> Vec<JudgmentRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.task == task)
            .cloned()
            .collect()
    }

    fn answer(&self, request: &JudgmentRequest) -> anyhow::Result<JudgmentObject> {
        self.calls.lock().unwrap().push(request.clone());
        let scripted_signal = (request.task == "signal")
            .then(|| request.context["signal"]["name"].as_str())
            .flatten()
            .and_then(|name| self.signals.get(name));
        let reply = match scripted_signal {
            Some(obj) => Reply::Object(obj.clone()),
            None => self
                .replies
                .get(request.task)
                .cloned()
                .unwrap_or(Reply::Fail("unscripted task")),
        };
        match reply {
            Reply::Object(Value::Object(map)) => Ok(map),
            Reply::Object(other) => Err(anyhow!("not an object: {other}")),
            Reply::Fail(why) => Err(anyhow!(why)),
            Reply::Panic => panic!("scripted panic in {}", request.task),
        }
    }
}

impl JudgmentClient for ScriptedJudge {
    fn judge<'a>(
        &'a self,
        request: &'a JudgmentRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<JudgmentObject>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.answer(request)
        })
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

pub fn cv_data() -> Value {
    json!({ "name": "Jane Doe", "experience": [{"company": "Acme", "title": "Engineer", "from": "2019", "to": "2024"}] })
}

pub fn linkedin_data() -> Value {
    json!({ "fullName": "Jane Doe", "headline": "Engineer at Acme", "connections": 350 })
}

pub fn github_data() -> Value {
    json!({ "login": "janedoe", "name": "Jane Doe", "public_repos": 12 })
}

pub fn fast_settings() -> CoordinatorSettings {
    CoordinatorSettings {
        auto_analyze_partial: true,
        persist_retries: 3,
        persist_backoff: Duration::from_millis(1),
    }
}

pub fn coordinator_with(
    judge: Arc<ScriptedJudge>,
    store: Arc<dyn ApplicantStore>,
    settings: CoordinatorSettings,
) -> Coordinator {
    let judge: DynJudge = judge;
    Coordinator::new(store, Pipeline::new(judge, 0.3), settings)
}

pub fn coordinator(judge: Arc<ScriptedJudge>) -> Coordinator {
    coordinator_with(judge, Arc::new(MemoryStore::new()), fast_settings())
}

/// Delegates to a [`MemoryStore`] but fails the first `failures` analysis writes,
/// or panics on every analysis write.
pub struct FlakyStore {
    inner: MemoryStore,
    failures: AtomicUsize,
    panics: bool,
    pub attempts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures: AtomicUsize::new(failures),
            panics: false,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::new(0)
        }
    }
}

#[async_trait]
impl ApplicantStore for FlakyStore {
    async fn create_applicant(&self, name: Option<String>) -> anyhow::Result<Applicant> {
        self.inner.create_applicant(name).await
    }

    async fn read_applicant(&self, id: &str) -> anyhow::Result<Option<Applicant>> {
        self.inner.read_applicant(id).await
    }

    async fn write_source_status(
        &self,
        id: &str,
        stage: Stage,
        status: StageStatus,
        data: Option<Value>,
    ) -> anyhow::Result<Applicant> {
        self.inner.write_source_status(id, stage, status, data).await
    }

    async fn write_analysis_result(
        &self,
        id: &str,
        record: AnalysisRecord,
    ) -> anyhow::Result<Applicant> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("storage driver crashed");
        }
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(anyhow!("storage unavailable"));
        }
        self.inner.write_analysis_result(id, record).await
    }

    async fn start_new_run(&self, id: &str) -> anyhow::Result<Applicant> {
        self.inner.start_new_run(id).await
    }
}
