//! Signal evaluation: one independent judgment per applicable signal.
//!
//! Requests are fanned out with `tokio::spawn` and awaited one by one, so the
//! result list keeps catalog order no matter which call finishes first. A
//! failed, panicked or out-of-range judgment is replaced by a zero score with a
//! diagnostic reason; it never aborts the batch.

use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::catalog::{catalog, Signal};
use crate::judgment::{judge_logged, DynJudge, JudgmentObject, JudgmentRequest};

/// Scores at or above this count as passed.
pub const PASS_THRESHOLD: f32 = 0.7;
/// Scores below this count as failed.
pub const FAIL_THRESHOLD: f32 = 0.3;
/// Default cut-off for [`get_high_risk_signals`].
pub const DEFAULT_HIGH_RISK_THRESHOLD: f32 = 0.3;

const SIGNAL_INSTRUCTIONS: &str = "You verify the authenticity of a job applicant. \
Judge ONE signal against the supplied applicant data. \
Return {\"evaluation_score\": number between 0 and 1 (1 = signal fully satisfied, looks authentic), \
\"reason\": one or two sentences citing the evidence}.";

/// Data available to the evaluator for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalContext {
    #[serde(default, rename = "cvData", alias = "cv_data")]
    pub cv_data: Option<Value>,
    #[serde(default, rename = "linkedinData", alias = "linkedin_data")]
    pub linkedin_data: Option<Value>,
    #[serde(default)]
    pub extra: Option<Value>,
}

impl SignalContext {
    pub fn satisfies(&self, signal: &Signal) -> bool {
        (!signal.requires_cv || self.cv_data.is_some())
            && (!signal.requires_linkedin || self.linkedin_data.is_some())
    }
}

/// Validated judgment for one signal. Never mutated; re-evaluation builds a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvaluation {
    pub evaluation_score: f32,
    pub reason: String,
}

impl SignalEvaluation {
    fn failed(reason: impl Into<String>) -> Self {
        Self {
            evaluation_score: 0.0,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalEvaluationResult {
    pub signal: Signal,
    pub evaluation: SignalEvaluation,
}

impl SignalEvaluationResult {
    pub fn score(&self) -> f32 {
        self.evaluation.evaluation_score
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub total_signals: usize,
    pub passed_signals: usize,
    pub failed_signals: usize,
    pub average_score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallScore {
    pub overall_score: f32,
    pub weighted_score: f32,
    pub summary: ScoreSummary,
}

/// Everything one evaluation run produced; consumed by the aggregator.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalReport {
    pub results: Vec<SignalEvaluationResult>,
    pub overall: OverallScore,
    pub high_risk: Vec<SignalEvaluationResult>,
}

impl SignalReport {
    pub fn from_results(results: Vec<SignalEvaluationResult>, high_risk_threshold: f32) -> Self {
        let overall = calculate_overall_score(&results);
        let high_risk = get_high_risk_signals(&results, high_risk_threshold);
        Self {
            results,
            overall,
            high_risk,
        }
    }
}

/// Evaluate every signal whose data requirements `context` satisfies.
///
/// Unmet signals are dropped before evaluation. The returned list preserves
/// the order of `signals`.
pub async fn evaluate_all(
    client: DynJudge,
    context: &SignalContext,
    signals: &[Signal],
) -> Vec<SignalEvaluationResult> {
    let applicable: Vec<Signal> = signals
        .iter()
        .filter(|s| context.satisfies(s))
        .copied()
        .collect();
    info!(
        applicable = applicable.len(),
        skipped = signals.len() - applicable.len(),
        "evaluating signals"
    );

    let shared = Arc::new(json!({
        "cvData": context.cv_data,
        "linkedinData": context.linkedin_data,
        "extra": context.extra,
    }));

    let handles: Vec<_> = applicable
        .iter()
        .map(|signal| {
            let client = client.clone();
            let shared = shared.clone();
            let signal = *signal;
            tokio::spawn(async move { evaluate_one(client, signal, &shared).await })
        })
        .collect();

    let mut out = Vec::with_capacity(handles.len());
    for (signal, handle) in applicable.into_iter().zip(handles) {
        let evaluation = match handle.await {
            Ok(e) => e,
            Err(join_err) => {
                warn!(signal = signal.name, error = %join_err, "signal task aborted");
                SignalEvaluation::failed(format!("Evaluation task failed: {join_err}"))
            }
        };
        debug!(signal = signal.name, score = evaluation.evaluation_score, "signal evaluated");
        out.push(SignalEvaluationResult { signal, evaluation });
    }
    counter!("signal_evaluations_total").increment(out.len() as u64);
    out
}

/// [`evaluate_all`] over the full catalog.
pub async fn evaluate_all_signals(
    client: DynJudge,
    context: &SignalContext,
) -> Vec<SignalEvaluationResult> {
    evaluate_all(client, context, catalog()).await
}

async fn evaluate_one(client: DynJudge, signal: Signal, shared: &Value) -> SignalEvaluation {
    let mut context = shared.clone();
    if let Value::Object(map) = &mut context {
        map.insert(
            "signal".into(),
            json!({ "name": signal.name, "description": signal.description }),
        );
    }
    let request = JudgmentRequest::new("signal", SIGNAL_INSTRUCTIONS, context);

    match judge_logged(client.as_ref(), &request).await {
        Ok(obj) => validate_evaluation(&obj).unwrap_or_else(|why| {
            warn!(signal = signal.name, %why, "invalid signal judgment");
            SignalEvaluation::failed(format!("Invalid evaluation: {why}"))
        }),
        Err(e) => SignalEvaluation::failed(format!("Evaluation failed: {e}")),
    }
}

/// `evaluation_score` must be a finite number in [0,1]; anything else is a failure.
pub fn validate_evaluation(obj: &JudgmentObject) -> Result<SignalEvaluation, String> {
    let raw = obj
        .get("evaluation_score")
        .ok_or_else(|| "missing evaluation_score".to_string())?;
    let score = raw
        .as_f64()
        .ok_or_else(|| format!("evaluation_score is not a number: {raw}"))?;
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(format!("evaluation_score out of range: {score}"));
    }
    let reason = obj
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("No reason given")
        .to_string();
    Ok(SignalEvaluation {
        evaluation_score: score as f32,
        reason,
    })
}

/// Unweighted and importance-weighted averages plus pass/fail counts.
/// Empty input yields all zeros.
pub fn calculate_overall_score(results: &[SignalEvaluationResult]) -> OverallScore {
    if results.is_empty() {
        return OverallScore::default();
    }

    let total = results.len();
    let sum: f32 = results.iter().map(|r| r.score()).sum();
    let average = sum / total as f32;

    let importance_sum: f32 = results.iter().map(|r| r.signal.importance).sum();
    let weighted = if importance_sum > 0.0 {
        results
            .iter()
            .map(|r| r.score() * r.signal.importance)
            .sum::<f32>()
            / importance_sum
    } else {
        0.0
    };

    OverallScore {
        overall_score: average,
        weighted_score: weighted,
        summary: ScoreSummary {
            total_signals: total,
            passed_signals: results.iter().filter(|r| r.score() >= PASS_THRESHOLD).count(),
            failed_signals: results.iter().filter(|r| r.score() < FAIL_THRESHOLD).count(),
            average_score: average,
        },
    }
}

/// Signals scoring below `threshold`, highest importance first. Ties keep input order.
pub fn get_high_risk_signals(
    results: &[SignalEvaluationResult],
    threshold: f32,
) -> Vec<SignalEvaluationResult> {
    let mut risky: Vec<SignalEvaluationResult> = results
        .iter()
        .filter(|r| r.score() < threshold)
        .cloned()
        .collect();
    risky.sort_by(|a, b| b.signal.importance.total_cmp(&a.signal.importance));
    risky
}
