//! Per-source analyzers, the cross-reference analyzer and the aggregator.
//!
//! Every entry point here is total: an external failure becomes a canned
//! degraded report carrying a single `yellow/verification` flag, an absent
//! input becomes `None`.

pub mod aggregate;
pub mod cross_reference;
pub mod cv;
pub mod github;
pub mod linkedin;
pub mod normalize;

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::judgment::{judge_logged, JudgmentClient, JudgmentObject, JudgmentRequest};

pub use aggregate::{aggregate, AggregateInput, AnalysisResult, CredibilityBand, SourceSummary};
pub use cross_reference::{
    cross_reference_analysis, CrossReferenceAnalysis, Discrepancy, DiscrepancySeverity,
};
pub use cv::{analyze_cv, CvAnalysis};
pub use github::{analyze_github, GitHubAnalysis};
pub use linkedin::{analyze_linkedin, LinkedInAnalysis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagType {
    Red,
    Yellow,
}

/// A structured concern raised by any analysis stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    pub category: String,
    pub message: String,
    /// 1..=10
    pub severity: u8,
}

impl Flag {
    /// The single flag attached to a degraded (fallback) report.
    pub fn analysis_failed(what: &str) -> Self {
        Self {
            flag_type: FlagType::Yellow,
            category: normalize::DEFAULT_CATEGORY.to_string(),
            message: format!("{what} analysis failed; manual verification required"),
            severity: normalize::DEFAULT_SEVERITY,
        }
    }
}

/// Rank flags: red before yellow, then by severity (highest first). Stable.
pub fn rank_flags(flags: &mut [Flag]) {
    flags.sort_by(|a, b| {
        let red = |f: &Flag| matches!(f.flag_type, FlagType::Red);
        red(b).cmp(&red(a)).then(b.severity.cmp(&a.severity))
    });
}

/// A report shape produced from one judgment call.
pub(crate) trait Report: Sized {
    /// Metrics/log label.
    const TASK: &'static str;
    const INSTRUCTIONS: &'static str;

    fn from_judgment(obj: &JudgmentObject) -> Self;
    fn fallback() -> Self;
}

/// One judgment → validated report, or the report's canned fallback.
pub(crate) async fn run_report<R: Report>(client: &dyn JudgmentClient, context: Value) -> R {
    let request = JudgmentRequest::new(R::TASK, R::INSTRUCTIONS, context);
    match judge_logged(client, &request).await {
        Ok(obj) => R::from_judgment(&obj),
        Err(e) => {
            counter!("analysis_fallbacks_total", "stage" => R::TASK).increment(1);
            warn!(stage = R::TASK, error = %e, "analysis degraded to fallback");
            R::fallback()
        }
    }
}

pub(crate) fn mean(values: &[u8]) -> u8 {
    if values.is_empty() {
        return normalize::DEFAULT_METRIC;
    }
    let sum: u32 = values.iter().map(|&v| u32::from(v)).sum();
    (sum as f32 / values.len() as f32).round() as u8
}
