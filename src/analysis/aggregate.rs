//! Final aggregation into the durable [`AnalysisResult`].

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::normalize::{flags, metric, string_list, text, DEFAULT_METRIC, DEFAULT_SEVERITY};
use super::{
    rank_flags, CrossReferenceAnalysis, CvAnalysis, Flag, FlagType, GitHubAnalysis,
    LinkedInAnalysis,
};
use crate::applicant::{Applicant, SourceKind, StageStatus};
use crate::judgment::{judge_logged, JudgmentClient, JudgmentObject, JudgmentRequest};
use crate::signals::SignalReport;

const TASK: &str = "aggregate";
pub const MAX_SUGGESTED_QUESTIONS: usize = 3;

const FALLBACK_SUMMARY: &str =
    "Automated analysis could not be completed due to a technical error. Manual review required.";

/// Rubric bands for the credibility score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredibilityBand {
    HighlyCredible,
    Credible,
    Moderate,
    Questionable,
    HighRisk,
}

impl CredibilityBand {
    pub const ALL: [CredibilityBand; 5] = [
        Self::HighlyCredible,
        Self::Credible,
        Self::Moderate,
        Self::Questionable,
        Self::HighRisk,
    ];

    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Self::HighlyCredible,
            70..=89 => Self::Credible,
            50..=69 => Self::Moderate,
            30..=49 => Self::Questionable,
            _ => Self::HighRisk,
        }
    }

    pub fn range(self) -> (u8, u8) {
        match self {
            Self::HighlyCredible => (90, 100),
            Self::Credible => (70, 89),
            Self::Moderate => (50, 69),
            Self::Questionable => (30, 49),
            Self::HighRisk => (0, 29),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::HighlyCredible => "highly credible, sources consistent and verifiable",
            Self::Credible => "credible, minor gaps or unverifiable details",
            Self::Moderate => "moderate, several inconsistencies worth probing",
            Self::Questionable => "questionable, significant inconsistencies",
            Self::HighRisk => "high risk, likely fabricated or contradictory",
        }
    }
}

/// Per-source score line in the final result, built locally from ready analyses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    pub source: SourceKind,
    pub score: u8,
    pub flag_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub credibility_score: u8,
    pub summary: String,
    pub flags: Vec<Flag>,
    pub suggested_questions: Vec<String>,
    pub analysis_date: DateTime<Utc>,
    pub sources: Vec<SourceSummary>,
}

impl AnalysisResult {
    pub fn band(&self) -> CredibilityBand {
        CredibilityBand::from_score(self.credibility_score)
    }

    fn from_judgment(obj: &JudgmentObject, sources: Vec<SourceSummary>) -> Self {
        let mut flags = flags(obj);
        rank_flags(&mut flags);
        let mut questions = string_list(obj, "suggestedQuestions");
        questions.truncate(MAX_SUGGESTED_QUESTIONS);
        Self {
            credibility_score: metric(obj, "credibilityScore"),
            summary: text(obj, "summary").unwrap_or_else(|| "No summary provided.".to_string()),
            flags,
            suggested_questions: questions,
            analysis_date: Utc::now(),
            sources,
        }
    }

    fn fallback(sources: Vec<SourceSummary>) -> Self {
        Self {
            credibility_score: DEFAULT_METRIC,
            summary: FALLBACK_SUMMARY.to_string(),
            flags: vec![Flag {
                flag_type: FlagType::Yellow,
                category: "system".to_string(),
                message: "Final credibility assessment failed; scores are placeholders".to_string(),
                severity: DEFAULT_SEVERITY,
            }],
            suggested_questions: Vec::new(),
            analysis_date: Utc::now(),
            sources,
        }
    }

    /// Result for a run whose aggregation never returned.
    pub(crate) fn fallback_for(applicant: &Applicant, input: AggregateInput<'_>) -> Self {
        Self::fallback(input.restrict_to_ready(applicant).source_summaries())
    }
}

/// Inputs to [`aggregate`]. Every field is optional; analyses for sources
/// that are not `ready` on the applicant are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateInput<'a> {
    pub cv: Option<&'a CvAnalysis>,
    pub linkedin: Option<&'a LinkedInAnalysis>,
    pub github: Option<&'a GitHubAnalysis>,
    pub cross_reference: Option<&'a CrossReferenceAnalysis>,
    pub signals: Option<&'a SignalReport>,
}

impl<'a> AggregateInput<'a> {
    /// Drop analyses whose source is not `ready`.
    fn restrict_to_ready(self, applicant: &Applicant) -> Self {
        let ready = |kind: SourceKind| applicant.status(kind.stage()) == StageStatus::Ready;
        Self {
            cv: self.cv.filter(|_| ready(SourceKind::Cv)),
            linkedin: self.linkedin.filter(|_| ready(SourceKind::LinkedIn)),
            github: self.github.filter(|_| ready(SourceKind::GitHub)),
            cross_reference: self.cross_reference.filter(|_| ready(SourceKind::Cv)),
            signals: self.signals,
        }
    }

    fn source_summaries(&self) -> Vec<SourceSummary> {
        let mut out = Vec::new();
        if let Some(a) = self.cv {
            out.push(SourceSummary {
                source: SourceKind::Cv,
                score: a.score(),
                flag_count: a.flags.len(),
            });
        }
        if let Some(a) = self.linkedin {
            out.push(SourceSummary {
                source: SourceKind::LinkedIn,
                score: a.score(),
                flag_count: a.flags.len(),
            });
        }
        if let Some(a) = self.github {
            out.push(SourceSummary {
                source: SourceKind::GitHub,
                score: a.score(),
                flag_count: a.flags.len(),
            });
        }
        out
    }
}

fn instructions() -> String {
    let rubric: Vec<String> = CredibilityBand::ALL
        .iter()
        .map(|b| {
            let (lo, hi) = b.range();
            format!("{lo}-{hi}: {}", b.label())
        })
        .collect();
    format!(
        "You produce the final authenticity assessment of a job applicant from per-source \
reports, a cross-reference report and signal results. Only the listed availableSources were \
supplied; do not penalise absent optional sources. Return credibilityScore (0-100) using this \
rubric: {}. Also return summary (1-2 sentences), flags: [{{type: \"red\"|\"yellow\", category, \
message, severity 1-10}}] and suggestedQuestions (1-3 targeted interview questions).",
        rubric.join("; ")
    )
}

fn context(applicant: &Applicant, input: &AggregateInput<'_>) -> Value {
    let available: Vec<&str> = [
        (SourceKind::Cv, input.cv.is_some()),
        (SourceKind::LinkedIn, input.linkedin.is_some()),
        (SourceKind::GitHub, input.github.is_some()),
    ]
    .iter()
    .filter(|(_, present)| *present)
    .map(|(kind, _)| kind.as_str())
    .collect();

    let signals = input.signals.map(|report| {
        json!({
            "overall": report.overall,
            "highRisk": report
                .high_risk
                .iter()
                .map(|r| json!({
                    "name": r.signal.name,
                    "importance": r.signal.importance,
                    "score": r.evaluation.evaluation_score,
                    "reason": r.evaluation.reason,
                }))
                .collect::<Vec<_>>(),
        })
    });

    json!({
        "availableSources": available,
        "tierScore": applicant.tier_score(),
        "cvAnalysis": input.cv,
        "linkedinAnalysis": input.linkedin,
        "githubAnalysis": input.github,
        "crossReference": input.cross_reference,
        "signals": signals,
    })
}

/// Produce the final result. Total: a failed judgment yields a score-50
/// result with a technical-error summary and one diagnostic flag.
pub async fn aggregate(
    client: &dyn JudgmentClient,
    applicant: &Applicant,
    input: AggregateInput<'_>,
) -> AnalysisResult {
    let input = input.restrict_to_ready(applicant);
    let sources = input.source_summaries();
    let request = JudgmentRequest::new(TASK, instructions(), context(applicant, &input));

    let result = match judge_logged(client, &request).await {
        Ok(obj) => AnalysisResult::from_judgment(&obj, sources),
        Err(e) => {
            counter!("analysis_fallbacks_total", "stage" => TASK).increment(1);
            warn!(applicant = %applicant.id, error = %e, "aggregation degraded to fallback");
            AnalysisResult::fallback(sources)
        }
    };
    info!(
        applicant = %applicant.id,
        score = result.credibility_score,
        flags = result.flags.len(),
        "aggregation finished"
    );
    result
}
