//! Cross-source consistency.
//!
//! The CV is the baseline: without it there is nothing to reference and the
//! analyzer returns `None`. Pair scores exist only for pairs where both
//! sources are present; an absent pair is `None` ("not applicable"), never a
//! number, even when the reasoning service invents one.

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use strsim::jaro_winkler;
use tracing::warn;

use super::normalize::{flags, metric, scalar_text, text, DEFAULT_METRIC};
use super::Flag;
use crate::judgment::{judge_logged, JudgmentClient, JudgmentObject, JudgmentRequest};

const TASK: &str = "cross_reference";
const INSTRUCTIONS: &str = "You compare a job applicant's CV with their other profiles. \
For every pair of supplied sources judge: name match, employers/titles/dates alignment, skills \
overlap, education alignment and contact-info consistency. Return cvLinkedInConsistency, \
cvGitHubConsistency, linkedInGitHubConsistency (0-100, only for pairs where both sources are \
supplied), overallConsistency (0-100), discrepancies: [{field, cvValue, linkedinValue, githubValue, \
severity: \"minor\"|\"moderate\"|\"major\", description}] and flags: [{type: \"red\"|\"yellow\", \
category, message, severity 1-10}]. localEvidence holds precomputed name similarities (0-1).";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscrepancySeverity {
    Minor,
    Moderate,
    Major,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discrepancy {
    pub field: String,
    pub cv_value: Option<String>,
    pub linkedin_value: Option<String>,
    pub github_value: Option<String>,
    pub severity: DiscrepancySeverity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossReferenceAnalysis {
    #[serde(rename = "cvLinkedInConsistency")]
    pub cv_linkedin_consistency: Option<u8>,
    #[serde(rename = "cvGitHubConsistency")]
    pub cv_github_consistency: Option<u8>,
    #[serde(rename = "linkedInGitHubConsistency")]
    pub linkedin_github_consistency: Option<u8>,
    /// `None` when the CV is the only source.
    pub overall_consistency: Option<u8>,
    pub discrepancies: Vec<Discrepancy>,
    pub flags: Vec<Flag>,
}

/// Which counterparts to the CV were supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Presence {
    linkedin: bool,
    github: bool,
}

impl Presence {
    fn pair(&self, applicable: bool, score: u8) -> Option<u8> {
        applicable.then_some(score)
    }
}

impl CrossReferenceAnalysis {
    fn from_judgment(obj: &JudgmentObject, p: Presence) -> Self {
        let discrepancies = obj
            .get("discrepancies")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|d| discrepancy(d, p)).collect())
            .unwrap_or_default();
        Self {
            cv_linkedin_consistency: p.pair(p.linkedin, metric(obj, "cvLinkedInConsistency")),
            cv_github_consistency: p.pair(p.github, metric(obj, "cvGitHubConsistency")),
            linkedin_github_consistency: p.pair(
                p.linkedin && p.github,
                metric(obj, "linkedInGitHubConsistency"),
            ),
            overall_consistency: Some(metric(obj, "overallConsistency")),
            discrepancies,
            flags: flags(obj),
        }
    }

    fn fallback(p: Presence) -> Self {
        Self {
            cv_linkedin_consistency: p.pair(p.linkedin, DEFAULT_METRIC),
            cv_github_consistency: p.pair(p.github, DEFAULT_METRIC),
            linkedin_github_consistency: p.pair(p.linkedin && p.github, DEFAULT_METRIC),
            overall_consistency: Some(DEFAULT_METRIC),
            discrepancies: Vec::new(),
            flags: vec![Flag::analysis_failed("Cross-reference")],
        }
    }

    /// Fallback for a run whose cross-reference stage never delivered.
    pub(crate) fn degraded(linkedin: bool, github: bool) -> Self {
        if !linkedin && !github {
            return Self::not_applicable();
        }
        Self::fallback(Presence { linkedin, github })
    }

    /// CV alone: nothing to compare.
    fn not_applicable() -> Self {
        Self {
            cv_linkedin_consistency: None,
            cv_github_consistency: None,
            linkedin_github_consistency: None,
            overall_consistency: None,
            discrepancies: Vec::new(),
            flags: Vec::new(),
        }
    }

    pub fn major_discrepancies(&self) -> usize {
        self.discrepancies
            .iter()
            .filter(|d| d.severity == DiscrepancySeverity::Major)
            .count()
    }
}

fn discrepancy(value: &Value, p: Presence) -> Option<Discrepancy> {
    let obj = value.as_object()?;
    let severity = match obj.get("severity").and_then(Value::as_str) {
        Some(s) if s.eq_ignore_ascii_case("minor") => DiscrepancySeverity::Minor,
        Some(s) if s.eq_ignore_ascii_case("major") => DiscrepancySeverity::Major,
        _ => DiscrepancySeverity::Moderate,
    };
    Some(Discrepancy {
        field: text(obj, "field").unwrap_or_else(|| "unspecified".to_string()),
        cv_value: scalar_text(obj.get("cvValue")),
        linkedin_value: if p.linkedin {
            scalar_text(obj.get("linkedinValue"))
        } else {
            None
        },
        github_value: if p.github {
            scalar_text(obj.get("githubValue"))
        } else {
            None
        },
        severity,
        description: text(obj, "description").unwrap_or_default(),
    })
}

/// Best-effort display name from an extracted profile.
pub(crate) fn profile_name(profile: &Value) -> Option<String> {
    ["name", "fullName", "full_name"]
        .iter()
        .find_map(|k| profile.get(*k).and_then(Value::as_str))
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

fn name_similarity(a: &Value, b: &Value) -> Option<f64> {
    let (a, b) = (profile_name(a)?, profile_name(b)?);
    Some((jaro_winkler(&a, &b) * 1000.0).round() / 1000.0)
}

fn local_evidence(cv: &Value, linkedin: Option<&Value>, github: Option<&Value>) -> Value {
    let mut sims = Map::new();
    if let Some(s) = linkedin.and_then(|li| name_similarity(cv, li)) {
        sims.insert("cvLinkedIn".into(), json!(s));
    }
    if let Some(s) = github.and_then(|gh| name_similarity(cv, gh)) {
        sims.insert("cvGitHub".into(), json!(s));
    }
    if let (Some(li), Some(gh)) = (linkedin, github) {
        if let Some(s) = name_similarity(li, gh) {
            sims.insert("linkedInGitHub".into(), json!(s));
        }
    }
    json!({ "nameSimilarity": sims })
}

/// Compare the CV against whichever of LinkedIn/GitHub were supplied.
pub async fn cross_reference_analysis(
    client: &dyn JudgmentClient,
    cv: Option<&Value>,
    linkedin: Option<&Value>,
    github: Option<&Value>,
) -> Option<CrossReferenceAnalysis> {
    let cv = cv?;
    let presence = Presence {
        linkedin: linkedin.is_some(),
        github: github.is_some(),
    };
    if !presence.linkedin && !presence.github {
        return Some(CrossReferenceAnalysis::not_applicable());
    }

    let mut available = vec!["cv"];
    if presence.linkedin {
        available.push("linkedin");
    }
    if presence.github {
        available.push("github");
    }
    let context = json!({
        "availableSources": available,
        "cvData": cv,
        "linkedinData": linkedin,
        "githubData": github,
        "localEvidence": local_evidence(cv, linkedin, github),
    });

    let request = JudgmentRequest::new(TASK, INSTRUCTIONS, context);
    Some(match judge_logged(client, &request).await {
        Ok(obj) => CrossReferenceAnalysis::from_judgment(&obj, presence),
        Err(e) => {
            counter!("analysis_fallbacks_total", "stage" => TASK).increment(1);
            warn!(stage = TASK, error = %e, "analysis degraded to fallback");
            CrossReferenceAnalysis::fallback(presence)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CV_ONLY_LINKEDIN: Presence = Presence {
        linkedin: true,
        github: false,
    };

    #[test]
    fn absent_pairs_are_not_applicable_even_if_judged() {
        let obj = json!({
            "cvLinkedInConsistency": 88,
            "cvGitHubConsistency": 12,
            "linkedInGitHubConsistency": 0,
            "overallConsistency": 85,
        });
        let x = CrossReferenceAnalysis::from_judgment(obj.as_object().unwrap(), CV_ONLY_LINKEDIN);
        assert_eq!(x.cv_linkedin_consistency, Some(88));
        assert_eq!(x.cv_github_consistency, None);
        assert_eq!(x.linkedin_github_consistency, None);
        assert_eq!(x.overall_consistency, Some(85));
    }

    #[test]
    fn discrepancy_values_for_absent_sources_are_dropped() {
        let obj = json!({
            "discrepancies": [
                {"field": "title", "cvValue": "CTO", "linkedinValue": "Engineer",
                 "githubValue": "ghost", "severity": "MAJOR", "description": "Inflated title"},
                {"cvValue": 2019, "severity": "weird"}
            ]
        });
        let x = CrossReferenceAnalysis::from_judgment(obj.as_object().unwrap(), CV_ONLY_LINKEDIN);
        assert_eq!(x.discrepancies.len(), 2);
        assert_eq!(x.discrepancies[0].github_value, None);
        assert_eq!(x.discrepancies[0].linkedin_value.as_deref(), Some("Engineer"));
        assert_eq!(x.discrepancies[0].severity, DiscrepancySeverity::Major);
        assert_eq!(x.discrepancies[1].field, "unspecified");
        assert_eq!(x.discrepancies[1].cv_value.as_deref(), Some("2019"));
        assert_eq!(x.discrepancies[1].severity, DiscrepancySeverity::Moderate);
        assert_eq!(x.major_discrepancies(), 1);
    }

    #[test]
    fn fallback_scores_only_present_pairs() {
        let x = CrossReferenceAnalysis::fallback(CV_ONLY_LINKEDIN);
        assert_eq!(x.cv_linkedin_consistency, Some(50));
        assert_eq!(x.cv_github_consistency, None);
        assert_eq!(x.flags.len(), 1);
    }

    #[test]
    fn name_similarity_uses_profile_names() {
        let cv = json!({"name": "Jane Q. Doe"});
        let li = json!({"fullName": "jane q. doe"});
        let gh = json!({"login": "jqd"});
        assert_eq!(name_similarity(&cv, &li), Some(1.0));
        assert_eq!(name_similarity(&cv, &gh), None);
        let ev = local_evidence(&cv, Some(&li), Some(&gh));
        assert!(ev["nameSimilarity"].get("cvLinkedIn").is_some());
        assert!(ev["nameSimilarity"].get("cvGitHub").is_none());
    }
}
