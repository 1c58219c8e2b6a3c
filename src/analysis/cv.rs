use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::normalize::{boolean, flags, metric, string_list, DEFAULT_METRIC};
use super::{mean, run_report, Flag, Report};
use crate::judgment::{JudgmentClient, JudgmentObject};

/// CV report: six 0–100 dimensions plus evidence lists and flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvAnalysis {
    pub completeness_score: u8,
    pub consistency_score: u8,
    pub experience_realism_score: u8,
    pub skills_credibility_score: u8,
    pub education_verification_score: u8,
    /// High = no unexplained gaps.
    pub timeline_gap_score: u8,
    pub has_employment_gaps: bool,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub flags: Vec<Flag>,
}

impl CvAnalysis {
    pub fn metrics(&self) -> [u8; 6] {
        [
            self.completeness_score,
            self.consistency_score,
            self.experience_realism_score,
            self.skills_credibility_score,
            self.education_verification_score,
            self.timeline_gap_score,
        ]
    }

    /// Unweighted mean of the six dimensions.
    pub fn score(&self) -> u8 {
        mean(&self.metrics())
    }
}

impl Report for CvAnalysis {
    const TASK: &'static str = "cv";
    const INSTRUCTIONS: &'static str = "You assess the authenticity of a job applicant's CV. \
Score each dimension 0-100 (100 = strong, authentic): completenessScore, consistencyScore, \
experienceRealismScore, skillsCredibilityScore, educationVerificationScore, timelineGapScore \
(100 = no unexplained gaps). Also return hasEmploymentGaps (bool), strengths and concerns \
(arrays of short strings) and flags: [{type: \"red\"|\"yellow\", category, message, severity 1-10}].";

    fn from_judgment(obj: &JudgmentObject) -> Self {
        Self {
            completeness_score: metric(obj, "completenessScore"),
            consistency_score: metric(obj, "consistencyScore"),
            experience_realism_score: metric(obj, "experienceRealismScore"),
            skills_credibility_score: metric(obj, "skillsCredibilityScore"),
            education_verification_score: metric(obj, "educationVerificationScore"),
            timeline_gap_score: metric(obj, "timelineGapScore"),
            has_employment_gaps: boolean(obj, "hasEmploymentGaps", false),
            strengths: string_list(obj, "strengths"),
            concerns: string_list(obj, "concerns"),
            flags: flags(obj),
        }
    }

    fn fallback() -> Self {
        Self {
            completeness_score: DEFAULT_METRIC,
            consistency_score: DEFAULT_METRIC,
            experience_realism_score: DEFAULT_METRIC,
            skills_credibility_score: DEFAULT_METRIC,
            education_verification_score: DEFAULT_METRIC,
            timeline_gap_score: DEFAULT_METRIC,
            has_employment_gaps: false,
            strengths: Vec::new(),
            concerns: Vec::new(),
            flags: vec![Flag::analysis_failed("CV")],
        }
    }
}

/// Analyze CV data. `None` input short-circuits to `None` without a call.
pub async fn analyze_cv(client: &dyn JudgmentClient, cv: Option<&Value>) -> Option<CvAnalysis> {
    let cv = cv?;
    Some(run_report(client, json!({ "cvData": cv })).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FlagType;

    #[test]
    fn from_judgment_clamps_and_defaults() {
        let obj = json!({
            "completenessScore": 140,
            "consistencyScore": 80,
            "timelineGapScore": "n/a",
            "flags": [{"type": "red", "message": "Overlapping full-time roles", "severity": 7}]
        });
        let a = CvAnalysis::from_judgment(obj.as_object().unwrap());
        assert_eq!(a.completeness_score, 100);
        assert_eq!(a.consistency_score, 80);
        assert_eq!(a.timeline_gap_score, 50);
        assert_eq!(a.experience_realism_score, 50);
        assert!(!a.has_employment_gaps);
        assert!(a.strengths.is_empty());
        assert_eq!(a.flags[0].flag_type, FlagType::Red);
        assert_eq!(a.flags[0].category, "verification");
    }

    #[test]
    fn fallback_is_mid_range_with_one_flag() {
        let f = CvAnalysis::fallback();
        assert!(f.metrics().iter().all(|&m| m == 50));
        assert_eq!(f.flags.len(), 1);
        assert_eq!(f.flags[0].flag_type, FlagType::Yellow);
        assert_eq!(f.flags[0].category, "verification");
        assert_eq!(f.score(), 50);
    }
}
