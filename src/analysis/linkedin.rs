use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::normalize::{boolean, flags, metric, string_list, DEFAULT_METRIC};
use super::{mean, run_report, Flag, Report};
use crate::judgment::{JudgmentClient, JudgmentObject};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInAnalysis {
    pub profile_completeness_score: u8,
    pub experience_consistency_score: u8,
    pub network_authenticity_score: u8,
    pub endorsement_credibility_score: u8,
    pub activity_score: u8,
    pub account_maturity_score: u8,
    pub has_activity: bool,
    pub has_recommendations: bool,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub flags: Vec<Flag>,
}

impl LinkedInAnalysis {
    pub fn metrics(&self) -> [u8; 6] {
        [
            self.profile_completeness_score,
            self.experience_consistency_score,
            self.network_authenticity_score,
            self.endorsement_credibility_score,
            self.activity_score,
            self.account_maturity_score,
        ]
    }

    pub fn score(&self) -> u8 {
        mean(&self.metrics())
    }
}

impl Report for LinkedInAnalysis {
    const TASK: &'static str = "linkedin";
    const INSTRUCTIONS: &'static str = "You assess the authenticity of a job applicant's LinkedIn \
profile. Score each dimension 0-100 (100 = strong, authentic): profileCompletenessScore, \
experienceConsistencyScore, networkAuthenticityScore, endorsementCredibilityScore, activityScore, \
accountMaturityScore. Also return hasActivity and hasRecommendations (bools), strengths and \
concerns (arrays of short strings) and flags: [{type: \"red\"|\"yellow\", category, message, \
severity 1-10}].";

    fn from_judgment(obj: &JudgmentObject) -> Self {
        Self {
            profile_completeness_score: metric(obj, "profileCompletenessScore"),
            experience_consistency_score: metric(obj, "experienceConsistencyScore"),
            network_authenticity_score: metric(obj, "networkAuthenticityScore"),
            endorsement_credibility_score: metric(obj, "endorsementCredibilityScore"),
            activity_score: metric(obj, "activityScore"),
            account_maturity_score: metric(obj, "accountMaturityScore"),
            has_activity: boolean(obj, "hasActivity", false),
            has_recommendations: boolean(obj, "hasRecommendations", false),
            strengths: string_list(obj, "strengths"),
            concerns: string_list(obj, "concerns"),
            flags: flags(obj),
        }
    }

    fn fallback() -> Self {
        Self {
            profile_completeness_score: DEFAULT_METRIC,
            experience_consistency_score: DEFAULT_METRIC,
            network_authenticity_score: DEFAULT_METRIC,
            endorsement_credibility_score: DEFAULT_METRIC,
            activity_score: DEFAULT_METRIC,
            account_maturity_score: DEFAULT_METRIC,
            has_activity: false,
            has_recommendations: false,
            strengths: Vec::new(),
            concerns: Vec::new(),
            flags: vec![Flag::analysis_failed("LinkedIn")],
        }
    }
}

/// Analyze LinkedIn data. `None` input short-circuits to `None` without a call.
pub async fn analyze_linkedin(
    client: &dyn JudgmentClient,
    linkedin: Option<&Value>,
) -> Option<LinkedInAnalysis> {
    let linkedin = linkedin?;
    Some(run_report(client, json!({ "linkedinData": linkedin })).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_default_false_when_missing() {
        let obj = json!({ "activityScore": 12.4, "hasRecommendations": true });
        let a = LinkedInAnalysis::from_judgment(obj.as_object().unwrap());
        assert_eq!(a.activity_score, 12);
        assert!(!a.has_activity);
        assert!(a.has_recommendations);
        assert!(a.flags.is_empty());
    }
}
