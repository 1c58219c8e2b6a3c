use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::normalize::{boolean, flags, metric, string_list, DEFAULT_METRIC};
use super::{mean, run_report, Flag, Report};
use crate::judgment::{JudgmentClient, JudgmentObject};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubAnalysis {
    pub code_quality_score: u8,
    pub activity_consistency_score: u8,
    pub contribution_realism_score: u8,
    pub profile_completeness_score: u8,
    pub skills_alignment_score: u8,
    pub project_quality_score: u8,
    pub has_activity: bool,
    pub has_original_projects: bool,
    pub top_languages: Vec<String>,
    pub notable_projects: Vec<String>,
    pub concerns: Vec<String>,
    pub flags: Vec<Flag>,
}

impl GitHubAnalysis {
    pub fn metrics(&self) -> [u8; 6] {
        [
            self.code_quality_score,
            self.activity_consistency_score,
            self.contribution_realism_score,
            self.profile_completeness_score,
            self.skills_alignment_score,
            self.project_quality_score,
        ]
    }

    pub fn score(&self) -> u8 {
        mean(&self.metrics())
    }
}

impl Report for GitHubAnalysis {
    const TASK: &'static str = "github";
    const INSTRUCTIONS: &'static str = "You assess the authenticity of a job applicant's GitHub \
account. Score each dimension 0-100 (100 = strong, authentic): codeQualityScore, \
activityConsistencyScore, contributionRealismScore (watch for back-dated or scripted commits), \
profileCompletenessScore, skillsAlignmentScore, projectQualityScore. Also return hasActivity and \
hasOriginalProjects (bools; forks are not original), topLanguages, notableProjects and concerns \
(arrays of short strings) and flags: [{type: \"red\"|\"yellow\", category, message, severity 1-10}].";

    fn from_judgment(obj: &JudgmentObject) -> Self {
        Self {
            code_quality_score: metric(obj, "codeQualityScore"),
            activity_consistency_score: metric(obj, "activityConsistencyScore"),
            contribution_realism_score: metric(obj, "contributionRealismScore"),
            profile_completeness_score: metric(obj, "profileCompletenessScore"),
            skills_alignment_score: metric(obj, "skillsAlignmentScore"),
            project_quality_score: metric(obj, "projectQualityScore"),
            has_activity: boolean(obj, "hasActivity", false),
            has_original_projects: boolean(obj, "hasOriginalProjects", false),
            top_languages: string_list(obj, "topLanguages"),
            notable_projects: string_list(obj, "notableProjects"),
            concerns: string_list(obj, "concerns"),
            flags: flags(obj),
        }
    }

    fn fallback() -> Self {
        Self {
            code_quality_score: DEFAULT_METRIC,
            activity_consistency_score: DEFAULT_METRIC,
            contribution_realism_score: DEFAULT_METRIC,
            profile_completeness_score: DEFAULT_METRIC,
            skills_alignment_score: DEFAULT_METRIC,
            project_quality_score: DEFAULT_METRIC,
            has_activity: false,
            has_original_projects: false,
            top_languages: Vec::new(),
            notable_projects: Vec::new(),
            concerns: Vec::new(),
            flags: vec![Flag::analysis_failed("GitHub")],
        }
    }
}

/// Analyze GitHub data. `None` input short-circuits to `None` without a call.
pub async fn analyze_github(
    client: &dyn JudgmentClient,
    github: Option<&Value>,
) -> Option<GitHubAnalysis> {
    let github = github?;
    Some(run_report(client, json!({ "githubData": github })).await)
}
