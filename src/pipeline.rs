//! One analysis run over an applicant's ready sources.
//!
//! The three source analyzers, the cross-reference analyzer and the signal
//! evaluator are spawned together and each handle is awaited on its own, so a
//! panicking or slow stage never cancels its siblings. Whatever a stage fails
//! to deliver is replaced by that stage's local fallback before aggregation.
//! Aggregation runs in its own task too and settles to the aggregate fallback.

use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::analysis::{
    aggregate, analyze_cv, analyze_github, analyze_linkedin, cross_reference_analysis,
    AggregateInput, AnalysisResult, CrossReferenceAnalysis, CvAnalysis, GitHubAnalysis,
    LinkedInAnalysis, Report,
};
use crate::applicant::{Applicant, SourceKind};
use crate::judgment::DynJudge;
use crate::signals::{evaluate_all_signals, SignalContext, SignalReport};

/// Everything one run produced. Only analyses of `ready` sources appear.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub run: u32,
    pub cv_analysis: Option<CvAnalysis>,
    pub linkedin_analysis: Option<LinkedInAnalysis>,
    pub github_analysis: Option<GitHubAnalysis>,
    pub cross_reference: Option<CrossReferenceAnalysis>,
    pub signals: SignalReport,
    pub result: AnalysisResult,
}

#[derive(Clone)]
pub struct Pipeline {
    judge: DynJudge,
    high_risk_threshold: f32,
}

impl Pipeline {
    pub fn new(judge: DynJudge, high_risk_threshold: f32) -> Self {
        Self {
            judge,
            high_risk_threshold,
        }
    }

    pub fn judge(&self) -> &DynJudge {
        &self.judge
    }

    pub fn high_risk_threshold(&self) -> f32 {
        self.high_risk_threshold
    }

    pub async fn run(&self, applicant: &Applicant) -> AnalysisRecord {
        let started = Instant::now();
        let cv = applicant.ready_data(SourceKind::Cv).cloned();
        let linkedin = applicant.ready_data(SourceKind::LinkedIn).cloned();
        let github = applicant.ready_data(SourceKind::GitHub).cloned();
        info!(
            applicant = %applicant.id,
            run = applicant.run,
            cv = cv.is_some(),
            linkedin = linkedin.is_some(),
            github = github.is_some(),
            "analysis run started"
        );

        let cv_task = {
            let (judge, cv) = (self.judge.clone(), cv.clone());
            tokio::spawn(async move { analyze_cv(judge.as_ref(), cv.as_ref()).await })
        };
        let linkedin_task = {
            let (judge, li) = (self.judge.clone(), linkedin.clone());
            tokio::spawn(async move { analyze_linkedin(judge.as_ref(), li.as_ref()).await })
        };
        let github_task = {
            let (judge, gh) = (self.judge.clone(), github.clone());
            tokio::spawn(async move { analyze_github(judge.as_ref(), gh.as_ref()).await })
        };
        let xref_task = {
            let judge = self.judge.clone();
            let (cv, li, gh) = (cv.clone(), linkedin.clone(), github.clone());
            tokio::spawn(async move {
                cross_reference_analysis(judge.as_ref(), cv.as_ref(), li.as_ref(), gh.as_ref())
                    .await
            })
        };
        let signal_task = {
            let judge = self.judge.clone();
            let threshold = self.high_risk_threshold;
            let ctx = signal_context(cv.as_ref(), linkedin.as_ref(), github.as_ref());
            tokio::spawn(async move {
                let results = evaluate_all_signals(judge, &ctx).await;
                SignalReport::from_results(results, threshold)
            })
        };

        let (has_cv, has_li, has_gh) = (cv.is_some(), linkedin.is_some(), github.is_some());
        let cv_analysis = settle("cv", cv_task, || has_cv.then(CvAnalysis::fallback)).await;
        let linkedin_analysis = settle("linkedin", linkedin_task, || {
            has_li.then(LinkedInAnalysis::fallback)
        })
        .await;
        let github_analysis =
            settle("github", github_task, || has_gh.then(GitHubAnalysis::fallback)).await;
        let cross_reference = settle("cross_reference", xref_task, || {
            has_cv.then(|| CrossReferenceAnalysis::degraded(has_li, has_gh))
        })
        .await;
        let signals = settle("signals", signal_task, SignalReport::default).await;

        let aggregate_task = {
            let (judge, applicant) = (self.judge.clone(), applicant.clone());
            let (cv, li, gh) = (
                cv_analysis.clone(),
                linkedin_analysis.clone(),
                github_analysis.clone(),
            );
            let (xref, signals) = (cross_reference.clone(), signals.clone());
            tokio::spawn(async move {
                let input = AggregateInput {
                    cv: cv.as_ref(),
                    linkedin: li.as_ref(),
                    github: gh.as_ref(),
                    cross_reference: xref.as_ref(),
                    signals: Some(&signals),
                };
                aggregate(judge.as_ref(), &applicant, input).await
            })
        };
        let input = AggregateInput {
            cv: cv_analysis.as_ref(),
            linkedin: linkedin_analysis.as_ref(),
            github: github_analysis.as_ref(),
            cross_reference: cross_reference.as_ref(),
            signals: Some(&signals),
        };
        let result = settle("aggregate", aggregate_task, || {
            AnalysisResult::fallback_for(applicant, input)
        })
        .await;

        let elapsed = started.elapsed().as_secs_f64() * 1000.0;
        counter!("pipeline_runs_total").increment(1);
        histogram!("pipeline_run_ms").record(elapsed);
        info!(
            applicant = %applicant.id,
            run = applicant.run,
            score = result.credibility_score,
            elapsed_ms = elapsed as u64,
            "analysis run finished"
        );

        AnalysisRecord {
            run: applicant.run,
            cv_analysis,
            linkedin_analysis,
            github_analysis,
            cross_reference,
            signals,
            result,
        }
    }
}

/// GitHub data has no dedicated requirement flag; it rides along in `extra`.
fn signal_context(
    cv: Option<&Value>,
    linkedin: Option<&Value>,
    github: Option<&Value>,
) -> SignalContext {
    SignalContext {
        cv_data: cv.cloned(),
        linkedin_data: linkedin.cloned(),
        extra: github.map(|gh| json!({ "githubData": gh })),
    }
}

/// Await one stage; a panicked or aborted task becomes its fallback.
async fn settle<T>(stage: &'static str, handle: JoinHandle<T>, fallback: impl FnOnce() -> T) -> T {
    match handle.await {
        Ok(value) => value,
        Err(e) => {
            counter!("analysis_fallbacks_total", "stage" => stage).increment(1);
            warn!(stage, error = %e, "stage task did not complete; using fallback");
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panicking_stage_settles_to_fallback() {
        let handle: JoinHandle<Option<CvAnalysis>> = tokio::spawn(async { panic!("boom") });
        let out = settle("cv", handle, || Some(CvAnalysis::fallback())).await;
        assert_eq!(out, Some(CvAnalysis::fallback()));
    }

    #[test]
    fn github_rides_in_extra() {
        let gh = json!({"login": "octo"});
        let ctx = signal_context(None, None, Some(&gh));
        assert!(ctx.cv_data.is_none());
        assert_eq!(ctx.extra, Some(json!({"githubData": {"login": "octo"}})));
    }
}
