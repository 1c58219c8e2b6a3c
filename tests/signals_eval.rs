// tests/signals_eval.rs
//
// Signal evaluator over the real catalog with a scripted judge.

mod common;

use serde_json::json;

use applicant_verifier::signals::{
    catalog, evaluate_all, evaluate_all_signals, SignalContext, SignalReport,
};
use common::*;

fn cv_only() -> SignalContext {
    SignalContext {
        cv_data: Some(cv_data()),
        linkedin_data: None,
        extra: None,
    }
}

#[tokio::test]
async fn linkedin_signals_are_dropped_without_linkedin_data() {
    let judge = ScriptedJudge::healthy().shared();
    let results = evaluate_all_signals(judge.clone(), &cv_only()).await;

    let expected = catalog()
        .iter()
        .filter(|s| !s.requires_linkedin)
        .count();
    assert_eq!(results.len(), expected);
    assert!(results.iter().all(|r| !r.signal.requires_linkedin));
    assert_eq!(judge.calls("signal"), expected);
}

#[tokio::test]
async fn results_keep_catalog_order() {
    let judge = ScriptedJudge::healthy().shared();
    let ctx = SignalContext {
        cv_data: Some(cv_data()),
        linkedin_data: Some(linkedin_data()),
        extra: None,
    };
    let results = evaluate_all_signals(judge, &ctx).await;
    let got: Vec<_> = results.iter().map(|r| r.signal.name).collect();
    let want: Vec<_> = catalog().iter().map(|s| s.name).collect();
    assert_eq!(got, want);
}

#[tokio::test]
async fn bad_signal_is_zeroed_without_aborting_the_batch() {
    let signals = catalog();
    let cv_signals: Vec<_> = signals
        .iter()
        .filter(|s| s.requires_cv && !s.requires_linkedin)
        .copied()
        .collect();
    let (bad, worse) = (cv_signals[0].name, cv_signals[1].name);

    let judge = ScriptedJudge::healthy()
        .signal(bad, json!({ "evaluation_score": 1.7, "reason": "overconfident" }))
        .signal(worse, json!({ "evaluation_score": "high" }))
        .shared();
    let results = evaluate_all(judge, &cv_only(), &cv_signals).await;

    assert_eq!(results.len(), cv_signals.len());
    assert_eq!(results[0].evaluation.evaluation_score, 0.0);
    assert!(results[0].evaluation.reason.contains("out of range"));
    assert_eq!(results[1].evaluation.evaluation_score, 0.0);
    assert!(results[2..]
        .iter()
        .all(|r| (r.evaluation.evaluation_score - 0.9).abs() < 1e-6));
}

#[tokio::test]
async fn panicking_signal_tasks_score_zero() {
    let judge = ScriptedJudge::new().panic_on("signal").shared();
    let results = evaluate_all_signals(judge, &cv_only()).await;
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.evaluation.evaluation_score == 0.0));
}

#[tokio::test]
async fn report_flags_high_risk_signals() {
    let signals = catalog();
    let cv_signals: Vec<_> = signals
        .iter()
        .filter(|s| !s.requires_linkedin)
        .copied()
        .collect();
    let judge = ScriptedJudge::healthy()
        .signal(cv_signals[0].name, json!({ "evaluation_score": 0.1, "reason": "gap" }))
        .shared();
    let results = evaluate_all(judge, &cv_only(), &cv_signals).await;
    let report = SignalReport::from_results(results, 0.3);

    assert_eq!(report.high_risk.len(), 1);
    assert_eq!(report.high_risk[0].signal.name, cv_signals[0].name);
    assert_eq!(report.overall.summary.total_signals, cv_signals.len());
    assert_eq!(report.overall.summary.failed_signals, 1);
    assert_eq!(report.overall.summary.passed_signals, cv_signals.len() - 1);
}
