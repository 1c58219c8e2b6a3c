// tests/metrics.rs
mod common;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use applicant_verifier::metrics::Metrics;
use applicant_verifier::{SourceKind, StageStatus};
use common::*;

#[tokio::test]
async fn metrics_endpoint_contains_pipeline_series() {
    // One recorder per process; this is the only test in this binary.
    let metrics = Metrics::init().expect("install recorder");

    let c = coordinator(ScriptedJudge::healthy().shared());
    let a = c.intake(None, false, false).await.unwrap();
    c.on_source_status(&a.id, SourceKind::Cv, StageStatus::Ready, Some(cv_data()))
        .await
        .unwrap();

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "judgment_calls_total",
        "signal_evaluations_total",
        "pipeline_runs_total",
        "pipeline_run_ms",
        "applicant_status_writes_total",
    ] {
        assert!(text.contains(needle), "missing series {needle} in:\n{text}");
    }
}
