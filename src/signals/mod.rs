//! Authenticity signals: the static catalog and its evaluator.

pub mod catalog;
pub mod evaluator;

pub use catalog::{catalog, Signal};
pub use evaluator::{
    calculate_overall_score, evaluate_all, evaluate_all_signals, get_high_risk_signals,
    OverallScore, ScoreSummary, SignalContext, SignalEvaluation, SignalEvaluationResult,
    SignalReport,
};
