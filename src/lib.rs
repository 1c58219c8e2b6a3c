// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod analysis;
pub mod api;
pub mod applicant;
pub mod config;
pub mod coordinator;
pub mod judgment;
pub mod metrics;
pub mod pipeline;
pub mod signals;
pub mod store;
pub mod telemetry;
pub mod tiering;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::applicant::{
    derive_overall_status, Applicant, OverallStatus, SourceKind, Stage, StageStatus,
    TransitionError,
};
pub use crate::coordinator::{Coordinator, CoordinatorSettings};
pub use crate::judgment::{build_client, DynJudge, JudgmentClient, JudgmentRequest};
pub use crate::pipeline::{AnalysisRecord, Pipeline};
pub use crate::store::{ApplicantStore, MemoryStore};
pub use crate::tiering::{is_eligible_for_full_analysis, tier_score};
