//! Persistence collaborator seam.
//!
//! Every write is atomic per applicant and validated by
//! [`Applicant::apply`]; rejected writes surface as a [`TransitionError`]
//! inside the `anyhow::Error` so callers can `downcast_ref` it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::applicant::{Applicant, Stage, StageStatus, TransitionError};
use crate::pipeline::AnalysisRecord;

#[async_trait]
pub trait ApplicantStore: Send + Sync {
    /// New applicant with every stage `pending`.
    async fn create_applicant(&self, name: Option<String>) -> anyhow::Result<Applicant>;

    async fn read_applicant(&self, id: &str) -> anyhow::Result<Option<Applicant>>;

    /// Apply one status write; returns the updated applicant.
    async fn write_source_status(
        &self,
        id: &str,
        stage: Stage,
        status: StageStatus,
        data: Option<Value>,
    ) -> anyhow::Result<Applicant>;

    /// Attach the record of the applicant's current, in-flight run.
    async fn write_analysis_result(
        &self,
        id: &str,
        record: AnalysisRecord,
    ) -> anyhow::Result<Applicant>;

    /// Reopen a terminal AI stage as run `n+1`.
    async fn start_new_run(&self, id: &str) -> anyhow::Result<Applicant>;
}

/// In-process store behind a lock-guarded map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    applicants: RwLock<HashMap<String, Applicant>>,
    seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, id: &str, f: F) -> anyhow::Result<Applicant>
    where
        F: FnOnce(&mut Applicant) -> Result<(), TransitionError>,
    {
        let mut map = self.applicants.write().unwrap_or_else(|p| p.into_inner());
        let applicant = map
            .get_mut(id)
            .ok_or_else(|| TransitionError::UnknownApplicant(id.to_string()))?;
        // Validate on a copy so a rejected write leaves no trace.
        let mut next = applicant.clone();
        f(&mut next)?;
        *applicant = next.clone();
        Ok(next)
    }
}

#[async_trait]
impl ApplicantStore for MemoryStore {
    async fn create_applicant(&self, name: Option<String>) -> anyhow::Result<Applicant> {
        let n = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let applicant = Applicant::new(format!("app-{n:06}"), name);
        let mut map = self.applicants.write().unwrap_or_else(|p| p.into_inner());
        map.insert(applicant.id.clone(), applicant.clone());
        Ok(applicant)
    }

    async fn read_applicant(&self, id: &str) -> anyhow::Result<Option<Applicant>> {
        let map = self.applicants.read().unwrap_or_else(|p| p.into_inner());
        Ok(map.get(id).cloned())
    }

    async fn write_source_status(
        &self,
        id: &str,
        stage: Stage,
        status: StageStatus,
        data: Option<Value>,
    ) -> anyhow::Result<Applicant> {
        self.update(id, |a| a.apply(stage, status, data))
    }

    async fn write_analysis_result(
        &self,
        id: &str,
        record: AnalysisRecord,
    ) -> anyhow::Result<Applicant> {
        self.update(id, |a| {
            if record.run != a.run {
                return Err(TransitionError::StaleRun {
                    current: a.run,
                    got: record.run,
                });
            }
            a.analysis = Some(record);
            Ok(())
        })
    }

    async fn start_new_run(&self, id: &str) -> anyhow::Result<Applicant> {
        self.update(id, |a| a.start_new_run().map(|_| ()))
    }
}
