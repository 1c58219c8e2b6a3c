//! Drives applicants from intake to a terminal analysis.
//!
//! Readiness is re-checked after every source-status write, whatever order
//! the writes arrive in. The AI stage is claimed with a `pending → processing`
//! write, which the store validates atomically: of two concurrent triggers only
//! one wins, the other sees a [`TransitionError`] and backs off.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use metrics::counter;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::applicant::{Applicant, SourceKind, Stage, StageStatus, TransitionError};
use crate::config::PipelineConfig;
use crate::pipeline::{AnalysisRecord, Pipeline};
use crate::store::ApplicantStore;
use crate::tiering::is_eligible_for_full_analysis;

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub auto_analyze_partial: bool,
    pub persist_retries: u8,
    pub persist_backoff: Duration,
}

impl From<&PipelineConfig> for CoordinatorSettings {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            auto_analyze_partial: cfg.auto_analyze_partial,
            persist_retries: cfg.persist_retries.max(1),
            persist_backoff: Duration::from_millis(cfg.persist_backoff_ms),
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn ApplicantStore>,
    pipeline: Pipeline,
    settings: CoordinatorSettings,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn ApplicantStore>,
        pipeline: Pipeline,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            store,
            pipeline,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn ApplicantStore> {
        &self.store
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Create an applicant; sources that were not requested become `not_provided`.
    pub async fn intake(
        &self,
        name: Option<String>,
        linkedin_requested: bool,
        github_requested: bool,
    ) -> anyhow::Result<Applicant> {
        let mut applicant = self.store.create_applicant(name).await?;
        info!(applicant = %applicant.id, linkedin_requested, github_requested, "applicant created");
        for (kind, requested) in [
            (SourceKind::LinkedIn, linkedin_requested),
            (SourceKind::GitHub, github_requested),
        ] {
            if !requested {
                applicant = self
                    .write(&applicant.id, kind.stage(), StageStatus::NotProvided, None)
                    .await?;
            }
        }
        Ok(applicant)
    }

    pub async fn read(&self, id: &str) -> anyhow::Result<Applicant> {
        self.store
            .read_applicant(id)
            .await?
            .ok_or_else(|| TransitionError::UnknownApplicant(id.to_string()).into())
    }

    /// Record one source-status write, then aggregate if that made the applicant ready.
    pub async fn on_source_status(
        &self,
        id: &str,
        source: SourceKind,
        status: StageStatus,
        data: Option<Value>,
    ) -> anyhow::Result<Applicant> {
        self.write(id, source.stage(), status, data).await?;
        self.maybe_aggregate(id).await
    }

    /// Run the aggregator if every source is settled and the AI stage is free.
    pub async fn maybe_aggregate(&self, id: &str) -> anyhow::Result<Applicant> {
        let applicant = self.read(id).await?;
        if !applicant.ready_for_aggregation() {
            return Ok(applicant);
        }
        let tier = applicant.tier_score();
        if !self.settings.auto_analyze_partial && !is_eligible_for_full_analysis(tier) {
            info!(applicant = %id, tier, "below eligibility gate; analysis deferred");
            return Ok(applicant);
        }
        self.execute_run(id).await
    }

    /// Start run `n+1` (or the first run if it never started) regardless of tier.
    pub async fn reanalyze(&self, id: &str) -> anyhow::Result<Applicant> {
        let applicant = self.read(id).await?;
        if !applicant.sources_resolved() || !applicant.any_source_ready() {
            return Err(TransitionError::SourcesNotReady(id.to_string()).into());
        }
        let applicant = self.store.start_new_run(id).await?;
        info!(applicant = %id, run = applicant.run, "re-analysis requested");
        self.execute_run(id).await
    }

    async fn execute_run(&self, id: &str) -> anyhow::Result<Applicant> {
        let claimed = match self
            .write(id, Stage::Ai, StageStatus::Processing, None)
            .await
        {
            Ok(a) => a,
            Err(e) if e.downcast_ref::<TransitionError>().is_some() => {
                debug!(applicant = %id, error = %e, "AI stage already claimed");
                return self.read(id).await;
            }
            Err(e) => return Err(e),
        };

        // Runs detached: dropping the caller must not strand the AI stage in `processing`.
        let run = claimed.run;
        let task = {
            let coordinator = self.clone();
            let id = id.to_string();
            tokio::spawn(async move { coordinator.finish_run(&id, claimed).await })
        };
        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(applicant = %id, run, error = %e, "analysis task did not complete");
                self.write(id, Stage::Ai, StageStatus::Error, None).await
            }
        }
    }

    async fn finish_run(&self, id: &str, claimed: Applicant) -> anyhow::Result<Applicant> {
        let record = self.pipeline.run(&claimed).await;
        let outcome = match self.persist(id, record).await {
            Ok(()) => StageStatus::Ready,
            Err(e) => {
                error!(applicant = %id, run = claimed.run, error = %e, "analysis record not persisted");
                StageStatus::Error
            }
        };
        self.write(id, Stage::Ai, outcome, None).await
    }

    /// Persist with exponential backoff; a stale-run rejection is not retried.
    async fn persist(&self, id: &str, record: AnalysisRecord) -> anyhow::Result<()> {
        let max = self.settings.persist_retries;
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.store.write_analysis_result(id, record.clone()).await {
                Ok(_) => return Ok(()),
                Err(e) if e.downcast_ref::<TransitionError>().is_some() => return Err(e),
                Err(e) => {
                    if attempt < max {
                        warn!(applicant = %id, attempt, error = %e, "persist failed; retrying");
                        tokio::time::sleep(self.settings.persist_backoff * (1u32 << (attempt - 1)))
                            .await;
                        continue;
                    }
                    return Err(anyhow!("giving up after {attempt} attempts: {e}"));
                }
            }
        }
    }

    async fn write(
        &self,
        id: &str,
        stage: Stage,
        status: StageStatus,
        data: Option<Value>,
    ) -> anyhow::Result<Applicant> {
        let applicant = self
            .store
            .write_source_status(id, stage, status, data)
            .await?;
        counter!("applicant_status_writes_total", "stage" => stage.as_str()).increment(1);
        debug!(
            applicant = %id,
            stage = stage.as_str(),
            status = status.as_str(),
            overall = ?applicant.overall_status(),
            "status written"
        );
        Ok(applicant)
    }
}
