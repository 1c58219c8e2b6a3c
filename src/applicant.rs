//! Applicant record and its per-stage status machine.
//!
//! Sources move `pending → processing → {ready | error | not_provided}`, the
//! AI stage `pending → processing → {ready | error}`. Statuses never regress;
//! a terminal AI stage is only reopened by starting a new run. The overall
//! status is always derived, never stored.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::AnalysisRecord;
use crate::tiering::tier_score;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Cv,
    LinkedIn,
    GitHub,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [Self::Cv, Self::LinkedIn, Self::GitHub];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cv => "cv",
            Self::LinkedIn => "linkedin",
            Self::GitHub => "github",
        }
    }

    pub fn stage(self) -> Stage {
        match self {
            Self::Cv => Stage::Cv,
            Self::LinkedIn => Stage::LinkedIn,
            Self::GitHub => Stage::GitHub,
        }
    }

    /// LinkedIn and GitHub may be `not_provided`; the CV may not.
    pub fn is_optional(self) -> bool {
        !matches!(self, Self::Cv)
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cv" => Ok(Self::Cv),
            "linkedin" => Ok(Self::LinkedIn),
            "github" => Ok(Self::GitHub),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// A status-owning stage: the three sources plus the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Cv,
    LinkedIn,
    GitHub,
    Ai,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cv => "cv",
            Self::LinkedIn => "linkedin",
            Self::GitHub => "github",
            Self::Ai => "ai",
        }
    }

    pub fn source(self) -> Option<SourceKind> {
        match self {
            Self::Cv => Some(SourceKind::Cv),
            Self::LinkedIn => Some(SourceKind::LinkedIn),
            Self::GitHub => Some(SourceKind::GitHub),
            Self::Ai => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Processing,
    Ready,
    Error,
    NotProvided,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::NotProvided => "not_provided",
        }
    }

    /// Position in the forward-only order; terminals share the top rank.
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Ready | Self::Error | Self::NotProvided => 2,
        }
    }

    pub fn is_resolved(self) -> bool {
        self.rank() == 2
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "error" => Ok(Self::Error),
            "not_provided" => Ok(Self::NotProvided),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Uploading,
    Processing,
    Analyzing,
    Completed,
    Failed,
}

impl OverallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Overall status from the four stage statuses.
pub fn derive_overall_status(
    cv: StageStatus,
    linkedin: StageStatus,
    github: StageStatus,
    ai: StageStatus,
) -> OverallStatus {
    use StageStatus::*;

    let sources = [cv, linkedin, github];
    match ai {
        Ready => return OverallStatus::Completed,
        Error => return OverallStatus::Failed,
        _ => {}
    }
    let all_resolved = sources.iter().all(|s| s.is_resolved());
    let none_ready = !sources.contains(&Ready);
    if all_resolved && none_ready && sources.contains(&Error) {
        return OverallStatus::Failed;
    }
    if ai == Processing {
        return OverallStatus::Analyzing;
    }
    if ai == Pending && sources.iter().all(|s| matches!(s, Pending | NotProvided)) {
        return OverallStatus::Uploading;
    }
    OverallStatus::Processing
}

/// Rejected status writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    UnknownApplicant(String),
    Regression {
        stage: Stage,
        from: StageStatus,
        to: StageStatus,
    },
    Unchanged {
        stage: Stage,
        status: StageStatus,
    },
    NotProvidedNotAllowed(Stage),
    MissingData(Stage),
    UnexpectedData(Stage),
    RunInFlight(String),
    SourcesNotReady(String),
    StaleRun {
        current: u32,
        got: u32,
    },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownApplicant(id) => write!(f, "unknown applicant: {id}"),
            Self::Regression { stage, from, to } => {
                write!(f, "illegal {stage} transition: {from} -> {to}")
            }
            Self::Unchanged { stage, status } => write!(f, "{stage} is already {status}"),
            Self::NotProvidedNotAllowed(stage) => {
                write!(f, "{stage} cannot be marked not_provided")
            }
            Self::MissingData(stage) => write!(f, "{stage} marked ready without data"),
            Self::UnexpectedData(stage) => {
                write!(f, "{stage} data is only accepted with status ready")
            }
            Self::RunInFlight(id) => write!(f, "analysis already running for {id}"),
            Self::SourcesNotReady(id) => write!(f, "no ready sources to analyze for {id}"),
            Self::StaleRun { current, got } => {
                write!(f, "result for run {got} but applicant is on run {current}")
            }
        }
    }
}

impl std::error::Error for TransitionError {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Applicant {
    pub id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub cv_status: StageStatus,
    pub linkedin_status: StageStatus,
    pub github_status: StageStatus,
    pub ai_status: StageStatus,
    /// Starts at 1; bumped by each re-analysis.
    pub run: u32,
    pub cv_data: Option<Value>,
    pub linkedin_data: Option<Value>,
    pub github_data: Option<Value>,
    pub analysis: Option<AnalysisRecord>,
}

impl Applicant {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
            created_at: Utc::now(),
            cv_status: StageStatus::Pending,
            linkedin_status: StageStatus::Pending,
            github_status: StageStatus::Pending,
            ai_status: StageStatus::Pending,
            run: 1,
            cv_data: None,
            linkedin_data: None,
            github_data: None,
            analysis: None,
        }
    }

    pub fn status(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::Cv => self.cv_status,
            Stage::LinkedIn => self.linkedin_status,
            Stage::GitHub => self.github_status,
            Stage::Ai => self.ai_status,
        }
    }

    fn status_mut(&mut self, stage: Stage) -> &mut StageStatus {
        match stage {
            Stage::Cv => &mut self.cv_status,
            Stage::LinkedIn => &mut self.linkedin_status,
            Stage::GitHub => &mut self.github_status,
            Stage::Ai => &mut self.ai_status,
        }
    }

    pub fn source_data(&self, kind: SourceKind) -> Option<&Value> {
        match kind {
            SourceKind::Cv => self.cv_data.as_ref(),
            SourceKind::LinkedIn => self.linkedin_data.as_ref(),
            SourceKind::GitHub => self.github_data.as_ref(),
        }
    }

    fn data_mut(&mut self, kind: SourceKind) -> &mut Option<Value> {
        match kind {
            SourceKind::Cv => &mut self.cv_data,
            SourceKind::LinkedIn => &mut self.linkedin_data,
            SourceKind::GitHub => &mut self.github_data,
        }
    }

    /// Source data, only when that source is `ready`.
    pub fn ready_data(&self, kind: SourceKind) -> Option<&Value> {
        if self.status(kind.stage()) == StageStatus::Ready {
            self.source_data(kind)
        } else {
            None
        }
    }

    pub fn overall_status(&self) -> OverallStatus {
        derive_overall_status(
            self.cv_status,
            self.linkedin_status,
            self.github_status,
            self.ai_status,
        )
    }

    /// Every source has left `pending`/`processing`.
    pub fn sources_resolved(&self) -> bool {
        SourceKind::ALL
            .iter()
            .all(|k| self.status(k.stage()).is_resolved())
    }

    pub fn any_source_ready(&self) -> bool {
        SourceKind::ALL
            .iter()
            .any(|k| self.status(k.stage()) == StageStatus::Ready)
    }

    /// Sources settled, something to analyze, AI stage not yet claimed.
    pub fn ready_for_aggregation(&self) -> bool {
        self.ai_status == StageStatus::Pending && self.sources_resolved() && self.any_source_ready()
    }

    pub fn tier_score(&self) -> u8 {
        tier_score(
            self.ready_data(SourceKind::LinkedIn).is_some(),
            self.ready_data(SourceKind::Cv).is_some(),
        )
    }

    /// Validate and apply one status write. On error nothing changes.
    pub fn apply(
        &mut self,
        stage: Stage,
        status: StageStatus,
        data: Option<Value>,
    ) -> Result<(), TransitionError> {
        let current = self.status(stage);
        if current == status {
            return Err(TransitionError::Unchanged { stage, status });
        }
        if status == StageStatus::NotProvided {
            let optional = stage.source().is_some_and(SourceKind::is_optional);
            if !optional || current != StageStatus::Pending {
                return Err(TransitionError::NotProvidedNotAllowed(stage));
            }
        }
        if status.rank() <= current.rank() {
            return Err(TransitionError::Regression {
                stage,
                from: current,
                to: status,
            });
        }

        match stage.source() {
            None if data.is_some() => return Err(TransitionError::UnexpectedData(stage)),
            None => {}
            Some(_) if data.is_some() && status != StageStatus::Ready => {
                return Err(TransitionError::UnexpectedData(stage))
            }
            Some(kind) if status == StageStatus::Ready => {
                if data.is_none() && self.source_data(kind).is_none() {
                    return Err(TransitionError::MissingData(stage));
                }
                if let Some(data) = data {
                    *self.data_mut(kind) = Some(data);
                }
            }
            Some(_) => {}
        }

        *self.status_mut(stage) = status;
        Ok(())
    }

    /// Reopen the AI stage for run `n+1`. A never-run AI stage keeps its run.
    pub fn start_new_run(&mut self) -> Result<u32, TransitionError> {
        match self.ai_status {
            StageStatus::Processing => Err(TransitionError::RunInFlight(self.id.clone())),
            StageStatus::Pending => Ok(self.run),
            _ => {
                self.run += 1;
                self.ai_status = StageStatus::Pending;
                Ok(self.run)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use StageStatus::*;

    #[test]
    fn analyzing_then_completed() {
        assert_eq!(
            derive_overall_status(Ready, NotProvided, NotProvided, Processing),
            OverallStatus::Analyzing
        );
        assert_eq!(
            derive_overall_status(Ready, NotProvided, NotProvided, Ready),
            OverallStatus::Completed
        );
    }

    #[test]
    fn derivation_covers_intake_and_failure() {
        assert_eq!(
            derive_overall_status(Pending, Pending, Pending, Pending),
            OverallStatus::Uploading
        );
        assert_eq!(
            derive_overall_status(Processing, Pending, NotProvided, Pending),
            OverallStatus::Processing
        );
        assert_eq!(
            derive_overall_status(Error, NotProvided, Error, Pending),
            OverallStatus::Failed
        );
        assert_eq!(
            derive_overall_status(Error, Pending, NotProvided, Pending),
            OverallStatus::Processing
        );
        assert_eq!(
            derive_overall_status(Ready, Error, NotProvided, Pending),
            OverallStatus::Processing
        );
        assert_eq!(
            derive_overall_status(Ready, Ready, Ready, Error),
            OverallStatus::Failed
        );
    }

    #[test]
    fn statuses_never_regress() {
        let mut a = Applicant::new("a", None);
        a.apply(Stage::Cv, Processing, None).unwrap();
        a.apply(Stage::Cv, Ready, Some(json!({"name": "x"}))).unwrap();
        assert!(matches!(
            a.apply(Stage::Cv, Processing, None),
            Err(TransitionError::Regression { .. })
        ));
        assert!(matches!(
            a.apply(Stage::Cv, Error, None),
            Err(TransitionError::Regression { .. })
        ));
        assert_eq!(
            a.apply(Stage::Cv, Ready, None),
            Err(TransitionError::Unchanged {
                stage: Stage::Cv,
                status: Ready
            })
        );
        assert_eq!(a.cv_status, Ready);
    }

    #[test]
    fn not_provided_is_for_optional_pending_sources() {
        let mut a = Applicant::new("a", None);
        assert_eq!(
            a.apply(Stage::Cv, NotProvided, None),
            Err(TransitionError::NotProvidedNotAllowed(Stage::Cv))
        );
        assert_eq!(
            a.apply(Stage::Ai, NotProvided, None),
            Err(TransitionError::NotProvidedNotAllowed(Stage::Ai))
        );
        a.apply(Stage::GitHub, Processing, None).unwrap();
        assert!(a.apply(Stage::GitHub, NotProvided, None).is_err());
        a.apply(Stage::LinkedIn, NotProvided, None).unwrap();
        assert_eq!(a.linkedin_status, NotProvided);
    }

    #[test]
    fn ready_requires_data_and_data_requires_ready() {
        let mut a = Applicant::new("a", None);
        assert_eq!(
            a.apply(Stage::Cv, Ready, None),
            Err(TransitionError::MissingData(Stage::Cv))
        );
        assert_eq!(
            a.apply(Stage::Cv, Processing, Some(json!({}))),
            Err(TransitionError::UnexpectedData(Stage::Cv))
        );
        assert_eq!(
            a.apply(Stage::Ai, Processing, Some(json!({}))),
            Err(TransitionError::UnexpectedData(Stage::Ai))
        );
        assert_eq!(a.cv_status, Pending);
        assert_eq!(a.ai_status, Pending);
    }

    #[test]
    fn ready_data_hides_unready_sources() {
        let mut a = Applicant::new("a", None);
        a.apply(Stage::Cv, Ready, Some(json!({"name": "x"}))).unwrap();
        a.github_data = Some(json!({"login": "x"}));
        assert!(a.ready_data(SourceKind::Cv).is_some());
        assert!(a.ready_data(SourceKind::GitHub).is_none());
        assert_eq!(a.tier_score(), 15);
    }

    #[test]
    fn aggregation_waits_for_every_source() {
        let mut a = Applicant::new("a", None);
        a.apply(Stage::Cv, Ready, Some(json!({}))).unwrap();
        a.apply(Stage::LinkedIn, NotProvided, None).unwrap();
        assert!(!a.ready_for_aggregation());
        a.apply(Stage::GitHub, Error, None).unwrap();
        assert!(a.ready_for_aggregation());
        assert_eq!(a.overall_status(), OverallStatus::Processing);
    }

    #[test]
    fn new_run_only_after_terminal_ai() {
        let mut a = Applicant::new("a", None);
        assert_eq!(a.start_new_run(), Ok(1));
        a.apply(Stage::Ai, Processing, None).unwrap();
        assert_eq!(
            a.start_new_run(),
            Err(TransitionError::RunInFlight("a".into()))
        );
        a.apply(Stage::Ai, Ready, None).unwrap();
        assert_eq!(a.start_new_run(), Ok(2));
        assert_eq!(a.ai_status, Pending);
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!("not_provided".parse::<StageStatus>(), Ok(NotProvided));
        assert_eq!("LinkedIn".parse::<SourceKind>(), Ok(SourceKind::LinkedIn));
        assert!("ai".parse::<SourceKind>().is_err());
    }
}
