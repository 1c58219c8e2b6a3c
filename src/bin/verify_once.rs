//! Run one full analysis over source files and print the record as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{ArgGroup, Parser};
use serde_json::Value;

use applicant_verifier::config::AppConfig;
use applicant_verifier::{
    build_client, telemetry, Coordinator, CoordinatorSettings, MemoryStore, Pipeline, SourceKind,
    StageStatus,
};

#[derive(Parser, Debug)]
#[command(
    name = "verify_once",
    about = "Run one applicant verification over local JSON files",
    version
)]
#[command(group(
    ArgGroup::new("sources")
        .args(["cv", "linkedin", "github"])
        .required(true)
        .multiple(true)
))]
struct Args {
    /// Applicant display name
    #[arg(long)]
    name: Option<String>,
    /// Extracted CV record (JSON)
    #[arg(long)]
    cv: Option<PathBuf>,
    /// LinkedIn profile record (JSON)
    #[arg(long)]
    linkedin: Option<PathBuf>,
    /// GitHub profile record (JSON)
    #[arg(long)]
    github: Option<PathBuf>,
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let mut config = AppConfig::load()?;
    config.pipeline.auto_analyze_partial = true;
    telemetry::init(&config.telemetry)?;

    let judge = build_client(&config.judgment)?;
    let coordinator = Coordinator::new(
        Arc::new(MemoryStore::new()),
        Pipeline::new(judge, config.pipeline.high_risk_threshold),
        CoordinatorSettings::from(&config.pipeline),
    );

    let mut applicant = coordinator
        .intake(args.name, args.linkedin.is_some(), args.github.is_some())
        .await?;
    let sources = [
        (SourceKind::Cv, &args.cv),
        (SourceKind::LinkedIn, &args.linkedin),
        (SourceKind::GitHub, &args.github),
    ];
    for (kind, path) in sources {
        let (status, data) = match path {
            Some(p) => (StageStatus::Ready, Some(read_json(p)?)),
            // A missing CV is an extraction failure, not an absent optional source.
            None if kind == SourceKind::Cv => (StageStatus::Error, None),
            None => continue,
        };
        applicant = coordinator
            .on_source_status(&applicant.id, kind, status, data)
            .await?;
    }

    match &applicant.analysis {
        Some(record) => println!("{}", serde_json::to_string_pretty(record)?),
        None => bail!(
            "no analysis produced (status {:?})",
            applicant.overall_status()
        ),
    }
    Ok(())
}
