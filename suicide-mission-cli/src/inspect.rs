use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;

use suicide_mission::{CheckpointStore, FileStore, OutcomeCode, RunConfig};

use crate::reports::{self, Filter, OutcomeDetail, ReportFormat, Summary};
use crate::util::ReportSink;

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Checkpoint file to read
    #[arg(long, default_value = RunConfig::DEFAULT_CHECKPOINT)]
    pub checkpoint: PathBuf,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    pub report: ReportFormat,

    /// Number of outcomes in the ranked table
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Only rank outcomes with at least this many survivors
    #[arg(long)]
    pub min_spared: Option<usize>,

    /// Explain one outcome code (hex) through its example traversal
    #[arg(long)]
    pub outcome: Option<String>,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn execute(args: &InspectArgs) -> Result<ExitCode> {
    let store = FileStore::new(&args.checkpoint);
    let checkpoint = store
        .load()
        .with_context(|| format!("failed to read {}", args.checkpoint.display()))?
        .with_context(|| format!("no checkpoint at {}", args.checkpoint.display()))?;

    let summary = Summary::new(
        &checkpoint,
        Filter {
            limit: args.limit,
            min_spared: args.min_spared,
        },
    );
    let detail = args
        .outcome
        .as_deref()
        .map(|hex| {
            let code: OutcomeCode = hex
                .parse()
                .with_context(|| format!("invalid outcome code {hex:?}"))?;
            OutcomeDetail::new(&checkpoint, code)
        })
        .transpose()?;

    let mut sink = ReportSink::open(args.output.as_deref())?;
    reports::write_report(&mut sink, args.report, &summary, detail.as_ref())?;
    sink.finish()?;
    Ok(ExitCode::SUCCESS)
}
