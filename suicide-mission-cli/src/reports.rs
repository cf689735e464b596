use anyhow::{Context as _, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;

use suicide_mission::tree::expand_recruits;
use suicide_mission::{
    Ally, Checkpoint, Context, CrewSurvival, Outcome, OutcomeCode, RunReport, RunStatus, Step,
    Traversal,
};

use crate::util::{format_count, percent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Colored terminal summary
    Console,
    /// Machine-readable JSON
    Json,
    /// Markdown tables
    Markdown,
}

/// Which outcomes make it into the ranked table.
#[derive(Debug, Clone, Copy)]
pub struct Filter {
    pub limit: usize,
    pub min_spared: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub complete: bool,
    pub scope: String,
    pub leaves: u64,
    pub outcomes: usize,
    pub digest: String,
    pub commander: CommanderSplit,
    pub crew: Vec<CrewCount>,
    pub top: Vec<OutcomeRow>,
}

#[derive(Debug, Default, Serialize)]
pub struct CommanderSplit {
    pub survives: u64,
    pub dies: u64,
}

#[derive(Debug, Serialize)]
pub struct CrewCount {
    pub crew: CrewSurvival,
    pub leaves: u64,
}

#[derive(Debug, Serialize)]
pub struct OutcomeRow {
    pub code: String,
    pub leaves: u64,
    pub share: f64,
    pub spared_count: usize,
    pub spared: String,
    pub loyal: String,
    pub crew: CrewSurvival,
    pub commander_survives: bool,
    pub example: String,
}

impl Summary {
    pub fn new(checkpoint: &Checkpoint, filter: Filter) -> Self {
        let total = checkpoint.aggregator.total();
        let mut commander = CommanderSplit::default();
        let mut crew: Vec<CrewCount> = CrewSurvival::ALL_LEVELS
            .iter()
            .map(|&level| CrewCount {
                crew: level,
                leaves: 0,
            })
            .collect();
        let mut rows = Vec::new();

        for (code, record) in checkpoint.aggregator.iter() {
            let outcome = Outcome::decode(code);
            if outcome.commander_survives() {
                commander.survives += record.count;
            } else {
                commander.dies += record.count;
            }
            if let Some(slot) = crew.iter_mut().find(|slot| slot.crew == outcome.crew) {
                slot.leaves += record.count;
            }
            if filter
                .min_spared
                .is_some_and(|min| outcome.spared.len() < min)
            {
                continue;
            }
            rows.push(OutcomeRow {
                code: code.to_string(),
                leaves: record.count,
                share: percent(record.count, total),
                spared_count: outcome.spared.len(),
                spared: outcome.spared.to_string(),
                loyal: outcome.loyal.to_string(),
                crew: outcome.crew,
                commander_survives: outcome.commander_survives(),
                example: record.example.to_string(),
            });
        }

        // Most common first; the code breaks ties so the order is stable.
        rows.sort_by(|a, b| b.leaves.cmp(&a.leaves).then_with(|| a.code.cmp(&b.code)));
        rows.truncate(filter.limit);

        Self {
            complete: checkpoint.is_complete(),
            scope: checkpoint.scope.to_string(),
            leaves: checkpoint.leaves,
            outcomes: checkpoint.aggregator.len(),
            digest: format!("{:016x}", checkpoint.aggregator.digest()),
            commander,
            crew,
            top: rows,
        }
    }

    const fn status(&self) -> &'static str {
        if self.complete { "complete" } else { "in progress" }
    }
}

/// One decision of the example traversal and who it cost.
#[derive(Debug, Serialize)]
pub struct Decision {
    pub step: Step,
    pub value: u16,
    pub choice: String,
    pub died: String,
}

#[derive(Debug, Serialize)]
pub struct OutcomeDetail {
    pub code: String,
    pub leaves: u64,
    pub example: String,
    pub spared: String,
    pub dead: String,
    pub loyal: String,
    pub crew: CrewSurvival,
    pub commander_survives: bool,
    pub decisions: Vec<Decision>,
}

impl OutcomeDetail {
    /// Replays the stored example path of `code` step by step.
    pub fn new(checkpoint: &Checkpoint, code: OutcomeCode) -> Result<Self> {
        let record = checkpoint
            .aggregator
            .get(code)
            .with_context(|| format!("outcome {code} was not reached in this checkpoint"))?;
        let traversal = Traversal::decode(record.example);

        let mut ctx = Context::root();
        let mut decisions = Vec::with_capacity(Step::COUNT);
        for step in Step::ALL {
            let value = traversal.get(step);
            let next = ctx
                .advance(step, value)
                .with_context(|| format!("example {} does not replay", record.example))?;
            let died = match step {
                // Samara leaves rather than dies.
                Step::Morinth => Ally::NOBODY,
                _ => next.team.dead - ctx.team.dead,
            };
            decisions.push(Decision {
                step,
                value,
                choice: describe(step, value),
                died: if died.is_empty() {
                    String::new()
                } else {
                    died.to_string()
                },
            });
            ctx = next;
        }

        let outcome = ctx.finish()?;
        let mut dead = ctx.team.dead;
        if traversal.get(Step::Morinth) == 1 {
            dead -= Ally::SAMARA;
        }
        Ok(Self {
            code: code.to_string(),
            leaves: record.count,
            example: record.example.to_string(),
            spared: outcome.spared.to_string(),
            dead: dead.to_string(),
            loyal: outcome.loyal.to_string(),
            crew: outcome.crew,
            commander_survives: outcome.commander_survives(),
            decisions,
        })
    }
}

/// Human wording for a field value.
pub fn describe(step: Step, value: u16) -> String {
    let skipped = || "skipped".to_string();
    let ally = |value: u16| {
        Ally::from_index(value).map_or_else(skipped, |ally| ally.to_string())
    };
    let bought = |name: &str| {
        if value == 1 {
            format!("{name} fitted")
        } else {
            format!("no {name}")
        }
    };
    match step {
        Step::Recruitment => format!("recruited {}", expand_recruits(value)),
        Step::Loyalty => format!("loyal: {}", Ally::from_bits_truncate(value)),
        Step::Morinth if value == 1 => "Morinth replaces Samara".to_string(),
        Step::Morinth => "no swap".to_string(),
        Step::Armor => bought("Silaris armor"),
        Step::Shield => bought("Cyclonic shields"),
        Step::Weapon => bought("Thanix cannon"),
        Step::CargoBay | Step::LongWalk if value == 0 => skipped(),
        Step::CargoBay | Step::LongWalk => format!("victim rank {value}"),
        Step::Tech | Step::Biotic | Step::SecondLeader | Step::Escort => ally(value),
        Step::FirstLeader => match value {
            1 => "ideal leader".to_string(),
            2 => "non-ideal leader".to_string(),
            _ => skipped(),
        },
        Step::Rescue if value == 1 => "escort the crew home".to_string(),
        Step::Rescue => "crew left to fend for themselves".to_string(),
        Step::CrewDelay => match value {
            1 => "went in immediately".to_string(),
            2 => "after a few missions".to_string(),
            3 => "after many missions".to_string(),
            _ => skipped(),
        },
        Step::FinalSquad => Ally::from_bits_truncate(value).to_string(),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'a OutcomeDetail>,
}

/// Renders the summary and optional outcome detail in `format`.
pub fn write_report<W: Write + ?Sized>(
    out: &mut W,
    format: ReportFormat,
    summary: &Summary,
    detail: Option<&OutcomeDetail>,
) -> Result<()> {
    match format {
        ReportFormat::Console => generate_console_report(out, summary, detail),
        ReportFormat::Json => generate_json_report(out, summary, detail),
        ReportFormat::Markdown => generate_markdown_report(out, summary, detail),
    }
}

pub fn generate_json_report<W: Write + ?Sized>(
    out: &mut W,
    summary: &Summary,
    detail: Option<&OutcomeDetail>,
) -> Result<()> {
    let report = JsonReport {
        summary,
        outcome: detail,
    };
    let json_output = serde_json::to_string_pretty(&report)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_console_report<W: Write + ?Sized>(
    out: &mut W,
    summary: &Summary,
    detail: Option<&OutcomeDetail>,
) -> Result<()> {
    writeln!(out, "{}", "📊 Enumeration Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "======================".cyan())?;
    let status = if summary.complete {
        summary.status().green()
    } else {
        summary.status().yellow()
    };
    writeln!(out, "Status: {status}")?;
    writeln!(out, "Scope: {}", summary.scope)?;
    writeln!(out, "Leaves: {}", format_count(summary.leaves))?;
    writeln!(out, "Distinct outcomes: {}", format_count(summary.outcomes as u64))?;
    writeln!(out, "Digest: {}", summary.digest)?;
    writeln!(out)?;

    writeln!(out, "{}", "🧑‍🚀 Commander".bright_yellow().bold())?;
    writeln!(
        out,
        "   survives: {} ({:.2}%)",
        format_count(summary.commander.survives).green(),
        percent(summary.commander.survives, summary.leaves)
    )?;
    writeln!(
        out,
        "   dies:     {} ({:.2}%)",
        format_count(summary.commander.dies).red(),
        percent(summary.commander.dies, summary.leaves)
    )?;
    writeln!(out)?;

    writeln!(out, "{}", "🚑 Crew".bright_yellow().bold())?;
    for slot in &summary.crew {
        writeln!(
            out,
            "   {:13} {} ({:.2}%)",
            slot.crew.label(),
            format_count(slot.leaves),
            percent(slot.leaves, summary.leaves)
        )?;
    }
    writeln!(out)?;

    writeln!(out, "{}", "🏆 Top outcomes".bright_yellow().bold())?;
    if summary.top.is_empty() {
        writeln!(out, "   (none)")?;
    }
    for (rank, row) in summary.top.iter().enumerate() {
        let commander = if row.commander_survives {
            "✅".to_string()
        } else {
            "💀".to_string()
        };
        writeln!(
            out,
            "{:>3}. {} {} {} leaves ({:.2}%), crew {}",
            rank + 1,
            commander,
            row.code.bold(),
            format_count(row.leaves),
            row.share,
            row.crew
        )?;
        writeln!(out, "     spared ({}): {}", row.spared_count, row.spared)?;
        writeln!(out, "     loyal: {}", row.loyal.dimmed())?;
    }

    if let Some(detail) = detail {
        writeln!(out)?;
        writeln!(
            out,
            "{} {}",
            "🔎 Outcome".bright_blue().bold(),
            detail.code.bold()
        )?;
        writeln!(out, "{}", "-".repeat(30).blue())?;
        writeln!(out, "Reached by {} leaves", format_count(detail.leaves))?;
        writeln!(out, "Spared: {}", detail.spared.green())?;
        writeln!(out, "Dead: {}", detail.dead.red())?;
        writeln!(out, "Crew: {}", detail.crew)?;
        writeln!(out, "Example traversal {}:", detail.example)?;
        for decision in &detail.decisions {
            write!(out, "   {:14} {}", decision.step, decision.choice)?;
            if decision.died.is_empty() {
                writeln!(out)?;
            } else {
                writeln!(out, "  {} {}", "✝".red(), decision.died.red())?;
            }
        }
    }
    Ok(())
}

pub fn generate_markdown_report<W: Write + ?Sized>(
    out: &mut W,
    summary: &Summary,
    detail: Option<&OutcomeDetail>,
) -> Result<()> {
    writeln!(out, "# Suicide Mission Enumeration\n")?;
    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Status**: {}", summary.status())?;
    writeln!(out, "- **Scope**: {}", summary.scope)?;
    writeln!(out, "- **Leaves**: {}", summary.leaves)?;
    writeln!(out, "- **Distinct outcomes**: {}", summary.outcomes)?;
    writeln!(out, "- **Digest**: `{}`", summary.digest)?;
    writeln!(
        out,
        "- **Commander survives**: {} ({:.2}%)",
        summary.commander.survives,
        percent(summary.commander.survives, summary.leaves)
    )?;
    writeln!(
        out,
        "- **Commander dies**: {} ({:.2}%)\n",
        summary.commander.dies,
        percent(summary.commander.dies, summary.leaves)
    )?;

    writeln!(out, "## Crew\n")?;
    writeln!(out, "| Crew survival | Leaves | Share |")?;
    writeln!(out, "|---|---:|---:|")?;
    for slot in &summary.crew {
        writeln!(
            out,
            "| {} | {} | {:.2}% |",
            slot.crew,
            slot.leaves,
            percent(slot.leaves, summary.leaves)
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Top outcomes\n")?;
    writeln!(out, "| Code | Leaves | Share | Spared | Crew | Commander |")?;
    writeln!(out, "|---|---:|---:|---|---|---|")?;
    for row in &summary.top {
        writeln!(
            out,
            "| `{}` | {} | {:.2}% | {} | {} | {} |",
            row.code,
            row.leaves,
            row.share,
            row.spared,
            row.crew,
            if row.commander_survives {
                "survives"
            } else {
                "dies"
            }
        )?;
    }

    if let Some(detail) = detail {
        writeln!(out, "\n## Outcome `{}`\n", detail.code)?;
        writeln!(out, "- **Leaves**: {}", detail.leaves)?;
        writeln!(out, "- **Spared**: {}", detail.spared)?;
        writeln!(out, "- **Dead**: {}", detail.dead)?;
        writeln!(out, "- **Crew**: {}", detail.crew)?;
        writeln!(out, "- **Example**: `{}`\n", detail.example)?;
        writeln!(out, "| Step | Choice | Died |")?;
        writeln!(out, "|---|---|---|")?;
        for decision in &detail.decisions {
            writeln!(
                out,
                "| {} | {} | {} |",
                decision.step, decision.choice, decision.died
            )?;
        }
    }
    Ok(())
}

/// Printed by `run` once the runner returns.
pub fn print_run_report(report: &RunReport) {
    println!();
    match report.status {
        RunStatus::Complete => println!("{}", "✅ Enumeration complete".bright_green().bold()),
        RunStatus::Paused(reason) => println!(
            "{} ({})",
            "⏸️  Enumeration paused".bright_yellow().bold(),
            match reason {
                suicide_mission::PauseReason::Signal => "interrupted",
                suicide_mission::PauseReason::LeafBudget => "leaf budget reached",
            }
        ),
    }
    println!(
        "Leaves this run: {} ({:.0}/s)",
        format_count(report.leaves_this_run),
        report.leaves_per_second()
    );
    println!("Total leaves: {}", format_count(report.total_leaves));
    println!("Distinct outcomes: {}", format_count(report.outcomes as u64));
    println!("Digest: {:016x}", report.digest);
    println!("🏁 Elapsed: {:?}", report.elapsed);
}
