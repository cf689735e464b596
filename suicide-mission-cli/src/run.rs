use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use suicide_mission::tree::MIN_RECRUITS;
use suicide_mission::{Ally, FileStore, RunConfig, RunStatus, Runner, Scope};

use crate::util::split_csv;

/// Exit status for a run that stopped before the tree was exhausted.
const EXIT_PAUSED: u8 = 3;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Checkpoint file to resume from and save to
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// JSON run configuration; flags override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Save a checkpoint every N leaves
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub save_every: Option<u64>,

    /// Stop after N leaves in this invocation
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub budget: Option<u64>,

    /// Fix the optional recruits (comma-separated names, at least three)
    #[arg(long)]
    pub recruits: Option<String>,

    /// Fix exactly which allies are loyal (comma-separated names or "none")
    #[arg(long)]
    pub loyal: Option<String>,

    /// Fix the ship upgrades: the named ones (armor,shield,weapon) are bought
    #[arg(long)]
    pub upgrades: Option<String>,
}

impl RunArgs {
    /// Configuration file (or defaults) with every given flag applied.
    pub fn resolve_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => RunConfig::default(),
        };
        if let Some(path) = &self.checkpoint {
            config.checkpoint_path.clone_from(path);
        }
        if let Some(every) = self.save_every {
            config.save_every_leaves = every;
        }
        if self.budget.is_some() {
            config.leaf_budget = self.budget;
        }
        config.scope = self.apply_scope(config.scope)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_scope(&self, mut scope: Scope) -> Result<Scope> {
        let recruits = self.recruits.as_deref().map(parse_recruits).transpose()?;
        if let Some(recruits) = recruits {
            scope = scope.with_recruits(recruits);
        }
        if let Some(list) = &self.loyal {
            let loyal = Ally::parse_list(list)? & Ally::LOYALTY;
            if let Some(recruits) = recruits {
                let absent = loyal - Ally::REQUIRED - recruits;
                if !absent.is_empty() {
                    bail!("{absent} cannot be loyal without being recruited");
                }
            }
            scope = scope.with_loyalty(loyal);
        }
        if let Some(list) = &self.upgrades {
            let (armor, shield, weapon) = parse_upgrades(list)?;
            scope = scope.with_upgrades(armor, shield, weapon);
        }
        Ok(scope)
    }
}

fn parse_recruits(list: &str) -> Result<Ally> {
    let recruits = Ally::parse_list(list)?;
    let stray = recruits - Ally::RECRUITABLE;
    if !stray.is_empty() {
        bail!("{stray} cannot be chosen during recruitment");
    }
    if recruits.len() < MIN_RECRUITS {
        bail!(
            "at least {MIN_RECRUITS} optional recruits are required, got {}",
            recruits.len()
        );
    }
    Ok(recruits)
}

fn parse_upgrades(list: &str) -> Result<(bool, bool, bool)> {
    let mut upgrades = (false, false, false);
    for token in split_csv(list) {
        match token.to_ascii_lowercase().as_str() {
            "none" => {}
            "all" => upgrades = (true, true, true),
            "armor" => upgrades.0 = true,
            "shield" => upgrades.1 = true,
            "weapon" => upgrades.2 = true,
            other => bail!("unknown upgrade {other:?} (expected armor, shield or weapon)"),
        }
    }
    Ok(upgrades)
}

pub async fn execute(args: RunArgs) -> Result<ExitCode> {
    let config = args.resolve_config()?;
    crate::announce_banner();
    println!("🎯 Scope: {}", config.scope.to_string().bold());
    println!("💾 Checkpoint: {}", config.checkpoint_path.display());
    println!();

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "⏸️  Interrupt received, saving checkpoint...".yellow());
            flag.store(true, Ordering::Relaxed);
        }
    });

    let store = FileStore::new(&config.checkpoint_path);
    let mut runner = Runner::new(store, config);
    let report = tokio::task::spawn_blocking(move || runner.run(&interrupt))
        .await
        .context("enumeration task failed")??;

    crate::reports::print_run_report(&report);
    Ok(match report.status {
        RunStatus::Complete => ExitCode::SUCCESS,
        RunStatus::Paused(_) => ExitCode::from(EXIT_PAUSED),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use suicide_mission::Step;

    fn args() -> RunArgs {
        RunArgs {
            checkpoint: None,
            config: None,
            save_every: None,
            budget: None,
            recruits: None,
            loyal: None,
            upgrades: None,
        }
    }

    #[test]
    fn no_flags_means_full_search() {
        let config = args().resolve_config().unwrap();
        assert!(config.scope.is_full());
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn flags_pin_the_scope() {
        let args = RunArgs {
            recruits: Some("Grunt, tali,ZAEED".to_string()),
            loyal: Some("garrus,tali".to_string()),
            upgrades: Some("armor,weapon".to_string()),
            budget: Some(10),
            ..args()
        };
        let config = args.resolve_config().unwrap();
        let expected = Scope::full()
            .with_recruits(Ally::GRUNT | Ally::TALI | Ally::ZAEED)
            .with_loyalty(Ally::GARRUS | Ally::TALI)
            .with_upgrades(true, false, true);
        assert_eq!(config.scope, expected);
        assert_eq!(config.leaf_budget, Some(10));
        assert_eq!(config.scope.pinned(Step::Shield), Some(0));
    }

    #[test]
    fn too_few_recruits_are_rejected() {
        let args = RunArgs {
            recruits: Some("grunt,tali".to_string()),
            ..args()
        };
        assert!(args.resolve_config().is_err());
    }

    #[test]
    fn required_allies_are_not_recruits() {
        let args = RunArgs {
            recruits: Some("garrus,grunt,tali".to_string()),
            ..args()
        };
        let err = args.resolve_config().unwrap_err();
        assert!(err.to_string().contains("Garrus"));
    }

    #[test]
    fn loyalty_must_follow_recruitment() {
        let args = RunArgs {
            recruits: Some("grunt,tali,zaeed".to_string()),
            loyal: Some("legion".to_string()),
            ..args()
        };
        assert!(args.resolve_config().is_err());
    }

    #[test]
    fn upgrade_lists() {
        assert_eq!(parse_upgrades("none").unwrap(), (false, false, false));
        assert_eq!(parse_upgrades("all").unwrap(), (true, true, true));
        assert_eq!(parse_upgrades("Shield").unwrap(), (false, true, false));
        assert!(parse_upgrades("thanix").is_err());
    }

    #[test]
    fn config_file_fields_are_overridden() {
        let path = std::env::temp_dir().join(format!(
            "suicide-mission-config-{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        std::fs::write(
            &path,
            r#"{"save_every_leaves": 7, "leaf_budget": 99, "checkpoint_path": "a.ckpt"}"#,
        )
        .unwrap();
        let args = RunArgs {
            config: Some(path.clone()),
            checkpoint: Some(PathBuf::from("b.ckpt")),
            ..args()
        };
        let config = args.resolve_config().unwrap();
        assert_eq!(config.save_every_leaves, 7);
        assert_eq!(config.leaf_budget, Some(99));
        assert_eq!(config.checkpoint_path, PathBuf::from("b.ckpt"));
        std::fs::remove_file(path).unwrap();
    }
}
