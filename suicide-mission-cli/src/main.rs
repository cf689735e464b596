mod inspect;
mod reports;
mod run;
mod util;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process::ExitCode;

use inspect::InspectArgs;
use run::RunArgs;

#[derive(Debug, Parser)]
#[command(name = "suicide-mission", version = "0.1.0")]
#[command(
    about = "Exhaustive, resumable enumeration of every path through the Mass Effect 2 suicide mission"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Walk the decision tree, resuming from the checkpoint when one exists
    Run(RunArgs),
    /// Summarise a checkpoint without walking anything
    Inspect(InspectArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => run::execute(args).await,
        Command::Inspect(args) => inspect::execute(&args),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "❌ error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn announce_banner() {
    println!("{}", "🚀 Suicide Mission Enumerator".bright_cyan().bold());
    println!("{}", "================================".cyan());
}
