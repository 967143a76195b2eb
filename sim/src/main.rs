//! curation-sim: replay curation pool scenarios from the command line

use anyhow::Result;
use clap::{Parser, Subcommand};
use curation_sim::{LogEntry, Scenario};
use owo_colors::OwoColorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "curation-sim")]
#[command(about = "Curation pool scenario driver", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario and print the state after every action
    Run {
        /// Scenario file (TOML)
        #[arg(value_name = "FILE")]
        scenario: PathBuf,

        /// Print one JSON object per step instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Validate a scenario file without running it
    Check {
        #[arg(value_name = "FILE")]
        scenario: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { scenario, json } => {
            let scenario = Scenario::load(&scenario)?;
            let log = curation_sim::run_scenario(&scenario)?;
            if json {
                for entry in &log {
                    println!("{}", serde_json::to_string(entry)?);
                }
            } else {
                render_log(&scenario, &log);
            }
        }
        Commands::Check { scenario: path } => {
            let scenario = Scenario::load(&path)?;
            // Genesis allocations are only checked once the pool is built
            curation_sim::Simulation::new(&scenario)?;
            println!(
                "{} {} ({} actions)",
                "✓".green(),
                scenario.display_name().bold(),
                scenario.actions.len()
            );
        }
    }

    Ok(())
}

fn render_log(scenario: &Scenario, log: &[LogEntry]) {
    println!(
        "{}",
        "╔══════════════════════════════════════════════════════════════╗"
            .cyan()
            .bold()
    );
    println!("  {}", scenario.display_name().cyan().bold());
    if let Some(description) = &scenario.description {
        println!("  {}", description.bright_black());
    }
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════════════╝"
            .cyan()
            .bold()
    );
    println!(
        "{:>4}  {:>8}  {:<40} {:>14} {:>14}",
        "step".bright_black(),
        "block".bright_black(),
        "action".bright_black(),
        "pool reserve".bright_black(),
        "share supply".bright_black()
    );

    for entry in log {
        let state = &entry.state;
        let label = format!("{:<40}", entry.label());
        let label = if entry.is_failure() {
            label.red().to_string()
        } else {
            label.white().to_string()
        };
        println!(
            "{:>4}  {:>8}  {} {:>14} {:>14}",
            entry.step,
            state.block_height,
            label,
            state.primary_pool_reserve.round_dp(4).to_string().green(),
            state.share_supply.round_dp(4).to_string().yellow()
        );
        if let Some(error) = &entry.error {
            println!("{:>16}{} {}", "", "✗".red(), error.red());
        }
        for watched in &state.watched {
            let ratio = watched
                .share_ratio
                .map(|r| r.round_dp(6).to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:>16}{:<20} shares {:>14}  deposit {:>10}  ratio {}",
                "",
                watched.account.bright_blue(),
                watched.shares.round_dp(4),
                watched.deposit.round_dp(4),
                ratio.bright_cyan()
            );
        }
    }

    let failures = log.iter().filter(|e| e.is_failure()).count();
    println!();
    if failures == 0 {
        println!("{} {} steps replayed", "✓".green(), log.len() - 1);
    } else {
        println!(
            "{} {} steps replayed, {} failed",
            "⚠".yellow(),
            log.len() - 1,
            failures.to_string().red()
        );
    }
}
