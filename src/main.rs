//! gridskills: macro-action discovery for tabular Q-learning
//!
//! Provides subcommands:
//!
//! - `train`    -- Run baseline and/or experiment training and print the curves
//! - `oracle`   -- Query the minimum-step oracle for a pair of cells
//! - `inspect`  -- Inspect a saved action frequency table
//! - `render`   -- Print the configured map

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use gridskills::config::ExperimentConfig;
use gridskills::env::{build_env, Environment, GoalEnvironment};
use gridskills::skill::{format_actions, ActionFrequencyTable};
use gridskills::training::{MinStepsOracle, RunSummary, Trainer};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// gridskills: macro-action discovery for tabular Q-learning
#[derive(Parser)]
#[command(name = "gridskills", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the seed from the configuration.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Both,
    Baseline,
    Experiment,
}

#[derive(Subcommand)]
enum Commands {
    /// Train for a number of rounds and print episodes-to-converge per round.
    Train {
        /// Number of rounds (goals) per run.
        #[arg(long, default_value_t = 100)]
        iterations: usize,

        /// Override the convergence slack exponent.
        #[arg(long)]
        slack: Option<u32>,

        /// Which runs to perform.
        #[arg(long, value_enum, default_value_t = Mode::Both)]
        mode: Mode,

        /// Path to save the run summary.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Path to save the experiment's action frequency table.
        #[arg(long)]
        skills_out: Option<PathBuf>,

        /// Print every step of every episode.
        #[arg(long)]
        render: bool,
    },

    /// Print the minimum step count and optimal return between two cells.
    Oracle {
        /// Start cell as `row,col`.
        #[arg(long, value_parser = parse_cell)]
        from: (usize, usize),

        /// Goal cell as `row,col`.
        #[arg(long, value_parser = parse_cell)]
        to: (usize, usize),
    },

    /// Inspect a saved action frequency table.
    Inspect {
        /// Path to the frequency table JSON file.
        #[arg(default_value = "data/frequencies.json")]
        path: PathBuf,
    },

    /// Print the configured map.
    Render,
}

fn parse_cell(s: &str) -> Result<(usize, usize), String> {
    let (row, col) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `row,col`, got `{s}`"))?;
    let row = row.trim().parse().map_err(|e| format!("bad row `{row}`: {e}"))?;
    let col = col.trim().parse().map_err(|e| format!("bad column `{col}`: {e}"))?;
    Ok((row, col))
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str::<ExperimentConfig>(&text)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?
        }
        None => ExperimentConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    match cli.command {
        Commands::Train {
            iterations,
            slack,
            mode,
            output,
            skills_out,
            render,
        } => {
            if let Some(slack) = slack {
                config.trainer.slack_factor = slack;
            }
            cmd_train(
                &config,
                iterations,
                mode,
                output.as_deref(),
                skills_out.as_deref(),
                render,
            )
        }
        Commands::Oracle { from, to } => cmd_oracle(&config, from, to),
        Commands::Inspect { path } => cmd_inspect(&config, &path),
        Commands::Render => cmd_render(&config),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_train(
    config: &ExperimentConfig,
    iterations: usize,
    mode: Mode,
    output: Option<&Path>,
    skills_out: Option<&Path>,
    render: bool,
) -> Result<()> {
    let mut summary = RunSummary::new(config.clone(), iterations);
    tracing::info!(run_id = %summary.id, iterations, ?mode, "Starting run");

    if mode != Mode::Experiment {
        let mut trainer = build_trainer(config, render)?;
        summary.baseline = Some(trainer.train(iterations, true)?);
        summary.baseline_rounds = trainer.reports().to_vec();
    }

    let mut frequencies = None;
    if mode != Mode::Baseline {
        let mut trainer = build_trainer(config, render)?;
        summary.experiment = Some(trainer.train(iterations, false)?);
        summary.experiment_rounds = trainer.reports().to_vec();
        frequencies = Some(trainer.frequencies().clone());
    }

    print_curve("baseline", summary.baseline.as_deref());
    print_curve("experiment", summary.experiment.as_deref());

    if let Some(path) = output {
        ensure_parent(path)?;
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run summary to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Run summary saved");
    }

    match (skills_out, frequencies) {
        (Some(path), Some(table)) => {
            ensure_parent(path)?;
            table.save_to_file(path)?;
        }
        (Some(_), None) => {
            tracing::warn!("--skills-out ignored: no experiment run in baseline mode");
        }
        _ => {}
    }

    Ok(())
}

fn cmd_oracle(config: &ExperimentConfig, from: (usize, usize), to: (usize, usize)) -> Result<()> {
    let mut env = build_env(&config.grid, config.seed)?;
    let (nrows, ncols) = env.inner().shape();
    for (name, (row, col)) in [("from", from), ("to", to)] {
        if row >= nrows || col >= ncols {
            bail!("--{name} {row},{col} is outside the {nrows}x{ncols} map");
        }
    }

    let s1 = env.encode(from.0, from.1);
    let goal = env.encode(to.0, to.1);
    env.set_goal(goal);

    let mut oracle = MinStepsOracle::new(env.n_states());
    let steps = oracle.min_steps(&env, s1, goal, env.n_states());
    let reward = oracle.optimal_reward(&env, s1, goal, config.trainer.gamma);

    println!("{from:?} -> {to:?}");
    if steps.is_finite() {
        println!("  Minimum steps:  {steps}");
    } else {
        println!("  Minimum steps:  unreachable");
    }
    println!("  Optimal return: {reward:.6} (gamma = {})", config.trainer.gamma);
    Ok(())
}

fn cmd_inspect(config: &ExperimentConfig, path: &Path) -> Result<()> {
    let table = ActionFrequencyTable::load_from_file(path)?;
    let env = build_env(&config.grid, config.seed)?;
    let glyphs = env.action_strings();

    println!("Action frequency table: {}", path.display());
    println!("  Distinct subsequences: {}", table.len());
    println!("  Total count: {}", table.total_count());
    println!();

    println!("Ranked by time saved:");
    for (seq, saved) in table.ranked().into_iter().rev().take(20) {
        println!(
            "  {:<12} saved {saved:>6}  (count {})",
            format_actions(seq, glyphs),
            table.count(seq)
        );
    }
    if table.len() > 20 {
        println!("  ... and {} more", table.len() - 20);
    }

    let history = table.history();
    if !history.is_empty() {
        println!();
        println!("Recorded traces ({} entries):", history.len());
        for entry in history.iter().take(10) {
            println!(
                "  Round {}: {} actions, {} slices at {}",
                entry.round,
                entry.trace_len,
                entry.slices_counted,
                entry.recorded_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        if history.len() > 10 {
            println!("  ... and {} more", history.len() - 10);
        }
    }

    Ok(())
}

fn cmd_render(config: &ExperimentConfig) -> Result<()> {
    let env = build_env(&config.grid, config.seed)?;
    let (nrows, ncols) = env.inner().shape();
    println!("{}", env.render());
    println!(
        "{nrows}x{ncols} map, {} actions, episodes truncated after {} steps",
        env.n_actions(),
        env.max_steps()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_trainer(
    config: &ExperimentConfig,
    render: bool,
) -> Result<Trainer<gridskills::env::TimeLimit<gridskills::env::Gridworld>>> {
    let env = build_env(&config.grid, config.seed)?;
    let trainer = Trainer::new(env, config.trainer.clone(), config.seed);
    Ok(if render {
        trainer.with_render(Duration::from_millis(500))
    } else {
        trainer
    })
}

fn print_curve(label: &str, times: Option<&[usize]>) {
    let Some(times) = times else {
        return;
    };
    let total: usize = times.iter().sum();
    println!("{label}: {} rounds, {total} episodes", times.len());
    println!("  {times:?}");
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}
