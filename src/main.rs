//! setbased: run Set-Based Design reduction cycles on a problem file.
//!
//! This is the CLI binary entry point.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;

use setbased::config;
use setbased::control::ExploreSpace;
use setbased::fragility::PerceptionHistory;
use setbased::runtime::{sample_and_evaluate, BuiltProblem, CheckKind, DesignManager, ModelKind, ProblemDefinition};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Model {
    Pfm,
    Efm,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Check {
    Basic,
    Adaptive,
}

/// Set-Based Design fragility CLI.
#[derive(Parser, Debug)]
#[command(name = "setbased", about = "Set-Based Design with fragility-checked space reduction", version)]
struct Cli {
    /// Problem definition (JSON).
    #[arg(short, long)]
    problem: PathBuf,

    /// Iteration budget.
    #[arg(long, default_value_t = config::DEFAULT_ITERS_MAX)]
    iters_max: usize,

    /// Seed for sampling, noise and combination choice.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Risk model (overrides the problem file).
    #[arg(long, value_enum)]
    model: Option<Model>,

    /// Fragility threshold strategy (overrides the problem file).
    #[arg(long, value_enum)]
    check: Option<Check>,

    /// Perception history archive: resumed if present, written at the end.
    #[arg(long)]
    history: Option<PathBuf>,

    /// Write the cycle reports as JSON.
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    tracing::info!("setbased v{}", env!("CARGO_PKG_VERSION"));

    let problem = ProblemDefinition::load(&cli.problem)?;
    let mut manager_config = problem.manager.clone();
    if let Some(m) = cli.model {
        manager_config.model = match m {
            Model::Pfm => ModelKind::Pfm,
            Model::Efm => ModelKind::Efm,
        };
    }
    if let Some(c) = cli.check {
        manager_config.check = match c {
            Check::Basic => CheckKind::Basic,
            Check::Adaptive => CheckKind::Adaptive,
        };
    }
    let explore = manager_config.explore;

    let BuiltProblem {
        mut disciplines,
        analyses,
    } = problem.build()?;
    tracing::info!(
        "{} disciplines, model {:?}, check {:?}",
        disciplines.len(),
        manager_config.model,
        manager_config.check
    );

    let mut manager = DesignManager::new(manager_config);
    if let Some(path) = cli.history.as_deref().filter(|p| p.exists()) {
        manager = manager.with_history(PerceptionHistory::load(path)?);
    }

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let mut reports = Vec::new();
    let mut iters = 0;
    loop {
        let budget = ExploreSpace::new(iters, cli.iters_max, explore).fixed_explore();
        if budget == 0 {
            break;
        }
        let added = sample_and_evaluate(&mut disciplines, &analyses, budget, &mut rng)?;
        iters += budget;

        let report = manager.run_cycle(&mut disciplines, iters, cli.iters_max, &mut rng)?;
        tracing::info!(
            "iter {:>4}: +{} points, {} proposals, {} committed, {} banned",
            iters,
            added,
            report.proposals.len(),
            report.committed.len(),
            report.banned.len()
        );
        for (name, fraction) in &report.space_remaining {
            tracing::info!("  {:<16} {:>6.1}% remaining", name, fraction * 100.0);
        }
        reports.push(report);
    }

    println!("Committed rules:");
    for rule in &manager.input_rules {
        println!("  {}", rule);
    }

    if let Some(path) = &cli.history {
        manager.history.save(path)?;
    }
    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&reports).context("serialising cycle reports")?;
        std::fs::write(path, json).with_context(|| format!("writing report to {}", path.display()))?;
    }
    Ok(())
}
