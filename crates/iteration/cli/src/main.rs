//! iterate - iteration strategy checker and simulator
//!
//! - `iterate check <file>` compiles a processor declaration, prints its
//!   strategy layers and, given `--depth port=n` pairs, the resulting
//!   iteration depth.
//! - `iterate simulate <file>` pushes many concurrent runs with shuffled
//!   arrival order through the compiled stack and reports what came out.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod simulate;

use config::IterateConfig;

#[derive(Parser)]
#[command(name = "iterate")]
#[command(about = "Check and simulate iteration strategies", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ITERATE_CONFIG", global = true)]
    config: Option<String>,

    /// Log level
    #[arg(long, env = "ITERATE_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a processor declaration and report its strategy
    Check {
        /// Processor declaration file
        file: String,

        /// Supplied depth for a port, as PORT=DEPTH
        #[arg(short, long = "depth", value_parser = parse_depth)]
        depths: Vec<(String, usize)>,
    },

    /// Run concurrent simulated workflow runs through the strategy
    Simulate {
        /// Processor declaration file
        file: String,

        #[arg(long)]
        runs: Option<usize>,

        #[arg(long)]
        width: Option<usize>,

        #[arg(long)]
        threads: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// Levels supplied beyond each port's declared depth
        #[arg(long)]
        extra_depth: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        report_json: bool,
    },
}

fn parse_depth(arg: &str) -> Result<(String, usize), String> {
    let (port, depth) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected PORT=DEPTH, got '{}'", arg))?;
    let depth = depth
        .parse()
        .map_err(|e| format!("invalid depth '{}': {}", depth, e))?;
    Ok((port.to_string(), depth))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = IterateConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.logging.json |= cli.json;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    match cli.command {
        Command::Check { file, depths } => check(&file, depths),
        Command::Simulate {
            file,
            runs,
            width,
            threads,
            seed,
            extra_depth,
            report_json,
        } => {
            let mut sim = config.simulation;
            sim.runs = runs.unwrap_or(sim.runs);
            sim.width = width.unwrap_or(sim.width);
            sim.threads = threads.unwrap_or(sim.threads);
            sim.seed = seed.unwrap_or(sim.seed);
            sim.extra_depth = extra_depth.unwrap_or(sim.extra_depth);

            let processor = load_processor(&file)?;
            let stack = processor.build_stack()?;
            let report = simulate::simulate(&stack, &sim)?;

            if report_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Processor:       {}", processor.name);
                println!("Runs:            {}", report.runs);
                println!("Iteration depth: {}", report.iteration_depth);
                println!("Jobs in:         {}", report.jobs_in);
                println!("Jobs out:        {}", report.jobs_out);
                println!("Completions:     {}", report.completions);
                println!("Elapsed:         {} ms", report.elapsed_ms);
            }
            if !report.is_clean() {
                anyhow::bail!("{} runs did not complete exactly once", report.incomplete_runs);
            }
            Ok(())
        }
    }
}

fn load_processor(file: &str) -> anyhow::Result<iteration_dsl::CompiledProcessor> {
    let source =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file))?;
    iteration_dsl::compile(&source).with_context(|| format!("compiling {}", file))
}

fn check(file: &str, depths: Vec<(String, usize)>) -> anyhow::Result<()> {
    let processor = load_processor(file)?;
    let stack = processor.build_stack()?;

    println!("Processor: {}", processor.name);
    for (i, layer) in processor.stack.layers.iter().enumerate() {
        println!("  layer {}: {}", i, layer);
    }
    for (port, depth) in processor.desired_depths() {
        println!("  input {} declared depth {}", port, depth);
    }

    if !depths.is_empty() {
        let supplied: HashMap<String, usize> = depths.into_iter().collect();
        let depth = stack.iteration_depth(&supplied)?;
        println!("Iteration depth: {}", depth);
    }
    Ok(())
}
