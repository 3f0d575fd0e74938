use std::hash::Hasher;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use autopilot::sim::{Scenario, TICK_SECONDS};
use autopilot::trace_file::{TraceHeader, TraceRecord, TraceWriter, load_trace_from_file};
use autopilot::{Autopilot, AutopilotConfig};
use clap::Parser;
use serde::Serialize;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;
use xxhash_rust::xxh3::Xxh3;

#[derive(Parser)]
#[command(author, version, about = "Run the autopilot through a demo-level scenario", long_about = None)]
struct Args {
    /// One of: door, button, weapon, finale, full
    #[arg(short, long, default_value = "full")]
    scenario: String,
    /// Overrides the scenario's tick budget
    #[arg(short, long)]
    ticks: Option<u32>,
    /// TOML file with autopilot tuning overrides
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Write a hash-chained JSONL trace of every decision
    #[arg(long)]
    trace: Option<PathBuf>,
    /// Compare this run against a previously written trace
    #[arg(long)]
    verify: Option<PathBuf>,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct RunSummary<'a> {
    scenario: &'a str,
    succeeded: bool,
    ticks: u32,
    replan_count: u32,
    hostiles_left: usize,
    decision_digest: String,
    final_state: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::WARN.into()))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => AutopilotConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => AutopilotConfig::default(),
    };
    let Some(mut scenario) = Scenario::by_name(&args.scenario) else {
        bail!("Unknown scenario '{}', expected one of {:?}", args.scenario, Scenario::NAMES);
    };
    if let Some(ticks) = args.ticks {
        scenario.max_ticks = ticks;
    }

    let mut writer = match &args.trace {
        Some(path) => {
            let header = TraceHeader::new(scenario.name, &scenario.script.name, &config);
            let writer = TraceWriter::create(path, &header)
                .with_context(|| format!("Failed to create trace file: {}", path.display()))?;
            Some(writer)
        }
        None => None,
    };

    info!(scenario = scenario.name, budget = scenario.max_ticks, "starting run");
    let Scenario { name, mut world, script, max_ticks, success } = scenario;
    let mut pilot = Autopilot::new(script, config);
    let mut records = Vec::new();
    let mut digest = Xxh3::new();
    let mut ticks = 0;
    let mut succeeded = success(&world);
    while !succeeded && ticks < max_ticks {
        let avatar = world.avatar_view();
        let input = pilot.tick(&world, avatar, TICK_SECONDS);
        let record = TraceRecord::capture(&pilot, avatar, &input);
        digest.write_u64(record.decision_hash);
        if let Some(writer) = writer.as_mut() {
            writer.append(&record).context("Failed to append trace record")?;
        }
        records.push(record);
        world.apply_input(&input, TICK_SECONDS);
        ticks += 1;
        succeeded = success(&world);
    }

    let summary = RunSummary {
        scenario: name,
        succeeded,
        ticks,
        replan_count: pilot.state().replan_count,
        hostiles_left: world.living_hostiles(),
        decision_digest: format!("{:016x}", digest.finish()),
        final_state: pilot.diagnostics().summary(),
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary).context("Failed to encode summary")?);
    } else {
        println!("Scenario: {}", summary.scenario);
        println!("Outcome: {}", if summary.succeeded { "success" } else { "budget exhausted" });
        println!("Ticks: {}", summary.ticks);
        println!("Replans: {}", summary.replan_count);
        println!("Hostiles Left: {}", summary.hostiles_left);
        println!("Decision Digest: {}", summary.decision_digest);
        println!("Last Tick: {}", summary.final_state);
    }

    if let Some(path) = &args.verify {
        let expected = load_trace_from_file(path)
            .with_context(|| format!("Failed to load trace: {}", path.display()))?;
        match expected.first_divergence(&records) {
            None => println!("Trace matches {} ({} ticks).", path.display(), records.len()),
            Some(tick) => bail!("Decisions diverge from {} at tick {tick}", path.display()),
        }
    }

    if !succeeded {
        bail!("Scenario '{name}' did not finish within {max_ticks} ticks");
    }
    Ok(())
}
