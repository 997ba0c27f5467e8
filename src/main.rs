use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use tracing_subscriber::EnvFilter;

use chainsim::config::{OutputMode, SimulationConfig};
use chainsim::error::EngineError;
use chainsim::persistence::CheckpointStore;
use chainsim::simulation::Simulation;
use chainsim::sink::JsonlSink;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), EngineError> {
    let args: Vec<String> = std::env::args().collect();

    let mut seed_override: Option<u64> = None;
    let mut years_override: Option<u32> = None;
    let mut ticks_override: Option<u64> = None;
    let mut config_path: Option<String> = None;
    let mut output_dir = "output".to_string();
    let mut single_file = false;
    let mut resume = false;
    let mut service = false;
    let mut tick_interval_ms: u64 = 1_000;
    let mut runs: Option<u64> = None;
    let mut quiet = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" => {
                i += 1;
                seed_override = Some(args[i].parse().expect("--seed requires a u64"));
            }
            "--years" => {
                i += 1;
                years_override = Some(args[i].parse().expect("--years requires a u32"));
            }
            "--ticks" => {
                i += 1;
                ticks_override = Some(args[i].parse().expect("--ticks requires a u64"));
            }
            "--config" => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--output-dir" => {
                i += 1;
                output_dir = args[i].clone();
            }
            "--single-file" => single_file = true,
            "--resume" => resume = true,
            "--service" => service = true,
            "--tick-interval-ms" => {
                i += 1;
                tick_interval_ms = args[i].parse().expect("--tick-interval-ms requires a u64");
            }
            "--runs" => {
                i += 1;
                runs = Some(args[i].parse().expect("--runs requires a positive integer"));
            }
            "--quiet" => quiet = true,
            _ => {}
        }
        i += 1;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if quiet { "warn" } else { "info" })
        }))
        .init();

    let mut base_config = match &config_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| EngineError::persistence(format!("reading {path}"), e))?;
            serde_json::from_str::<SimulationConfig>(&text)?
        }
        None => SimulationConfig::canonical(),
    };
    if let Some(y) = years_override {
        base_config.simulation_years = y;
    }
    if single_file {
        base_config.output_mode = OutputMode::SingleFile;
    }
    let start_seed = seed_override.unwrap_or(base_config.seed);

    if let Some(n) = runs {
        use rayon::prelude::*;

        let output_dir = PathBuf::from(&output_dir);
        (0u64..n).into_par_iter().try_for_each(|offset| {
            let seed = start_seed + offset;
            let mut config = base_config.clone();
            config.seed = seed;
            let ticks = ticks_override
                .unwrap_or(config.simulation_years as u64 * 365 * 24);

            let dir = output_dir.join(format!("seed_{seed}"));
            let sink = JsonlSink::create(&dir, config.output_mode)?;
            let mut sim = Simulation::new(config, sink)?;
            sim.run(ticks)?;
            if !quiet {
                println!("Seed {seed}: {} events → {}", sim.log.len(), dir.display());
            }
            Ok::<(), EngineError>(())
        })?;
        return Ok(());
    }

    let mut config = base_config;
    config.seed = start_seed;
    let ticks = ticks_override.unwrap_or(config.simulation_years as u64 * 365 * 24);

    let store = CheckpointStore::open(PathBuf::from(&output_dir).join("checkpoints"))?;
    let sink = JsonlSink::create(&output_dir, config.output_mode)?;

    let mut sim = if resume {
        let checkpoint = store
            .load()?
            .ok_or_else(|| EngineError::Config("--resume given but no checkpoint found".into()))?;
        Simulation::resume(config, sink, checkpoint)?
    } else {
        Simulation::new(config, sink)?
    }
    .with_store(store);

    if service {
        // Runs until the process is stopped; every tick is flushed and every
        // day boundary checkpointed, so interruption loses at most one tick.
        static STOP: AtomicBool = AtomicBool::new(false);
        sim.run_service(std::time::Duration::from_millis(tick_interval_ms), &STOP)?;
    } else {
        sim.run(ticks)?;
    }

    if !quiet {
        println!("Events fired: {}", sim.log.len());
        print_event_counts(&sim);
    }
    Ok(())
}

fn print_event_counts(sim: &Simulation<JsonlSink>) {
    let mut counts: BTreeMap<&'static str, u64> = BTreeMap::new();
    for record in &sim.log {
        *counts.entry(record.event.type_name()).or_insert(0) += 1;
    }
    println!("\n=== Event counts ===");
    for (name, count) in counts {
        println!("  {name:<30} {count}");
    }
}
