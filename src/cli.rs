use std::fs;

use crate::combat::rng::entropy_seed;
use crate::combat::AttackSetup;
use crate::config::AppConfig;
use crate::exact::{DiceModel, ExactEngine};
use crate::parallel::{run_sharded, WorkerPool};
use crate::server;
use crate::worker::{ExactResponse, SimulationResponse};

const USAGE: &str = "usage: attack-odds <serve|simulate <setup.json> [iters] [seed]|exact <n> <s> <mod> [numAttacks] [pHit]> [--table]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Simulate,
    Exact,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("serve") => Some(Command::Serve),
        Some("simulate") => Some(Command::Simulate),
        Some("exact") => Some(Command::Exact),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    run_with_config(args, AppConfig::from_env())
}

pub fn run_with_config(args: &[String], config: AppConfig) -> i32 {
    let as_table = args.iter().any(|arg| arg == "--table");
    let positional: Vec<String> = args
        .iter()
        .filter(|arg| !arg.starts_with("--"))
        .cloned()
        .collect();

    match parse_command(&positional) {
        Some(Command::Serve) => handle_serve(config),
        Some(Command::Simulate) => handle_simulate(&positional, &config, as_table),
        Some(Command::Exact) => handle_exact(&positional, as_table),
        None => {
            eprintln!("{USAGE}");
            2
        }
    }
}

fn handle_serve(config: AppConfig) -> i32 {
    match server::run_server(config) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

fn handle_simulate(args: &[String], config: &AppConfig, as_table: bool) -> i32 {
    let Some(path) = args.get(2) else {
        eprintln!("usage: attack-odds simulate <setup.json> [iters] [seed]");
        return 2;
    };
    let setup: AttackSetup = match fs::read_to_string(path)
        .map_err(|err| err.to_string())
        .and_then(|raw| serde_json::from_str(&raw).map_err(|err| err.to_string()))
    {
        Ok(setup) => setup,
        Err(err) => {
            eprintln!("failed to read setup '{path}': {err}");
            return 1;
        }
    };

    let iterations = parse_u64_arg(args.get(3), "iters", config.default_iterations)
        .clamp(1, config.max_iterations);
    let seed = match args.get(4) {
        Some(_) => parse_u64_arg(args.get(4), "seed", 7),
        None => config.seed.unwrap_or_else(entropy_seed),
    };
    let pool = WorkerPool::with_workers(config.workers);
    tracing::info!(iterations, seed, workers = pool.effective_workers(), "running simulation");

    let histogram = match run_sharded(&setup, iterations, seed, pool.effective_workers(), &pool) {
        Ok(histogram) => histogram,
        Err(err) => {
            eprintln!("simulation failed: {err}");
            return 1;
        }
    };

    if as_table {
        println!("damage\tcount\tprobability\tcost_total\tatks");
        let trials = histogram.num_trials().max(1) as f64;
        for (damage, bucket) in histogram.sorted_buckets() {
            println!(
                "{}\t{}\t{:.6}\t{}\t{}",
                damage,
                bucket.count,
                bucket.count as f64 / trials,
                bucket.cost_total,
                bucket.attack_count_total
            );
        }
        0
    } else {
        print_json(&SimulationResponse::from_histogram(0, &histogram))
    }
}

fn handle_exact(args: &[String], as_table: bool) -> i32 {
    let (Some(n), Some(s), Some(modifier)) = (
        parse_i64(args.get(2)),
        parse_i64(args.get(3)),
        parse_i64(args.get(4)),
    ) else {
        eprintln!("usage: attack-odds exact <n> <s> <mod> [numAttacks] [pHit]");
        return 2;
    };
    let num_attacks = parse_u64_arg(args.get(5), "numAttacks", 1) as i64;
    let p_hit = parse_f64_arg(args.get(6), "pHit", 1.0);

    let model = match DiceModel::new(n, s, modifier) {
        Ok(model) => model,
        Err(err) => {
            eprintln!("invalid dice: {err}");
            return 1;
        }
    };
    let distribution = match ExactEngine::new().total_damage(&model, num_attacks, p_hit) {
        Ok(distribution) => distribution,
        Err(err) => {
            eprintln!("exact computation failed: {err}");
            return 1;
        }
    };

    if as_table {
        println!("damage\tprobability");
        for (damage, p) in distribution.iter() {
            println!("{damage}\t{p:.9}");
        }
        0
    } else {
        print_json(&ExactResponse::from_distribution(0, p_hit, &distribution, None))
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize result: {err}");
            1
        }
    }
}

fn parse_i64(raw: Option<&String>) -> Option<i64> {
    raw.and_then(|value| value.parse::<i64>().ok())
}

fn parse_u64_arg(raw: Option<&String>, name: &str, default: u64) -> u64 {
    raw.and_then(|value| value.parse::<u64>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}

fn parse_f64_arg(raw: Option<&String>, name: &str, default: f64) -> f64 {
    raw.and_then(|value| value.parse::<f64>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}
