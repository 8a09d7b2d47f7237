//! defi-engine CLI
//!
//! Replay trading scenarios against a fresh engine from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Run a scenario from a JSON file
//! defi-engine run --input scenario.json
//!
//! # Output the report as JSON
//! defi-engine run --input scenario.json --format json
//!
//! # Quote a swap without touching an engine
//! defi-engine quote --amount-in 100 --reserve-in 1000 --reserve-out 1000 --fee-bps 30
//!
//! # Generate a random scenario for testing
//! defi-engine generate --accounts 10 --ops 200 --seed 42
//! ```

use defi_engine::amm::pool::quote_out;
use defi_engine::engine::{DefiEngine, EngineConfig};
use defi_engine::simulation::{generate_random_scenario, run_scenario, Scenario, ScenarioConfig};
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"defi-engine — ledger-resident AMM, farming, flash-loan and bridge engine

USAGE:
    defi-engine <COMMAND> [OPTIONS]

COMMANDS:
    run         Replay a scenario file against a fresh engine
    quote       Compute a constant-product swap quote
    generate    Generate a random scenario (for testing)
    help        Show this message

OPTIONS (run):
    --input <FILE>      Path to JSON scenario file
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (quote):
    --amount-in <N>     Input amount
    --reserve-in <N>    Reserve of the input token
    --reserve-out <N>   Reserve of the output token
    --fee-bps <N>       Fee in basis points (default: 30)

OPTIONS (generate):
    --accounts <N>      Number of trading accounts (default: 10)
    --ops <N>           Number of operations (default: 200)
    --seed <N>          Fixed RNG seed for reproducible output
    --output <FILE>     Write to file instead of stdout

EXAMPLES:
    defi-engine run --input scenario.json
    defi-engine run --input scenario.json --format json
    defi-engine quote --amount-in 100 --reserve-in 1000 --reserve-out 1000 --fee-bps 30
    defi-engine generate --accounts 20 --ops 500 --seed 42 --output scenario.json"#
    );
}

fn load_scenario(path: &str) -> Scenario {
    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path, e);
        process::exit(1);
    });

    serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Generate a valid scenario with: defi-engine generate --output {}", path);
        process::exit(1);
    })
}

fn cmd_run(args: &[String]) {
    let mut input_path = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--input requires a file path");
                    process::exit(1);
                }));
            }
            "--format" => {
                i += 1;
                format = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--format requires 'text' or 'json'");
                    process::exit(1);
                });
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });

    let scenario = load_scenario(&path);
    let mut engine = DefiEngine::new(EngineConfig::default());
    let report = run_scenario(&mut engine, &scenario).unwrap_or_else(|e| {
        eprintln!("Scenario setup failed: {}", e);
        process::exit(1);
    });

    if format == "json" {
        #[derive(serde::Serialize)]
        struct RunOutput<'a> {
            report: &'a defi_engine::simulation::ScenarioReport,
            events: &'a [defi_engine::core::event::EventRecord],
        }
        let output = RunOutput {
            report: &report,
            events: engine.events(),
        };
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing report: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("Scenario: {}", path);
        println!("  Pools created:        {}", report.pools_created);
        println!("  Operations applied:   {}", report.operations_applied);
        println!("  Operations rejected:  {}", report.operations_rejected);
        println!("  Events emitted:       {}", report.events_emitted);
        println!(
            "  Invariants:           {}",
            if report.invariants_hold { "OK" } else { "VIOLATED" }
        );
        if !report.invariants_hold {
            process::exit(2);
        }
    }
}

fn cmd_quote(args: &[String]) {
    let mut amount_in: Option<u128> = None;
    let mut reserve_in: Option<u128> = None;
    let mut reserve_out: Option<u128> = None;
    let mut fee_bps = 30u32;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--amount-in" => {
                i += 1;
                amount_in = args.get(i).and_then(|s| s.parse().ok());
            }
            "--reserve-in" => {
                i += 1;
                reserve_in = args.get(i).and_then(|s| s.parse().ok());
            }
            "--reserve-out" => {
                i += 1;
                reserve_out = args.get(i).and_then(|s| s.parse().ok());
            }
            "--fee-bps" => {
                i += 1;
                fee_bps = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--fee-bps requires a number");
                    process::exit(1);
                });
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let (amount_in, reserve_in, reserve_out) = match (amount_in, reserve_in, reserve_out) {
        (Some(a), Some(ri), Some(ro)) => (a, ri, ro),
        _ => {
            eprintln!("Error: --amount-in, --reserve-in and --reserve-out are required");
            process::exit(1);
        }
    };

    match quote_out(amount_in, reserve_in, reserve_out, fee_bps) {
        Ok(out) => {
            println!("amount_out: {}", out);
            println!(
                "effective price: {:.6}",
                out as f64 / amount_in.max(1) as f64
            );
        }
        Err(e) => {
            eprintln!("Quote failed: {}", e);
            process::exit(1);
        }
    }
}

fn cmd_generate(args: &[String]) {
    let mut config = ScenarioConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--accounts" => {
                i += 1;
                config.account_count =
                    args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                        eprintln!("--accounts requires a number");
                        process::exit(1);
                    });
            }
            "--ops" => {
                i += 1;
                config.op_count =
                    args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                        eprintln!("--ops requires a number");
                        process::exit(1);
                    });
            }
            "--seed" => {
                i += 1;
                config.seed = Some(args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(
                    || {
                        eprintln!("--seed requires a number");
                        process::exit(1);
                    },
                ));
            }
            "--output" => {
                i += 1;
                output_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--output requires a file path");
                    process::exit(1);
                }));
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let scenario = generate_random_scenario(&config);
    let json = match serde_json::to_string_pretty(&scenario) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing scenario: {}", e);
            process::exit(1);
        }
    };

    if let Some(path) = output_path {
        fs::write(&path, &json).unwrap_or_else(|e| {
            eprintln!("Error writing to '{}': {}", path, e);
            process::exit(1);
        });
        eprintln!(
            "Generated {} operations across {} accounts → {}",
            scenario.operations.len(),
            scenario.accounts.len(),
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "run" => cmd_run(rest),
        "quote" => cmd_quote(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
