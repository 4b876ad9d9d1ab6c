use::std::env;
use::std::process;

use bank_transfer_engine::{run_and_report, SimulationConfig};
use log::info;

fn main() {
    // Optional single argument: a CSV file of `account,balance` rows to seed the ledger
    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        eprintln!("Usage: {} [accounts.csv]", args[0]);
        process::exit(1);
    }
    let accounts_csv = args.get(1).map(String::as_str);
    // Initialize logger (respect RUST_LOG env var if set)
    env_logger::init();

    let config = SimulationConfig::default();
    match accounts_csv {
        Some(path) => info!("starting transfer simulation with ledger file: {}", path),
        None => info!(
            "starting transfer simulation with {} accounts of {}",
            config.accounts, config.initial_balance
        ),
    }

    if let Err(e) = run_and_report(&config, accounts_csv) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
