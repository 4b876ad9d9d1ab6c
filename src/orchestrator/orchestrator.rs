use std::error::Error;
use std::fs::File;
use std::io;
use std::sync::Arc;

use log::info;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::accounts::Ledger;
use crate::engine::{StatsSnapshot, TransferEngine};
use crate::orchestrator::config::{ConfigError, SimulationConfig};
use crate::orchestrator::harness::{HarnessError, HarnessReport, WorkerHarness};
use crate::orchestrator::policy::RandomPolicy;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Harness(#[from] HarnessError),
}

/// Totals and counters of a finished run.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub initial_total: Decimal,
    pub final_total: Decimal,
    pub stats: StatsSnapshot,
    pub workers: HarnessReport,
}

impl SimulationReport {
    pub fn is_conserved(&self) -> bool {
        self.initial_total == self.final_total
    }
}

/// Drive `config.workers` random workers against `ledger` until they finish.
pub fn run(config: &SimulationConfig, ledger: Arc<Ledger>) -> Result<SimulationReport, SimulationError> {
    config.validate()?;

    let policies = (0..config.workers)
        .map(|worker| RandomPolicy::from_config(config, worker))
        .collect::<Result<Vec<_>, _>>()?;

    let initial_total = ledger.total_balance();
    let engine = Arc::new(TransferEngine::new(Arc::clone(&ledger)));

    info!(
        "running {} workers x {} transfers over {} accounts (total {})",
        config.workers,
        config.transfers_per_worker,
        ledger.len(),
        initial_total
    );

    let workers = WorkerHarness::spawn(Arc::clone(&engine), config.transfers_per_worker, policies)?.join()?;

    let report = SimulationReport {
        initial_total,
        final_total: ledger.total_balance(),
        stats: engine.stats(),
        workers,
    };

    info!(
        "finished: {} committed, {} rejected, final total {}",
        report.stats.committed,
        report.stats.rejected(),
        report.final_total
    );
    Ok(report)
}

/// Seed a ledger (from an `account,balance` CSV file when given), run the
/// simulation and print the final balances as CSV to stdout.
pub fn run_and_report(config: &SimulationConfig, accounts_csv: Option<&str>) -> Result<(), Box<dyn Error>> {
    let ledger = match accounts_csv {
        Some(path) => Ledger::from_csv_reader(File::open(path)?)?,
        None => Ledger::with_uniform_balance(config.accounts, config.initial_balance)?,
    };
    let ledger = Arc::new(ledger);

    let report = run(config, Arc::clone(&ledger))?;
    ledger.write_balances(io::stdout())?;

    if !report.is_conserved() {
        return Err(format!(
            "funds not conserved: started with {}, ended with {}",
            report.initial_total, report.final_total
        )
        .into());
    }
    Ok(())
}
