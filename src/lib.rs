pub mod orchestrator;
pub mod engine;
pub mod accounts;
pub mod transactions;

pub use orchestrator::{run, run_and_report, run_workers, SimulationConfig, WorkerHarness};
pub use engine::TransferEngine;
pub use transactions::{TransferOutcome, TransferRequest};
pub use accounts::{Account, Ledger};
