pub mod config;
pub mod harness;
pub mod orchestrator;
pub mod policy;

pub use config::{ConfigError, SimulationConfig};
pub use harness::{
    run_workers, CancelToken, HarnessError, HarnessReport, WorkerHarness, WorkerReport,
};
pub use orchestrator::{run, run_and_report, SimulationError, SimulationReport};
pub use policy::{RandomPolicy, ScriptedPolicy, SelectionPolicy};
