pub mod engine;

pub use engine::{StatsSnapshot, TransferEngine, TransferStats};
