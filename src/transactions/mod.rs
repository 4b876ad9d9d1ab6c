pub mod transaction;

pub use transaction::{InvalidRequest, RejectReason, TransferOutcome, TransferRequest};
