use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info};
use thiserror::Error;

use crate::engine::TransferEngine;
use crate::orchestrator::policy::SelectionPolicy;
use crate::transactions::TransferOutcome;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
}

/// Cooperative stop signal shared by the harness and its workers.
///
/// Workers check it between iterations, and a pending delay ends early
/// once it fires.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl CancelToken {
    pub fn cancel(&self) {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `delay` or until cancelled. Returns whether cancellation
    /// was requested.
    pub fn sleep(&self, delay: Duration) -> bool {
        let cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (cancelled, _) = self
            .inner
            .wake
            .wait_timeout_while(cancelled, delay, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled
    }
}

/// What one worker did before it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: usize,
    pub completed: usize,
    pub committed: usize,
    pub rejected: usize,
    pub cancelled: bool,
}

impl WorkerReport {
    fn new(worker: usize) -> Self {
        Self {
            worker,
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: &TransferOutcome) {
        self.completed += 1;
        match outcome {
            TransferOutcome::Committed => self.committed += 1,
            TransferOutcome::Rejected(_) => self.rejected += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarnessReport {
    pub workers: Vec<WorkerReport>,
}

impl HarnessReport {
    pub fn completed(&self) -> usize {
        self.workers.iter().map(|w| w.completed).sum()
    }

    pub fn committed(&self) -> usize {
        self.workers.iter().map(|w| w.committed).sum()
    }

    pub fn rejected(&self) -> usize {
        self.workers.iter().map(|w| w.rejected).sum()
    }

    pub fn cancelled(&self) -> bool {
        self.workers.iter().any(|w| w.cancelled)
    }
}

/// Owns a set of worker threads issuing transfers against one engine.
pub struct WorkerHarness {
    handles: Vec<JoinHandle<WorkerReport>>,
    cancel: CancelToken,
}

impl WorkerHarness {
    /// Start one thread per policy, each issuing up to
    /// `transfers_per_worker` transfers.
    pub fn spawn<P>(
        engine: Arc<TransferEngine>,
        transfers_per_worker: usize,
        policies: impl IntoIterator<Item = P>,
    ) -> Result<Self, HarnessError>
    where
        P: SelectionPolicy + 'static,
    {
        let mut harness = Self {
            handles: Vec::new(),
            cancel: CancelToken::default(),
        };

        for (worker, mut policy) in policies.into_iter().enumerate() {
            let engine = Arc::clone(&engine);
            let cancel = harness.cancel.clone();
            let spawned = thread::Builder::new()
                .name(format!("transfer-worker-{worker}"))
                .spawn(move || work(worker, &engine, &mut policy, transfers_per_worker, &cancel));

            match spawned {
                Ok(handle) => harness.handles.push(handle),
                Err(source) => {
                    error!("failed to spawn worker {}: {}", worker, source);
                    harness.cancel();
                    // Workers already running are stopped and reaped; the
                    // spawn failure is what the caller needs to see.
                    let _ = harness.join();
                    return Err(HarnessError::Spawn { worker, source });
                }
            }
        }

        info!("started {} transfer workers", harness.handles.len());
        Ok(harness)
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Handle for stopping the workers from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Ask every worker to stop after its current transfer.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for every worker. Balances can be read without further
    /// synchronization once this returns.
    ///
    /// All workers are joined even if one panicked; the first panic is
    /// then reported.
    pub fn join(self) -> Result<HarnessReport, HarnessError> {
        let mut report = HarnessReport::default();
        let mut panicked = None;

        for (worker, handle) in self.handles.into_iter().enumerate() {
            match handle.join() {
                Ok(worker_report) => report.workers.push(worker_report),
                Err(_) => {
                    error!("worker {} panicked", worker);
                    panicked.get_or_insert(worker);
                }
            }
        }

        match panicked {
            Some(worker) => Err(HarnessError::WorkerPanicked(worker)),
            None => Ok(report),
        }
    }
}

/// Spawn `worker_count` workers and block until all of them are done.
pub fn run_workers<P, F>(
    engine: Arc<TransferEngine>,
    worker_count: usize,
    transfers_per_worker: usize,
    make_policy: F,
) -> Result<HarnessReport, HarnessError>
where
    P: SelectionPolicy + 'static,
    F: FnMut(usize) -> P,
{
    WorkerHarness::spawn(engine, transfers_per_worker, (0..worker_count).map(make_policy))?.join()
}

fn work<P: SelectionPolicy>(
    worker: usize,
    engine: &TransferEngine,
    policy: &mut P,
    transfers: usize,
    cancel: &CancelToken,
) -> WorkerReport {
    let mut report = WorkerReport::new(worker);
    let ledger_len = engine.ledger().len();

    for _ in 0..transfers {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let Some(request) = policy.next_request(ledger_len) else {
            break;
        };

        let outcome = engine.execute(&request);
        report.record(&outcome);

        let delay = policy.pause();
        if !delay.is_zero() && cancel.sleep(delay) {
            report.cancelled = true;
            break;
        }
    }

    debug!(
        "worker {} finished: {} transfers, {} committed, {} rejected{}",
        worker,
        report.completed,
        report.committed,
        report.rejected,
        if report.cancelled { " (cancelled)" } else { "" }
    );
    report
}
