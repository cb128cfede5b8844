//! Background task support: progress channel, cooperative cancellation,
//! and the single-in-flight simulation session.
//!
//! Both long-running computations (mutual-inductance precomputation and the
//! transient integration) run as one cancellable task each, publishing
//! progress over a channel and a terminal result through the join handle,
//! independent of any coordinating thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, Sender};
use log::info;

use crate::connect::{resolve_connections, Connection};
use crate::error::{Result, SurgeError};
use crate::model::{validate_winding, Section, Winding};
use crate::mutuals::{precompute_mutual_couplings, MutualReport};
use crate::solver::{build_network, SimulationResult, TimeStepPhase, TransientIntegrator};
use crate::source::Source;

/// A fractional progress report from a running task.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub label: &'static str,
}

/// Where progress reports go. A disabled sink drops them; a channel sink
/// forwards them without blocking the task (a gone receiver is ignored).
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<Sender<ProgressUpdate>>,
}

impl ProgressSink {
    /// A sink that discards every report.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A sink backed by an unbounded channel, plus its receiving end.
    pub fn channel() -> (Self, Receiver<ProgressUpdate>) {
        let (tx, rx) = unbounded();
        (Self { tx: Some(tx) }, rx)
    }

    /// Publish a progress update.
    pub fn report(&self, current: f64, min: f64, max: f64, label: &'static str) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(ProgressUpdate {
                current,
                min,
                max,
                label,
            });
        }
    }
}

/// Cooperative cancellation flag, checked at each outer loop iteration of
/// the running task.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The task returns [`SurgeError::Cancelled`] at
    /// its next check.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Everything a simulation run needs besides the winding itself.
#[derive(Debug, Clone)]
pub struct SimulationJob {
    pub connections: Vec<Connection>,
    pub source: Source,
    pub phases: Vec<TimeStepPhase>,
}

/// Owns a winding model and enforces one assembly/simulation in flight at a
/// time.
///
/// The winding is read-only during a run; the only mutation is the
/// precomputation commit, which happens inside the guarded region.
pub struct Session {
    winding: Winding,
    in_flight: Arc<AtomicBool>,
}

/// Releases the in-flight flag when the guarded call returns.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Session {
    pub fn new(winding: Winding) -> Self {
        Self {
            winding,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn winding(&self) -> &Winding {
        &self.winding
    }

    fn acquire(&self) -> Result<InFlightGuard> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(SurgeError::SessionBusy);
        }
        Ok(InFlightGuard(Arc::clone(&self.in_flight)))
    }

    /// Run the mutual-inductance precomputation on its own.
    pub fn precompute_mutuals<F>(
        &mut self,
        pair_inductance: F,
        sink: &ProgressSink,
        cancel: &CancelToken,
    ) -> Result<MutualReport>
    where
        F: Fn(&Section, &Section) -> f64 + Sync,
    {
        let _guard = self.acquire()?;
        precompute_mutual_couplings(&mut self.winding, pair_inductance, sink, cancel)
    }

    /// Run the full pipeline: precompute mutual couplings, validate, build
    /// the network matrices, resolve connections, and integrate.
    ///
    /// The two long-running stages execute sequentially; the precomputation
    /// must finish before the matrix builder runs.
    pub fn run<F>(
        &mut self,
        job: &SimulationJob,
        pair_inductance: F,
        sink: &ProgressSink,
        cancel: &CancelToken,
    ) -> Result<SimulationResult>
    where
        F: Fn(&Section, &Section) -> f64 + Sync,
    {
        let _guard = self.acquire()?;

        let report =
            precompute_mutual_couplings(&mut self.winding, pair_inductance, sink, cancel)?;
        let range_warnings = validate_winding(&self.winding)?;
        info!(
            "precomputed {} mutual pairs ({} skipped, {} warnings)",
            report.pairs_computed,
            report.pairs_skipped,
            report.warnings.len() + range_warnings.len()
        );

        let matrices = build_network(&self.winding);
        let resolved = resolve_connections(&job.connections, self.winding.node_count())?;
        let integrator = TransientIntegrator::new(&matrices, &resolved)?;
        integrator.run(&job.source, &job.phases, sink, cancel)
    }
}

/// Handle to a simulation running on a background thread.
pub struct BackgroundRun {
    /// Cancels the run cooperatively.
    pub cancel: CancelToken,
    /// Progress updates published by the worker.
    pub progress: Receiver<ProgressUpdate>,
    /// Joins to the session and its terminal result.
    pub handle: JoinHandle<(Session, Result<SimulationResult>)>,
}

/// Move a session onto a worker thread and run the full pipeline there.
///
/// The session comes back through the join handle together with the
/// terminal result, so it can serve further runs afterwards.
pub fn spawn_simulation<F>(
    mut session: Session,
    job: SimulationJob,
    pair_inductance: F,
) -> BackgroundRun
where
    F: Fn(&Section, &Section) -> f64 + Send + Sync + 'static,
{
    let cancel = CancelToken::new();
    let (sink, progress) = ProgressSink::channel();
    let worker_cancel = cancel.clone();
    let handle = thread::spawn(move || {
        let result = session.run(&job, pair_inductance, &sink, &worker_cancel);
        (session, result)
    });
    BackgroundRun {
        cancel,
        progress,
        handle,
    }
}
