//! Mutual-inductance precomputation.
//!
//! For every unordered pair of sections on coils of the same phase, the
//! caller-supplied pair function yields the mutual inductance (the physical
//! formula itself is external to this core). The sweep derives the coupling
//! coefficient for each pair, checks its physical range, and commits the
//! results to the winding as one transaction.
//!
//! The sweep is embarrassingly parallel over pairs and dominates wall-clock
//! time for large models, so pairs are evaluated on the rayon pool.
//! Cancellation is cooperative, observed per pair; a cancelled sweep leaves
//! the winding's coupling maps exactly as they were.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::warn;
use rayon::prelude::*;

use crate::error::{AssemblyWarning, Result, SurgeError};
use crate::model::{Section, SectionId, Winding};
use crate::task::{CancelToken, ProgressSink};

/// Outcome of a completed precomputation sweep.
#[derive(Debug, Clone)]
pub struct MutualReport {
    /// Pairs whose mutual inductance was computed and committed.
    pub pairs_computed: usize,
    /// Pairs skipped: different phases or zero coupling.
    pub pairs_skipped: usize,
    /// Out-of-range coupling coefficients (logged, values kept as-is).
    pub warnings: Vec<AssemblyWarning>,
}

/// Compute and commit mutual couplings for all same-phase section pairs.
///
/// `pair_inductance` must be a pure function of the two sections. Zero
/// results are skipped. A coupling coefficient above 1 in magnitude is a
/// modeling error: it is reported as a warning and the computed value is
/// used as-is, never clamped.
pub fn precompute_mutual_couplings<F>(
    winding: &mut Winding,
    pair_inductance: F,
    sink: &ProgressSink,
    cancel: &CancelToken,
) -> Result<MutualReport>
where
    F: Fn(&Section, &Section) -> f64 + Sync,
{
    let count = winding.section_count();
    let mut pairs = Vec::new();
    for i in 0..count {
        for j in (i + 1)..count {
            pairs.push((SectionId(i), SectionId(j)));
        }
    }
    let total = pairs.len();
    sink.report(0.0, 0.0, total as f64, "mutual inductance");

    let done = AtomicUsize::new(0);
    // Report at most ~100 updates regardless of model size.
    let stride = (total / 100).max(1);

    // Scratch results; committed to the winding only after the whole sweep
    // succeeds, so cancellation leaves no partial writes.
    let computed: Vec<Option<(SectionId, SectionId, f64, f64)>> = pairs
        .par_iter()
        .map(|&(a, b)| {
            if cancel.is_cancelled() {
                return Err(SurgeError::Cancelled);
            }
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            if finished % stride == 0 {
                sink.report(finished as f64, 0.0, total as f64, "mutual inductance");
            }

            let sa = winding.section(a);
            let sb = winding.section(b);
            if winding.phase_of(a) != winding.phase_of(b) {
                return Ok(None);
            }
            let inductance = pair_inductance(sa, sb);
            if inductance == 0.0 {
                return Ok(None);
            }
            let coefficient = inductance / (sa.inductance * sb.inductance).sqrt();
            Ok(Some((a, b, inductance, coefficient)))
        })
        .collect::<Result<_>>()?;

    let mut report = MutualReport {
        pairs_computed: 0,
        pairs_skipped: 0,
        warnings: Vec::new(),
    };
    let mut commits = Vec::new();
    for entry in computed {
        match entry {
            Some((a, b, inductance, coefficient)) => {
                if coefficient.abs() > 1.0 {
                    let warning = AssemblyWarning::CouplingOutOfRange {
                        a: winding.section(a).name.clone(),
                        b: winding.section(b).name.clone(),
                        coefficient,
                    };
                    warn!("{warning}");
                    report.warnings.push(warning);
                }
                commits.push((a, b, inductance, coefficient));
                report.pairs_computed += 1;
            }
            None => report.pairs_skipped += 1,
        }
    }

    winding.commit_mutuals(&commits);
    sink.report(total as f64, 0.0, total as f64, "mutual inductance");
    Ok(report)
}
