//! # Surgesim
//!
//! A lightning-impulse transient simulator for transformer windings.
//!
//! This library provides:
//! - An in-memory winding model: disks (sections) with self-inductance,
//!   resistance, series capacitance, and mutual/shunt coupling maps
//! - Resolution of external terminal connections (generator, ground)
//! - Assembly of the coupled network matrices M, R, C, A, B
//! - A fixed-step fourth-order Runge-Kutta transient integrator with
//!   periodic state snapshotting
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`model`] - Winding model representation and validation
//! - [`connect`] - Terminal connections and their resolution
//! - [`mutuals`] - Parallel mutual-inductance precomputation
//! - [`solver`] - Matrix assembly and the transient integrator
//! - [`source`] - Impulse source waveforms
//! - [`task`] - Progress reporting, cancellation, and session orchestration
//!
//! ## Simulation Method
//!
//! The winding is a lumped-element network: each disk contributes one
//! branch (self-inductance plus series resistance) and capacitances between
//! nodes and to ground. For each fixed time step h:
//!
//! 1. Solve `C · dV/dt = A·I` for the node-voltage rates, with terminal
//!    constraints folded into a private copy of C and the source waveform
//!    derivative injected at the source node
//! 2. Advance V with a Runge-Kutta step, then solve `M · dI/dt = B·V - R·I`
//!    and advance I against the committed voltages
//!
//! The two long-running stages (mutual-inductance precomputation and the
//! integration itself) report progress over a channel and honor cooperative
//! cancellation, so they can run off any coordinating thread.

pub mod connect;
pub mod error;
pub mod model;
pub mod mutuals;
pub mod solver;
pub mod source;
pub mod task;

// Re-export main types for convenience
pub use connect::{resolve_connections, Connection, ResolvedConnections};
pub use error::{Result, SurgeError};
pub use model::{Winding, WindingBuilder};
pub use solver::{build_network, SimulationResult, TimeStepPhase, TransientIntegrator};
pub use source::Source;
pub use task::{CancelToken, ProgressSink, Session, SimulationJob};

/// Nominal front time of the standard lightning impulse, in seconds.
pub const STANDARD_FRONT_TIME: f64 = 1.2e-6;

/// Nominal time to half-value of the standard lightning impulse, in seconds.
pub const STANDARD_TAIL_TIME: f64 = 50e-6;
