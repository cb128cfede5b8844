//! Network matrix assembly and transient integration.
//!
//! This module provides the numerical engine of the crate.
//!
//! ## Formulation
//!
//! The winding network is described by five matrices built in one sweep
//! over the model:
//!
//! ```text
//! M · dI/dt = B·V - R·I      (branch equations)
//! C · dV/dt = A·I            (node equations, constraints folded into C)
//! ```
//!
//! where:
//! - M is the (symmetric) inductance matrix, R the diagonal resistance
//! - C is the node-to-node capacitance matrix
//! - A maps branch currents to node injections, B maps node voltages to
//!   branch drops
//! - I is the vector of branch currents, V the vector of node voltages
//!
//! Each fixed time step advances V and then I with fourth-order
//! Runge-Kutta, snapshotting state on the save cadence.

mod build;
mod integrate;
mod matrix;

pub use build::{build_network, NetworkMatrices};
pub use integrate::{SimulationResult, TimeStepPhase, TransientIntegrator};
pub use matrix::{LuFactors, Matrix};
