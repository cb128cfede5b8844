//! Error types for the Surgesim transient core.
//!
//! This module provides a unified fatal error type [`SurgeError`] covering
//! connection resolution, matrix assembly, and transient integration, plus
//! the non-fatal [`AssemblyWarning`] type for conditions that are reported
//! and counted but do not abort a run.

use thiserror::Error;

use crate::model::NodeId;

/// Result type alias using [`SurgeError`].
pub type Result<T> = std::result::Result<T, SurgeError>;

/// Unified fatal error type for all Surgesim operations.
#[derive(Error, Debug)]
pub enum SurgeError {
    // ============ Model Construction Errors ============
    /// The winding model violates a structural invariant.
    #[error("Invalid winding model: {message}")]
    InvalidModel { message: String },

    // ============ Connection Resolution Errors ============
    /// No node reaches the generator sentinel; the model has no path to
    /// the excitation source.
    #[error("No connection to the generator - the winding has no excitation path")]
    NoGeneratorConnection,

    /// A connection ties two non-grounded terminals, which this version
    /// does not support.
    #[error("Unsupported connection {from} -> {to}: only ground and generator ties are supported")]
    UnsupportedConnection { from: NodeId, to: NodeId },

    // ============ Simulation Errors ============
    /// A linear solve failed at simulation time. The run aborts with no
    /// partial result; the caller must fix the model (e.g. add a missing
    /// ground or shunt path).
    #[error("Singular {matrix} matrix - a node may lack any capacitive or inductive path")]
    SingularSystem { matrix: &'static str },

    /// An invalid time-step phase or simulation parameter.
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ I/O Errors ============
    /// Error writing simulation output.
    #[error("Failed to write output: {source}")]
    OutputError {
        #[from]
        source: std::io::Error,
    },

    // ============ Task Errors ============
    /// Cooperative cancellation was observed. Distinguished from both
    /// success and failure; no partial state is left behind.
    #[error("Cancelled")]
    Cancelled,

    /// A second assembly or simulation request was submitted while one was
    /// already in flight for the same session.
    #[error("A simulation is already in flight for this session")]
    SessionBusy,
}

impl SurgeError {
    /// Create an invalid-model error.
    pub fn invalid_model(message: impl Into<String>) -> Self {
        Self::InvalidModel {
            message: message.into(),
        }
    }

    /// Create an invalid-simulation-parameter error.
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidSimulationParam {
            message: message.into(),
        }
    }
}

/// Non-fatal conditions surfaced during precomputation and assembly.
///
/// Warnings are logged, counted, and returned alongside a best-effort
/// result; they never abort the operation that produced them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyWarning {
    /// A mutual or shunt entry names a section not present in the model.
    /// The entry is skipped; assembly continues.
    #[error("Section '{section}' references unknown section '{reference}'")]
    DanglingReference { section: String, reference: String },

    /// A derived coupling coefficient exceeds 1 in magnitude, indicating a
    /// modeling error. The value is used as-is, never clamped, to avoid
    /// masking bad input data.
    #[error("Coupling coefficient {coefficient} between '{a}' and '{b}' exceeds 1 in magnitude")]
    CouplingOutOfRange {
        a: String,
        b: String,
        coefficient: f64,
    },
}
