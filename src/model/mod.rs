//! Winding model representation and validation.
//!
//! This module provides the in-memory representation of a transformer
//! winding: an arena of [`Section`] records grouped into [`Coil`]s, with
//! cross-references resolved to integer indices at build time.

mod section;
mod types;
mod validate;
mod winding;

pub use section::{MutualCoupling, Section, ShuntCapacitance, ShuntPartner};
pub use types::*;
pub use validate::validate_winding;
pub use winding::{Coil, MutualSpec, SectionSpec, ShuntSpec, Winding, WindingBuilder};
