//! Winding sections (disks) and their coupling records.

use super::types::{NodeId, SectionId};

/// A mutual-inductance entry between two sections.
///
/// Stored on both partners with identical values; the matrix builder writes
/// the upper triangle once and relies on consumers treating the inductance
/// matrix as symmetric.
#[derive(Debug, Clone, PartialEq)]
pub struct MutualCoupling {
    /// The coupled section.
    pub other: SectionId,
    /// Mutual inductance in henries.
    pub inductance: f64,
    /// Coupling coefficient, mutual inductance normalized by the geometric
    /// mean of the two self-inductances. Physically bounded to [-1, 1];
    /// out-of-range values are reported as warnings and used as-is.
    pub coefficient: f64,
}

/// The far side of a shunt capacitance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuntPartner {
    /// Another section of the winding.
    Section(SectionId),
    /// The earth reference. Ground is not a matrix row, so ground shunts
    /// contribute diagonal terms only.
    Ground,
}

/// A shunt-capacitance entry from a section to a partner.
///
/// The capacitance is distributed half-and-half to the section's two
/// boundary nodes during matrix assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct ShuntCapacitance {
    pub partner: ShuntPartner,
    /// Capacitance in farads.
    pub capacitance: f64,
}

/// One lumped winding element (a disk): self-inductance, resistance, series
/// capacitance, and in/out node.
///
/// Sections are immutable once the winding is built; only the
/// mutual-inductance precomputation commits new coupling entries, and only
/// as a whole-sweep transaction.
#[derive(Debug, Clone)]
pub struct Section {
    /// Serial index; equals the section's position in the winding arena.
    pub id: SectionId,
    /// Unique identifier within the winding.
    pub name: String,
    /// Node where the section begins.
    pub node_in: NodeId,
    /// Node where the section ends.
    pub node_out: NodeId,
    /// Self-inductance in henries. Always positive.
    pub inductance: f64,
    /// Series resistance in ohms.
    pub resistance: f64,
    /// Series (turn-to-turn) capacitance in farads, between the section's
    /// in- and out-node.
    pub series_capacitance: f64,
    /// Mutual-inductance couplings to other sections.
    pub mutuals: Vec<MutualCoupling>,
    /// Shunt capacitances to other sections or to ground.
    pub shunts: Vec<ShuntCapacitance>,
}

impl Section {
    /// Look up this section's recorded mutual inductance to `other`.
    pub fn mutual_to(&self, other: SectionId) -> Option<&MutualCoupling> {
        self.mutuals.iter().find(|m| m.other == other)
    }

    /// Look up this section's recorded shunt capacitance to `partner`.
    pub fn shunt_to(&self, partner: ShuntPartner) -> Option<&ShuntCapacitance> {
        self.shunts.iter().find(|s| s.partner == partner)
    }
}
