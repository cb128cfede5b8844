//! The winding model: coils, the section arena, and the builder that
//! resolves name references into indices.

use std::collections::HashMap;

use crate::error::{AssemblyWarning, Result, SurgeError};

use super::section::{MutualCoupling, Section, ShuntCapacitance, ShuntPartner};
use super::types::{NodeId, SectionId};

/// An ordered run of sections at one radial position.
///
/// The coil boundary matters to the matrix builder: the first and last node
/// of a coil get distinct incidence bookkeeping, and each coil contributes
/// one extra boundary node beyond its section count.
#[derive(Debug, Clone)]
pub struct Coil {
    /// Display name.
    pub name: String,
    /// Electrical phase this coil belongs to. Mutual inductances are only
    /// precomputed between coils on the same phase.
    pub phase: usize,
    /// Sections in winding order.
    pub sections: Vec<SectionId>,
}

/// Specification of a mutual coupling by partner name, used while building.
#[derive(Debug, Clone)]
pub struct MutualSpec {
    pub other: String,
    pub inductance: f64,
    pub coefficient: f64,
}

/// Specification of a shunt capacitance by partner name, used while
/// building. `partner: None` denotes ground.
#[derive(Debug, Clone)]
pub struct ShuntSpec {
    pub partner: Option<String>,
    pub capacitance: f64,
}

/// Specification of one section, used while building.
#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub name: String,
    pub node_in: NodeId,
    pub node_out: NodeId,
    pub inductance: f64,
    pub resistance: f64,
    pub series_capacitance: f64,
    pub mutuals: Vec<MutualSpec>,
    pub shunts: Vec<ShuntSpec>,
}

impl SectionSpec {
    /// Create a section spec with no couplings recorded yet.
    pub fn new(
        name: impl Into<String>,
        node_in: NodeId,
        node_out: NodeId,
        inductance: f64,
        resistance: f64,
        series_capacitance: f64,
    ) -> Self {
        Self {
            name: name.into(),
            node_in,
            node_out,
            inductance,
            resistance,
            series_capacitance,
            mutuals: Vec::new(),
            shunts: Vec::new(),
        }
    }

    /// Add a shunt capacitance to ground.
    pub fn with_ground_shunt(mut self, capacitance: f64) -> Self {
        self.shunts.push(ShuntSpec {
            partner: None,
            capacitance,
        });
        self
    }

    /// Add a shunt capacitance to another section by name.
    pub fn with_shunt(mut self, partner: impl Into<String>, capacitance: f64) -> Self {
        self.shunts.push(ShuntSpec {
            partner: Some(partner.into()),
            capacitance,
        });
        self
    }

    /// Add a mutual coupling to another section by name.
    pub fn with_mutual(
        mut self,
        other: impl Into<String>,
        inductance: f64,
        coefficient: f64,
    ) -> Self {
        self.mutuals.push(MutualSpec {
            other: other.into(),
            inductance,
            coefficient,
        });
        self
    }
}

/// A complete winding model, read-only to the transient core.
///
/// Sections live in a flat arena indexed by [`SectionId`]; cross-references
/// are integer indices resolved once at build time, with the name lookup
/// built once rather than re-derived by scan on every access.
#[derive(Debug, Clone)]
pub struct Winding {
    sections: Vec<Section>,
    coils: Vec<Coil>,
    name_index: HashMap<String, SectionId>,
    /// Coil index of each section, parallel to the arena.
    coil_of: Vec<usize>,
    node_count: usize,
    /// References that failed to resolve at build time. Surfaced as
    /// assembly warnings; the entries themselves were skipped.
    dangling_refs: Vec<AssemblyWarning>,
}

impl Winding {
    /// All sections in serial order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// The section at an arena index.
    pub fn section(&self, id: SectionId) -> &Section {
        &self.sections[id.0]
    }

    /// Look up a section by its unique name.
    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.name_index.get(name).map(|&id| &self.sections[id.0])
    }

    /// All coils in radial order.
    pub fn coils(&self) -> &[Coil] {
        &self.coils
    }

    /// Number of sections.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Number of physical network nodes (max node index + 1).
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Electrical phase of the coil a section belongs to.
    pub fn phase_of(&self, id: SectionId) -> usize {
        self.coils[self.coil_of[id.0]].phase
    }

    /// References that failed to resolve at build time.
    pub fn dangling_refs(&self) -> &[AssemblyWarning] {
        &self.dangling_refs
    }

    /// Replace the recorded mutual couplings for the given pairs, writing
    /// both directions of each pair.
    ///
    /// This is the commit half of the precomputation transaction: the sweep
    /// accumulates into a scratch buffer and calls this only after every
    /// pair has been computed, so a cancelled sweep leaves the model
    /// untouched.
    pub(crate) fn commit_mutuals(&mut self, pairs: &[(SectionId, SectionId, f64, f64)]) {
        for &(a, b, inductance, coefficient) in pairs {
            self.sections[a.0].mutuals.retain(|m| m.other != b);
            self.sections[b.0].mutuals.retain(|m| m.other != a);
            self.sections[a.0].mutuals.push(MutualCoupling {
                other: b,
                inductance,
                coefficient,
            });
            self.sections[b.0].mutuals.push(MutualCoupling {
                other: a,
                inductance,
                coefficient,
            });
        }
    }
}

/// Builds a [`Winding`] from per-coil section specifications, assigning
/// serial indices and resolving name references.
#[derive(Debug, Default)]
pub struct WindingBuilder {
    coils: Vec<(String, usize, Vec<SectionSpec>)>,
}

impl WindingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a coil with its ordered sections.
    pub fn coil(
        mut self,
        name: impl Into<String>,
        phase: usize,
        sections: Vec<SectionSpec>,
    ) -> Self {
        self.coils.push((name.into(), phase, sections));
        self
    }

    /// Assign serial indices, resolve name references, and produce the
    /// winding.
    ///
    /// Fails with [`SurgeError::InvalidModel`] on duplicate section names,
    /// non-physical node ids, or sections that do not chain within a coil
    /// (a section's in-node must be its predecessor's out-node). Unresolved
    /// mutual/shunt references are recorded as dangling, skipped, and
    /// surfaced later as assembly warnings.
    pub fn build(self) -> Result<Winding> {
        let mut name_index = HashMap::new();
        let mut serial = 0usize;

        // First pass: assign ids so forward references resolve.
        for (_, _, specs) in &self.coils {
            for spec in specs {
                if name_index
                    .insert(spec.name.clone(), SectionId(serial))
                    .is_some()
                {
                    return Err(SurgeError::invalid_model(format!(
                        "duplicate section name '{}'",
                        spec.name
                    )));
                }
                serial += 1;
            }
        }

        let mut sections = Vec::with_capacity(serial);
        let mut coils = Vec::with_capacity(self.coils.len());
        let mut coil_of = Vec::with_capacity(serial);
        let mut dangling_refs = Vec::new();
        let mut node_count = 0usize;

        for (coil_idx, (coil_name, phase, specs)) in self.coils.into_iter().enumerate() {
            if specs.is_empty() {
                return Err(SurgeError::invalid_model(format!(
                    "coil '{coil_name}' has no sections"
                )));
            }

            let mut ids = Vec::with_capacity(specs.len());
            let mut prev_out: Option<NodeId> = None;

            for spec in specs {
                if !spec.node_in.is_physical() || !spec.node_out.is_physical() {
                    return Err(SurgeError::invalid_model(format!(
                        "section '{}' uses a reserved node id",
                        spec.name
                    )));
                }
                if let Some(prev) = prev_out {
                    if prev != spec.node_in {
                        return Err(SurgeError::invalid_model(format!(
                            "section '{}' does not chain: in-node {} but previous out-node {}",
                            spec.name, spec.node_in, prev
                        )));
                    }
                }
                prev_out = Some(spec.node_out);

                let id = name_index[&spec.name];
                node_count = node_count
                    .max(spec.node_in.0 as usize + 1)
                    .max(spec.node_out.0 as usize + 1);

                let mutuals = spec
                    .mutuals
                    .iter()
                    .filter_map(|m| match name_index.get(&m.other) {
                        Some(&other) => Some(MutualCoupling {
                            other,
                            inductance: m.inductance,
                            coefficient: m.coefficient,
                        }),
                        None => {
                            dangling_refs.push(AssemblyWarning::DanglingReference {
                                section: spec.name.clone(),
                                reference: m.other.clone(),
                            });
                            None
                        }
                    })
                    .collect();

                let shunts = spec
                    .shunts
                    .iter()
                    .filter_map(|s| match &s.partner {
                        None => Some(ShuntCapacitance {
                            partner: ShuntPartner::Ground,
                            capacitance: s.capacitance,
                        }),
                        Some(name) => match name_index.get(name) {
                            Some(&other) => Some(ShuntCapacitance {
                                partner: ShuntPartner::Section(other),
                                capacitance: s.capacitance,
                            }),
                            None => {
                                dangling_refs.push(AssemblyWarning::DanglingReference {
                                    section: spec.name.clone(),
                                    reference: name.clone(),
                                });
                                None
                            }
                        },
                    })
                    .collect();

                sections.push(Section {
                    id,
                    name: spec.name,
                    node_in: spec.node_in,
                    node_out: spec.node_out,
                    inductance: spec.inductance,
                    resistance: spec.resistance,
                    series_capacitance: spec.series_capacitance,
                    mutuals,
                    shunts,
                });
                coil_of.push(coil_idx);
                ids.push(id);
            }

            coils.push(Coil {
                name: coil_name,
                phase,
                sections: ids,
            });
        }

        Ok(Winding {
            sections,
            coils,
            name_index,
            coil_of,
            node_count,
            dangling_refs,
        })
    }
}
