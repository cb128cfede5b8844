//! Winding model validation.

use log::warn;

use crate::error::{AssemblyWarning, Result, SurgeError};

use super::section::ShuntPartner;
use super::winding::Winding;

/// Validate a winding model before simulation.
///
/// Checks:
/// - Self-inductances are strictly positive; resistances and capacitances
///   are non-negative.
/// - Mutual-inductance and shunt-capacitance maps are symmetric: if A
///   references B, B must reference A with the identical value.
/// - Coupling coefficients lie in [-1, 1]; violations are returned as
///   warnings (and logged), never clamped.
///
/// Structural errors abort with [`SurgeError::InvalidModel`]; range
/// violations accumulate as warnings alongside the `Ok` result.
pub fn validate_winding(winding: &Winding) -> Result<Vec<AssemblyWarning>> {
    let mut warnings = Vec::new();

    for section in winding.sections() {
        if section.inductance <= 0.0 {
            return Err(SurgeError::invalid_model(format!(
                "section '{}' has non-positive self-inductance {}",
                section.name, section.inductance
            )));
        }
        if section.resistance < 0.0 || section.series_capacitance < 0.0 {
            return Err(SurgeError::invalid_model(format!(
                "section '{}' has a negative resistance or capacitance",
                section.name
            )));
        }

        for mutual in &section.mutuals {
            let other = winding.section(mutual.other);
            let back = other.mutual_to(section.id).ok_or_else(|| {
                SurgeError::invalid_model(format!(
                    "mutual inductance '{}' -> '{}' has no symmetric entry",
                    section.name, other.name
                ))
            })?;
            if back.inductance != mutual.inductance {
                return Err(SurgeError::invalid_model(format!(
                    "mutual inductance '{}' <-> '{}' is asymmetric: {} vs {}",
                    section.name, other.name, mutual.inductance, back.inductance
                )));
            }
            if mutual.coefficient.abs() > 1.0 {
                let warning = AssemblyWarning::CouplingOutOfRange {
                    a: section.name.clone(),
                    b: other.name.clone(),
                    coefficient: mutual.coefficient,
                };
                warn!("{warning}");
                warnings.push(warning);
            }
        }

        for shunt in &section.shunts {
            if shunt.capacitance < 0.0 {
                return Err(SurgeError::invalid_model(format!(
                    "section '{}' has a negative shunt capacitance",
                    section.name
                )));
            }
            if let ShuntPartner::Section(other_id) = shunt.partner {
                let other = winding.section(other_id);
                let back = other
                    .shunt_to(ShuntPartner::Section(section.id))
                    .ok_or_else(|| {
                        SurgeError::invalid_model(format!(
                            "shunt capacitance '{}' -> '{}' has no symmetric entry",
                            section.name, other.name
                        ))
                    })?;
                if back.capacitance != shunt.capacitance {
                    return Err(SurgeError::invalid_model(format!(
                        "shunt capacitance '{}' <-> '{}' is asymmetric: {} vs {}",
                        section.name, other.name, shunt.capacitance, back.capacitance
                    )));
                }
            }
        }
    }

    Ok(warnings)
}
