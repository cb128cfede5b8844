//! Network matrix assembly.
//!
//! One sweep over the winding's coils and sections produces the five
//! matrices that define the node/branch equations: inductance M, resistance
//! R, capacitance C, and the two incidence matrices A ("current into a node
//! = A·I") and B ("voltage across a branch = B·V").
//!
//! Capacitances live between nodes, not between sections, and an interior
//! node is shared by the closing of one section and the opening of the
//! next. The sweep therefore carries the previous section within the coil
//! as an explicit state machine (`CoilWalk`) so the boundary-node
//! bookkeeping stays testable in isolation.

use log::warn;

use crate::model::{SectionId, ShuntPartner, Winding};

use super::matrix::Matrix;

/// The assembled network matrices for one winding.
///
/// Derived fresh from the model on every run; the integrator takes private
/// working copies, so one assembly can back repeated runs with different
/// connections.
#[derive(Debug, Clone)]
pub struct NetworkMatrices {
    /// Inductance M (sections x sections). Diagonal entries are self-
    /// inductances; recorded mutual pairs fill the upper triangle once.
    /// Consumers must treat the matrix as symmetric (see
    /// [`Matrix::mirror_upper_triangle`]).
    pub inductance: Matrix,
    /// Resistance R (sections x sections), diagonal.
    pub resistance: Matrix,
    /// Node-to-node capacitance C (nodes x nodes).
    pub capacitance: Matrix,
    /// Node incidence A (nodes x sections): current into a node is `A·I`.
    pub node_incidence: Matrix,
    /// Branch incidence B (sections x nodes): voltage across a branch is
    /// `B·V`.
    pub branch_incidence: Matrix,
    /// Number of dangling-reference warnings surfaced during assembly.
    pub warnings: usize,
}

/// Sweep state while walking one coil.
enum CoilWalk {
    /// At the coil's first section; its in-node is a coil boundary.
    Start,
    /// Past at least one section; the interior node just entered closes
    /// the remembered previous section.
    Interior { prev: SectionId },
}

/// Build the network matrices from a winding model.
///
/// Dangling references recorded when the model was built are logged and
/// counted here; assembly always completes, and the count is surfaced on
/// [`NetworkMatrices::warnings`].
pub fn build_network(winding: &Winding) -> NetworkMatrices {
    let sections = winding.section_count();
    let nodes = winding.node_count();

    let mut m = Matrix::zeros(sections, sections);
    let mut r = Matrix::zeros(sections, sections);
    let mut c = Matrix::zeros(nodes, nodes);
    let mut a = Matrix::zeros(nodes, sections);
    let mut b = Matrix::zeros(sections, nodes);

    for coil in winding.coils() {
        let mut walk = CoilWalk::Start;

        for &sid in &coil.sections {
            let section = winding.section(sid);
            let j = sid.0;
            // In/out nodes are physical by construction.
            let n_in = section.node_in.index().expect("physical in-node");
            let n_out = section.node_out.index().expect("physical out-node");

            // Branch equations
            m.set(j, j, section.inductance);
            r.set(j, j, section.resistance);
            b.set(j, n_in, 1.0);
            b.set(j, n_out, -1.0);

            // Mutual couplings: write the upper triangle once; the pair is
            // recorded on both partners with the identical value.
            for mutual in &section.mutuals {
                if j < mutual.other.0 {
                    m.set(j, mutual.other.0, mutual.inductance);
                }
            }

            // Node incidence: the branch current leaves the in-node; the
            // interior node just entered also collects the previous
            // section's current.
            a.set(n_in, j, -1.0);
            if let CoilWalk::Interior { prev } = walk {
                a.set(n_in, prev.0, 1.0);
            }
            walk = CoilWalk::Interior { prev: sid };

            // Series capacitance between the section's own two nodes.
            let cs = section.series_capacitance;
            c.add(n_in, n_in, cs);
            c.add(n_out, n_out, cs);
            c.add(n_in, n_out, -cs);
            c.add(n_out, n_in, -cs);

            // Shunt capacitances: half to each boundary node, paired with
            // the like boundary of the partner. Only the own-row
            // off-diagonal is written; the partner's pass writes the
            // mirror. Ground is not a matrix row, so ground shunts stamp
            // the diagonal only.
            for shunt in &section.shunts {
                let half = shunt.capacitance / 2.0;
                match shunt.partner {
                    ShuntPartner::Ground => {
                        c.add(n_in, n_in, half);
                        c.add(n_out, n_out, half);
                    }
                    ShuntPartner::Section(pid) => {
                        let partner = winding.section(pid);
                        let p_in = partner.node_in.index().expect("physical in-node");
                        let p_out = partner.node_out.index().expect("physical out-node");
                        c.add(n_in, n_in, half);
                        c.add(n_in, p_in, -half);
                        c.add(n_out, n_out, half);
                        c.add(n_out, p_out, -half);
                    }
                }
            }
        }

        // The coil's last node collects the final section's current.
        if let CoilWalk::Interior { prev } = walk {
            let last = winding.section(prev);
            let n_out = last.node_out.index().expect("physical out-node");
            a.set(n_out, prev.0, 1.0);
        }
    }

    let warnings = winding.dangling_refs().len();
    for dangling in winding.dangling_refs() {
        warn!("{dangling}");
    }

    NetworkMatrices {
        inductance: m,
        resistance: r,
        capacitance: c,
        node_incidence: a,
        branch_incidence: b,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeId, SectionSpec, WindingBuilder};

    /// Two coils: D1 (0 -> 1), D2 (1 -> 2) and D3 (3 -> 4).
    fn two_coil_winding() -> Winding {
        WindingBuilder::new()
            .coil(
                "LV",
                0,
                vec![
                    SectionSpec::new("D1", NodeId(0), NodeId(1), 2e-3, 0.5, 1e-9)
                        .with_ground_shunt(4e-10)
                        .with_mutual("D2", 5e-4, 0.25),
                    SectionSpec::new("D2", NodeId(1), NodeId(2), 2e-3, 0.5, 1e-9)
                        .with_ground_shunt(4e-10)
                        .with_mutual("D1", 5e-4, 0.25),
                ],
            )
            .coil(
                "HV",
                0,
                vec![SectionSpec::new(
                    "D3",
                    NodeId(3),
                    NodeId(4),
                    3e-3,
                    0.8,
                    2e-9,
                )],
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_inductance_diagonal_positive_upper_triangular() {
        let matrices = build_network(&two_coil_winding());
        let m = &matrices.inductance;
        for i in 0..3 {
            assert!(m.get(i, i) > 0.0);
        }
        assert_eq!(m.get(0, 1), 5e-4);
        // Lower triangle untouched; consumers symmetrize.
        assert_eq!(m.get(1, 0), 0.0);

        let mut full = m.clone();
        full.mirror_upper_triangle();
        assert_eq!(full.get(1, 0), full.get(0, 1));
    }

    #[test]
    fn test_resistance_is_diagonal() {
        let matrices = build_network(&two_coil_winding());
        let r = &matrices.resistance;
        assert_eq!(r.get(0, 0), 0.5);
        assert_eq!(r.get(2, 2), 0.8);
        assert_eq!(r.get(0, 1), 0.0);
    }

    #[test]
    fn test_incidence_matrices_match_topology() {
        let matrices = build_network(&two_coil_winding());
        let a = &matrices.node_incidence;
        let b = &matrices.branch_incidence;

        // Column j of A: -1 at the in-node, +1 at the out-node.
        let expected = [(0usize, 1usize), (1, 2), (3, 4)];
        for (j, &(n_in, n_out)) in expected.iter().enumerate() {
            for node in 0..5 {
                let want = if node == n_in {
                    -1.0
                } else if node == n_out {
                    1.0
                } else {
                    0.0
                };
                assert_eq!(a.get(node, j), want, "A[{node},{j}]");
            }
            assert_eq!(b.get(j, n_in), 1.0);
            assert_eq!(b.get(j, n_out), -1.0);
        }
    }

    #[test]
    fn test_capacitance_row_sums_equal_ground_capacitance() {
        // Node-to-node terms cancel in a row sum; what remains is the
        // node's capacitance to ground.
        let matrices = build_network(&two_coil_winding());
        let c = &matrices.capacitance;

        let row_sum = |n: usize| c.row(n).iter().sum::<f64>();
        // D1 and D2 each put half of 4e-10 on their boundary nodes; node 1
        // is shared by both.
        assert!((row_sum(0) - 2e-10).abs() < 1e-22);
        assert!((row_sum(1) - 4e-10).abs() < 1e-22);
        assert!((row_sum(2) - 2e-10).abs() < 1e-22);
        // The HV coil has no ground shunts.
        assert!(row_sum(3).abs() < 1e-22);
        assert!(row_sum(4).abs() < 1e-22);
    }

    #[test]
    fn test_section_shunt_splits_between_like_boundaries() {
        let winding = WindingBuilder::new()
            .coil(
                "LV",
                0,
                vec![SectionSpec::new("D1", NodeId(0), NodeId(1), 1e-3, 0.5, 0.0)
                    .with_shunt("D2", 8e-10)],
            )
            .coil(
                "HV",
                0,
                vec![SectionSpec::new("D2", NodeId(2), NodeId(3), 1e-3, 0.5, 0.0)
                    .with_shunt("D1", 8e-10)],
            )
            .build()
            .unwrap();
        let c = build_network(&winding).capacitance;

        // in-in and out-out pairs, 4e-10 each, symmetric.
        assert_eq!(c.get(0, 2), -4e-10);
        assert_eq!(c.get(2, 0), -4e-10);
        assert_eq!(c.get(1, 3), -4e-10);
        assert_eq!(c.get(3, 1), -4e-10);
        assert_eq!(c.get(0, 0), 4e-10);
        assert_eq!(c.get(1, 1), 4e-10);
    }

    #[test]
    fn test_dangling_reference_counted_not_fatal() {
        let winding = WindingBuilder::new()
            .coil(
                "LV",
                0,
                vec![SectionSpec::new("D1", NodeId(0), NodeId(1), 1e-3, 0.5, 1e-9)
                    .with_shunt("MISSING", 1e-10)],
            )
            .build()
            .unwrap();
        let matrices = build_network(&winding);
        assert_eq!(matrices.warnings, 1);
        // The dangling shunt contributed nothing.
        assert_eq!(matrices.capacitance.get(0, 0), 1e-9);
    }
}
