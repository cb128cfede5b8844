//! Transient integration of the winding network.
//!
//! The state is the branch-current vector I and the node-voltage vector V,
//! both starting at zero. Each fixed step first advances V from
//! `C·(dV/dt) = A·I` with the connection constraints folded into a private
//! copy of C, then advances I from `M·(dI/dt) = B·V - R·I` using the freshly
//! committed V. All arithmetic is real-valued double precision.

use log::debug;

use crate::connect::ResolvedConnections;
use crate::error::{Result, SurgeError};
use crate::source::Source;
use crate::task::{CancelToken, ProgressSink};

use super::build::NetworkMatrices;
use super::matrix::{LuFactors, Matrix};

/// One fixed-step segment of the simulation schedule.
///
/// A run executes an ordered sequence of phases back-to-back, sharing state
/// and output buffers; the usual BIL cadence is a fine step near t = 0 and
/// coarser steps later.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStepPhase {
    /// Phase start time in seconds.
    pub start: f64,
    /// Phase end time in seconds.
    pub end: f64,
    /// Integration step width in seconds.
    pub step: f64,
    /// Snapshot cadence in seconds; must be an integer multiple of `step`.
    pub save_step: f64,
}

impl TimeStepPhase {
    pub fn new(start: f64, end: f64, step: f64, save_step: f64) -> Self {
        Self {
            start,
            end,
            step,
            save_step,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.end > self.start) || !(self.step > 0.0) || !(self.save_step > 0.0) {
            return Err(SurgeError::invalid_param(format!(
                "phase [{:.3e}, {:.3e}] with step {:.3e}/save {:.3e} is not positive and ordered",
                self.start, self.end, self.step, self.save_step
            )));
        }
        let interval = (self.save_step / self.step).round();
        if interval < 1.0 || (interval * self.step - self.save_step).abs() > 1e-9 * self.save_step {
            return Err(SurgeError::invalid_param(format!(
                "save step {:.3e} is not an integer multiple of integration step {:.3e}",
                self.save_step, self.step
            )));
        }
        Ok(())
    }

    /// Number of integration steps in this phase.
    fn step_count(&self) -> usize {
        ((self.end - self.start) / self.step).round() as usize
    }

    /// Integration steps between snapshots.
    fn save_interval(&self) -> usize {
        (self.save_step / self.step).round() as usize
    }
}

/// Time-indexed node voltages and branch currents on the save-time axis.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// Save instants in seconds; row index of the two matrices.
    pub times: Vec<f64>,
    /// Node voltages, one row per save instant.
    pub node_voltages: Matrix,
    /// Branch currents, one row per save instant.
    pub branch_currents: Matrix,
}

impl SimulationResult {
    /// Number of saved instants.
    pub fn save_count(&self) -> usize {
        self.times.len()
    }

    /// The voltage at a node across all save instants as (t, v) pairs.
    pub fn voltage_waveform(&self, node: usize) -> Vec<(f64, f64)> {
        self.times
            .iter()
            .enumerate()
            .map(|(row, &t)| (t, self.node_voltages.get(row, node)))
            .collect()
    }

    /// The current through a section across all save instants as (t, i)
    /// pairs.
    pub fn current_waveform(&self, section: usize) -> Vec<(f64, f64)> {
        self.times
            .iter()
            .enumerate()
            .map(|(row, &t)| (t, self.branch_currents.get(row, section)))
            .collect()
    }
}

/// Fourth-order Runge-Kutta integrator over the assembled network.
///
/// Construction takes private working copies: C with the connection
/// constraint rows incorporated and M symmetrized from its upper triangle,
/// both factored once. The builder's matrices stay untouched, so one
/// assembly can back repeated runs with different connections.
pub struct TransientIntegrator {
    c_lu: LuFactors,
    m_lu: LuFactors,
    r_diag: Vec<f64>,
    node_incidence: Matrix,
    branch_incidence: Matrix,
    source_node: usize,
    grounded: Vec<usize>,
    /// Generator-tied nodes other than the source; their rows enforce
    /// dV/dt equal to the source node's.
    merged: Vec<usize>,
    nodes: usize,
    sections: usize,
}

impl TransientIntegrator {
    /// Prepare a run: fold the resolved connections into a private copy of
    /// C and factor both system matrices.
    ///
    /// A singular capacitance or inductance matrix is fatal here: the
    /// caller must fix the model (e.g. add a missing ground or shunt path).
    pub fn new(matrices: &NetworkMatrices, connections: &ResolvedConnections) -> Result<Self> {
        let nodes = matrices.capacitance.rows();
        let sections = matrices.inductance.rows();
        let source_node = connections.source_node;
        if source_node >= nodes {
            return Err(SurgeError::invalid_param(format!(
                "source node {source_node} outside the {nodes}-node network"
            )));
        }
        let grounded = connections.grounded_nodes();
        let merged = connections.generator_tied_nodes();
        if grounded.contains(&source_node) {
            return Err(SurgeError::invalid_param(
                "source node is tied to ground".to_string(),
            ));
        }

        // Private copy of C with constraint rows: grounded nodes hold zero,
        // generator-tied nodes track the source, the source row receives
        // the waveform derivative.
        let mut c = matrices.capacitance.clone();
        for &g in &grounded {
            c.set_unit_row(g);
        }
        for &m in &merged {
            c.set_unit_row(m);
            c.set(m, source_node, -1.0);
        }
        c.set_unit_row(source_node);
        let c_lu = c.factor("capacitance")?;

        let mut m = matrices.inductance.clone();
        m.mirror_upper_triangle();
        let m_lu = m.factor("inductance")?;

        let r_diag = (0..sections).map(|j| matrices.resistance.get(j, j)).collect();

        Ok(Self {
            c_lu,
            m_lu,
            r_diag,
            node_incidence: matrices.node_incidence.clone(),
            branch_incidence: matrices.branch_incidence.clone(),
            source_node,
            grounded,
            merged,
            nodes,
            sections,
        })
    }

    /// Node-voltage rates: solve the constrained `C·(dV/dt) = A·I` with the
    /// source derivative injected at the source row.
    fn voltage_rates(&self, t: f64, current_into_nodes: &[f64], source: &Source) -> Vec<f64> {
        let mut rhs = current_into_nodes.to_vec();
        for &g in &self.grounded {
            rhs[g] = 0.0;
        }
        for &m in &self.merged {
            rhs[m] = 0.0;
        }
        rhs[self.source_node] = source.dvdt(t);
        self.c_lu.solve(&rhs)
    }

    /// Branch-current rates: solve `M·(dI/dt) = B·V - R·I`.
    fn current_rates(&self, voltage_across: &[f64], currents: &[f64]) -> Vec<f64> {
        let mut rhs = voltage_across.to_vec();
        for j in 0..self.sections {
            rhs[j] -= self.r_diag[j] * currents[j];
        }
        self.m_lu.solve(&rhs)
    }

    /// Advance one step of width h, committing the new state in place.
    fn step(&self, t: f64, h: f64, v: &mut [f64], i: &mut [f64], source: &Source) {
        // Voltage update. I is frozen, so the stages differ only in the
        // source derivative; the two midpoint stages share one sample.
        let current_into_nodes = self.node_incidence.mul_vec(i);
        let k1 = self.voltage_rates(t, &current_into_nodes, source);
        let k_mid = self.voltage_rates(t + 0.5 * h, &current_into_nodes, source);
        let k4 = self.voltage_rates(t + h, &current_into_nodes, source);
        for n in 0..self.nodes {
            v[n] += h / 6.0 * (k1[n] + 4.0 * k_mid[n] + k4[n]);
        }

        // Current update against the committed V, constant across stages.
        let voltage_across = self.branch_incidence.mul_vec(v);
        let k1 = self.current_rates(&voltage_across, i);
        let mut stage = vec![0.0; self.sections];
        for j in 0..self.sections {
            stage[j] = i[j] + 0.5 * h * k1[j];
        }
        let k2 = self.current_rates(&voltage_across, &stage);
        for j in 0..self.sections {
            stage[j] = i[j] + 0.5 * h * k2[j];
        }
        let k3 = self.current_rates(&voltage_across, &stage);
        for j in 0..self.sections {
            stage[j] = i[j] + h * k3[j];
        }
        let k4 = self.current_rates(&voltage_across, &stage);
        for j in 0..self.sections {
            i[j] += h / 6.0 * (k1[j] + 2.0 * k2[j] + 2.0 * k3[j] + k4[j]);
        }
    }

    /// Integrate through the phase schedule.
    ///
    /// Returns no partial result: cancellation yields
    /// [`SurgeError::Cancelled`] and an invalid schedule fails before the
    /// first step.
    pub fn run(
        &self,
        source: &Source,
        phases: &[TimeStepPhase],
        sink: &ProgressSink,
        cancel: &CancelToken,
    ) -> Result<SimulationResult> {
        if phases.is_empty() {
            return Err(SurgeError::invalid_param(
                "empty time-step phase list".to_string(),
            ));
        }
        let mut total_saves = 0usize;
        for phase in phases {
            phase.validate()?;
            total_saves += phase.step_count() / phase.save_interval();
        }
        let rows = total_saves + 1;
        let t_begin = phases[0].start;
        let t_end = phases[phases.len() - 1].end;

        let mut v = vec![0.0; self.nodes];
        let mut i = vec![0.0; self.sections];

        // Pre-sized save buffers; row 0 is the initial state.
        let mut times = vec![0.0; rows];
        let mut node_voltages = Matrix::zeros(rows, self.nodes);
        let mut branch_currents = Matrix::zeros(rows, self.sections);
        times[0] = t_begin;
        let mut row = 1usize;

        debug!(
            "transient run: {} phases, {} nodes, {} sections, {} save rows",
            phases.len(),
            self.nodes,
            self.sections,
            rows
        );

        for phase in phases {
            let h = phase.step;
            let steps = phase.step_count();
            let interval = phase.save_interval();

            for s in 1..=steps {
                if cancel.is_cancelled() {
                    return Err(SurgeError::Cancelled);
                }
                let t = phase.start + (s - 1) as f64 * h;
                self.step(t, h, &mut v, &mut i, source);

                if s % interval == 0 {
                    let t_saved = phase.start + s as f64 * h;
                    times[row] = t_saved;
                    node_voltages.row_mut(row).copy_from_slice(&v);
                    branch_currents.row_mut(row).copy_from_slice(&i);
                    row += 1;
                    sink.report(t_saved, t_begin, t_end, "transient");
                }
            }
        }
        debug_assert_eq!(row, rows);

        Ok(SimulationResult {
            times,
            node_voltages,
            branch_currents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::{resolve_connections, Connection};
    use crate::model::{NodeId, SectionSpec, Winding, WindingBuilder};
    use crate::solver::build::build_network;
    use crate::source::{ExpRiseParams, Waveform};

    fn single_rl_section(inductance: f64, resistance: f64) -> Winding {
        WindingBuilder::new()
            .coil(
                "LV",
                0,
                vec![SectionSpec::new(
                    "D1",
                    NodeId(0),
                    NodeId(1),
                    inductance,
                    resistance,
                    0.0,
                )],
            )
            .build()
            .unwrap()
    }

    fn integrator_for(
        winding: &Winding,
        connections: &[Connection],
    ) -> Result<TransientIntegrator> {
        let matrices = build_network(winding);
        let resolved = resolve_connections(connections, winding.node_count())?;
        TransientIntegrator::new(&matrices, &resolved)
    }

    #[test]
    fn test_save_row_count_matches_schedule() {
        let winding = single_rl_section(1e-2, 10.0);
        let integrator = integrator_for(
            &winding,
            &[
                Connection::to_generator(NodeId(0)),
                Connection::to_ground(NodeId(1)),
            ],
        )
        .unwrap();

        let source = Source::new(Waveform::ExpRise(ExpRiseParams { tau: 1e-5 }), 1.0);
        let phases = [TimeStepPhase::new(0.0, 100e-6, 10e-9, 10e-9)];
        let result = integrator
            .run(&source, &phases, &ProgressSink::disabled(), &CancelToken::new())
            .unwrap();

        assert_eq!(result.save_count(), 10001);
        assert!((result.times[10000] - 100e-6).abs() < 1e-12);
    }

    #[test]
    fn test_multi_phase_schedule_shares_state_and_buffers() {
        let winding = single_rl_section(1e-2, 10.0);
        let integrator = integrator_for(
            &winding,
            &[
                Connection::to_generator(NodeId(0)),
                Connection::to_ground(NodeId(1)),
            ],
        )
        .unwrap();

        let source = Source::new(Waveform::ExpRise(ExpRiseParams { tau: 1e-5 }), 1.0);
        let phases = [
            TimeStepPhase::new(0.0, 10e-6, 10e-9, 1e-6),
            TimeStepPhase::new(10e-6, 100e-6, 100e-9, 10e-6),
        ];
        let result = integrator
            .run(&source, &phases, &ProgressSink::disabled(), &CancelToken::new())
            .unwrap();

        // 10 saves in the fine phase, 9 in the coarse one, plus row 0.
        assert_eq!(result.save_count(), 20);
        assert!((result.times[10] - 10e-6).abs() < 1e-12);
        assert!((result.times[19] - 100e-6).abs() < 1e-12);
    }

    #[test]
    fn test_rl_section_matches_closed_form() {
        // One section, far terminal grounded: L dI/dt + R I = Vs(t) with
        // Vs = E (1 - exp(-t/tau_s)). Closed form:
        //   I(t) = E/R + A exp(-t/tau_s) + B exp(-t/tau)
        //   A = -E / (R - L/tau_s),  B = -E/R - A,  tau = L/R.
        let (e, r, l, tau_s) = (1.0, 10.0, 1e-2, 1e-4);
        let tau = l / r;
        let winding = single_rl_section(l, r);
        let integrator = integrator_for(
            &winding,
            &[
                Connection::to_generator(NodeId(0)),
                Connection::to_ground(NodeId(1)),
            ],
        )
        .unwrap();

        let source = Source::new(Waveform::ExpRise(ExpRiseParams { tau: tau_s }), e);
        let t_final = 5.0 * tau;
        let phases = [TimeStepPhase::new(0.0, t_final, 1e-6, 5e-5)];
        let result = integrator
            .run(&source, &phases, &ProgressSink::disabled(), &CancelToken::new())
            .unwrap();

        let a = -e / (r - l / tau_s);
        let b = -e / r - a;
        let expected =
            e / r + a * (-t_final / tau_s).exp() + b * (-t_final / tau).exp();

        let last = result.save_count() - 1;
        let i_final = result.branch_currents.get(last, 0);
        let rel = (i_final - expected).abs() / expected.abs();
        assert!(
            rel < 1e-3,
            "I(5 tau) = {i_final:.6e}, expected {expected:.6e} (rel {rel:.2e})"
        );

        // The source node voltage is the integral of the injected
        // derivative and tracks the waveform tightly.
        let v_source = result.node_voltages.get(last, 0);
        let v_expected = source.voltage(t_final);
        assert!((v_source - v_expected).abs() < 1e-6 * e);

        // The grounded terminal never moves.
        assert_eq!(result.node_voltages.get(last, 1), 0.0);
    }

    #[test]
    fn test_two_section_ladder_settles_to_source_plateau() {
        let winding = WindingBuilder::new()
            .coil(
                "LV",
                0,
                vec![
                    SectionSpec::new("D1", NodeId(0), NodeId(1), 1e-3, 100.0, 1e-9)
                        .with_ground_shunt(1e-9),
                    SectionSpec::new("D2", NodeId(1), NodeId(2), 1e-3, 100.0, 1e-9)
                        .with_ground_shunt(1e-9),
                ],
            )
            .build()
            .unwrap();
        let integrator =
            integrator_for(&winding, &[Connection::to_generator(NodeId(0))]).unwrap();

        let source = Source::new(Waveform::ExpRise(ExpRiseParams { tau: 1e-6 }), 100.0);
        let phases = [TimeStepPhase::new(0.0, 200e-6, 2e-9, 2e-6)];
        let result = integrator
            .run(&source, &phases, &ProgressSink::disabled(), &CancelToken::new())
            .unwrap();

        // With no resistive path to ground, every node equalizes to the
        // source plateau and the branch currents die out.
        let last = result.save_count() - 1;
        for node in 0..3 {
            let v = result.node_voltages.get(last, node);
            assert!(
                (v - 100.0).abs() < 2.0,
                "V(node {node}) = {v:.3} at t = 200 us"
            );
        }
        for section in 0..2 {
            assert!(result.branch_currents.get(last, section).abs() < 1e-2);
        }
    }

    #[test]
    fn test_generator_tied_node_tracks_source() {
        let winding = WindingBuilder::new()
            .coil(
                "LV",
                0,
                vec![SectionSpec::new("D1", NodeId(0), NodeId(1), 1e-3, 10.0, 0.0)],
            )
            .coil(
                "HV",
                0,
                vec![SectionSpec::new("D2", NodeId(2), NodeId(3), 1e-3, 10.0, 0.0)],
            )
            .build()
            .unwrap();
        let integrator = integrator_for(
            &winding,
            &[
                Connection::to_generator(NodeId(0)),
                Connection::to_generator(NodeId(2)),
                Connection::to_ground(NodeId(1)),
                Connection::to_ground(NodeId(3)),
            ],
        )
        .unwrap();

        let source = Source::new(Waveform::ExpRise(ExpRiseParams { tau: 1e-5 }), 50.0);
        let phases = [TimeStepPhase::new(0.0, 50e-6, 10e-9, 5e-6)];
        let result = integrator
            .run(&source, &phases, &ProgressSink::disabled(), &CancelToken::new())
            .unwrap();

        let last = result.save_count() - 1;
        let v0 = result.node_voltages.get(last, 0);
        let v2 = result.node_voltages.get(last, 2);
        assert!((v0 - v2).abs() < 1e-9, "merged terminal diverged: {v0} vs {v2}");
        assert!((v0 - source.voltage(50e-6)).abs() < 1e-6 * 50.0);
    }

    #[test]
    fn test_singular_capacitance_rejected() {
        // Node 2 has no capacitive path at all: its C row is zero.
        let winding = WindingBuilder::new()
            .coil(
                "LV",
                0,
                vec![
                    SectionSpec::new("D1", NodeId(0), NodeId(1), 1e-3, 10.0, 1e-9)
                        .with_ground_shunt(1e-9),
                    SectionSpec::new("D2", NodeId(1), NodeId(2), 1e-3, 10.0, 0.0),
                ],
            )
            .build()
            .unwrap();
        let result = integrator_for(&winding, &[Connection::to_generator(NodeId(0))]);
        assert!(matches!(
            result,
            Err(SurgeError::SingularSystem {
                matrix: "capacitance"
            })
        ));
    }

    #[test]
    fn test_cancellation_before_first_step() {
        let winding = single_rl_section(1e-2, 10.0);
        let integrator = integrator_for(
            &winding,
            &[
                Connection::to_generator(NodeId(0)),
                Connection::to_ground(NodeId(1)),
            ],
        )
        .unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let source = Source::new(Waveform::ExpRise(ExpRiseParams { tau: 1e-5 }), 1.0);
        let phases = [TimeStepPhase::new(0.0, 100e-6, 10e-9, 10e-9)];
        let result = integrator.run(&source, &phases, &ProgressSink::disabled(), &cancel);
        assert!(matches!(result, Err(SurgeError::Cancelled)));
    }

    #[test]
    fn test_fractional_save_interval_rejected() {
        let phase = TimeStepPhase::new(0.0, 1e-4, 3e-9, 10e-9);
        assert!(matches!(
            phase.validate(),
            Err(SurgeError::InvalidSimulationParam { .. })
        ));
    }
}
