//! Impulse source waveforms.
//!
//! The integrator advances node voltages from the source *derivative*, so
//! every waveform exposes both `voltage(t)` and `dvdt(t)` as pure functions
//! of time. Waveforms are zero for `t < 0`.

/// Double-exponential lightning impulse parameters.
///
/// ```text
/// v(t) = k * (exp(-alpha t) - exp(-beta t))
/// ```
///
/// `alpha` and `beta` are derived from the nominal front and tail times
/// with the usual closed-form approximations `alpha = 1/(1.4 T2)` and
/// `beta = 2.96/T1`; `k` normalizes the peak to exactly 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseParams {
    /// Front time T1 in seconds (1.2 us for the standard BIL shot).
    pub front: f64,
    /// Time to half-value T2 in seconds (50 us for the standard BIL shot).
    pub tail: f64,
    alpha: f64,
    beta: f64,
    scale: f64,
}

impl ImpulseParams {
    /// Derive the double-exponential constants from front/tail times.
    pub fn new(front: f64, tail: f64) -> Self {
        let alpha = 1.0 / (1.4 * tail);
        let beta = 2.96 / front;
        let t_peak = (beta / alpha).ln() / (beta - alpha);
        let scale = 1.0 / ((-alpha * t_peak).exp() - (-beta * t_peak).exp());
        Self {
            front,
            tail,
            alpha,
            beta,
            scale,
        }
    }

    /// The standard 1.2/50 us lightning impulse.
    pub fn standard() -> Self {
        Self::new(crate::STANDARD_FRONT_TIME, crate::STANDARD_TAIL_TIME)
    }

    /// Time of the waveform crest.
    pub fn peak_time(&self) -> f64 {
        (self.beta / self.alpha).ln() / (self.beta - self.alpha)
    }

    /// Normalized value at time t (peak = 1).
    pub fn evaluate(&self, t: f64) -> f64 {
        if t < 0.0 {
            return 0.0;
        }
        self.scale * ((-self.alpha * t).exp() - (-self.beta * t).exp())
    }

    /// Normalized derivative at time t.
    pub fn derivative(&self, t: f64) -> f64 {
        if t < 0.0 {
            return 0.0;
        }
        self.scale * (-self.alpha * (-self.alpha * t).exp() + self.beta * (-self.beta * t).exp())
    }
}

/// Exponential rise to a plateau: `v(t) = 1 - exp(-t/tau)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpRiseParams {
    /// Rise time constant in seconds.
    pub tau: f64,
}

impl ExpRiseParams {
    pub fn evaluate(&self, t: f64) -> f64 {
        if t < 0.0 {
            return 0.0;
        }
        1.0 - (-t / self.tau).exp()
    }

    pub fn derivative(&self, t: f64) -> f64 {
        if t < 0.0 {
            return 0.0;
        }
        (-t / self.tau).exp() / self.tau
    }
}

/// Linear ramp to a plateau over `rise` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct RampParams {
    /// Rise duration in seconds.
    pub rise: f64,
}

impl RampParams {
    pub fn evaluate(&self, t: f64) -> f64 {
        if t < 0.0 {
            0.0
        } else if t < self.rise {
            t / self.rise
        } else {
            1.0
        }
    }

    pub fn derivative(&self, t: f64) -> f64 {
        if (0.0..self.rise).contains(&t) {
            1.0 / self.rise
        } else {
            0.0
        }
    }
}

/// Waveform shape of an impulse source, normalized to unit peak.
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
    /// Double-exponential lightning impulse.
    Impulse(ImpulseParams),
    /// Exponential rise to a plateau.
    ExpRise(ExpRiseParams),
    /// Linear ramp to a plateau.
    Ramp(RampParams),
}

/// An excitation source: a waveform shape scaled by a peak voltage.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub waveform: Waveform,
    /// Peak voltage in volts.
    pub peak: f64,
}

impl Source {
    pub fn new(waveform: Waveform, peak: f64) -> Self {
        Self { waveform, peak }
    }

    /// A standard 1.2/50 us lightning impulse with the given peak voltage.
    pub fn lightning(peak: f64) -> Self {
        Self::new(Waveform::Impulse(ImpulseParams::standard()), peak)
    }

    /// Source voltage at time t.
    pub fn voltage(&self, t: f64) -> f64 {
        self.peak
            * match &self.waveform {
                Waveform::Impulse(p) => p.evaluate(t),
                Waveform::ExpRise(p) => p.evaluate(t),
                Waveform::Ramp(p) => p.evaluate(t),
            }
    }

    /// Source voltage derivative at time t.
    pub fn dvdt(&self, t: f64) -> f64 {
        self.peak
            * match &self.waveform {
                Waveform::Impulse(p) => p.derivative(t),
                Waveform::ExpRise(p) => p.derivative(t),
                Waveform::Ramp(p) => p.derivative(t),
            }
    }
}
