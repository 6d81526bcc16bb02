//! Filter coefficient design
//!
//! Pure functions that turn band parameters into normalized second-order
//! section coefficients:
//! - Peaking (bell) filter, RBJ cookbook bilinear design
//! - Butterworth highpass/lowpass cascades of 1 to 4 sections
//!
//! Everything here is deterministic and allocation-free, so it can run on
//! either the control thread or the audio thread. Inputs are clamped rather
//! than rejected: the functions never return NaN or infinite coefficients.

use crate::domain::settings::MAX_CUT_SECTIONS;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_1_SQRT_2, PI, TAU};
use std::ops::Deref;

/// Highest design frequency as a fraction of the sample rate
const MAX_FREQ_RATIO: f64 = 0.49;
const MIN_FREQ_HZ: f64 = 1.0;
const MIN_Q: f64 = 0.025;
const MAX_GAIN_DB: f64 = 48.0;
const FALLBACK_SAMPLE_RATE: f64 = 48_000.0;
const MIN_SAMPLE_RATE: f64 = 8.0;

/// Q of a single second-order Butterworth section
pub const BUTTERWORTH_Q: f64 = FRAC_1_SQRT_2;

// ============================================================================
// COEFFICIENT SET
// ============================================================================

/// Normalized biquad coefficients (`a0` is 1.0)
///
/// Replaced wholesale, never patched field by field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSet {
    /// Numerator coefficients
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    /// Denominator coefficients
    pub a1: f32,
    pub a2: f32,
}

impl Default for CoefficientSet {
    fn default() -> Self {
        Self::identity()
    }
}

impl CoefficientSet {
    /// Unity gain, no filtering
    pub const fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Build from raw `f64` coefficients, dividing through by `a0`
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        let inv_a0 = 1.0 / a0;
        let set = Self {
            b0: (b0 * inv_a0) as f32,
            b1: (b1 * inv_a0) as f32,
            b2: (b2 * inv_a0) as f32,
            a1: (a1 * inv_a0) as f32,
            a2: (a2 * inv_a0) as f32,
        };

        if set.is_finite() {
            set
        } else {
            Self::identity()
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }

    /// Complex response `H(e^{jω})` at `freq_hz`
    pub fn response(&self, freq_hz: f64, sample_rate: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -TAU * freq_hz / sample_rate);
        let z2 = z1 * z1;

        let num = z1 * self.b1 as f64 + z2 * self.b2 as f64 + self.b0 as f64;
        let den = z1 * self.a1 as f64 + z2 * self.a2 as f64 + 1.0;
        num / den
    }

    /// Linear magnitude `|H(e^{jω})|` at `freq_hz`
    pub fn magnitude_at(&self, freq_hz: f64, sample_rate: f64) -> f64 {
        self.response(freq_hz, sample_rate).norm()
    }
}

// ============================================================================
// CASCADE
// ============================================================================

/// How a higher-order cut filter is split into second-order sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeDesign {
    /// One Q = 1/√2 section repeated for every stage
    ///
    /// The corner sits at −3 dB per section and the response in dB is the
    /// single-section response times the section count.
    #[default]
    Repeated,
    /// Distinct per-stage poles of a true N-th order Butterworth filter
    ///
    /// −3 dB at the corner for every order.
    Butterworth,
}

/// Up to four coefficient sets, one per cascade stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeCoefficients {
    sets: [CoefficientSet; MAX_CUT_SECTIONS],
    len: usize,
}

impl Default for CascadeCoefficients {
    fn default() -> Self {
        Self {
            sets: [CoefficientSet::identity(); MAX_CUT_SECTIONS],
            len: 0,
        }
    }
}

impl CascadeCoefficients {
    fn push(&mut self, set: CoefficientSet) {
        debug_assert!(self.len < MAX_CUT_SECTIONS);
        if self.len < MAX_CUT_SECTIONS {
            self.sets[self.len] = set;
            self.len += 1;
        }
    }

    pub fn as_slice(&self) -> &[CoefficientSet] {
        &self.sets[..self.len]
    }
}

impl Deref for CascadeCoefficients {
    type Target = [CoefficientSet];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CutKind {
    Highpass,
    Lowpass,
}

// ============================================================================
// DESIGN FUNCTIONS
// ============================================================================

/// Peaking EQ (bell) coefficients
///
/// # Parameters
/// - `freq_hz`: Center frequency, clamped below Nyquist
/// - `q`: Bandwidth, clamped to a small positive minimum
/// - `gain_db`: Boost/cut in decibels, linear gain `10^(gain_db/20)`
/// - `sample_rate`: Audio sample rate in Hz
#[must_use]
pub fn peak_coefficients(freq_hz: f64, q: f64, gain_db: f64, sample_rate: f64) -> CoefficientSet {
    let sample_rate = sanitize_sample_rate(sample_rate);
    let freq = sanitize_frequency(freq_hz, sample_rate);
    let q = sanitize_q(q);
    let gain_db = finite_or(gain_db, 0.0).clamp(-MAX_GAIN_DB, MAX_GAIN_DB);

    let a = 10.0_f64.powf(gain_db / 40.0);
    let w0 = TAU * freq / sample_rate;
    let (sin_w0, cos_w0) = w0.sin_cos();
    let alpha = sin_w0 / (2.0 * q);

    CoefficientSet::normalized(
        1.0 + alpha * a,
        -2.0 * cos_w0,
        1.0 - alpha * a,
        1.0 + alpha / a,
        -2.0 * cos_w0,
        1.0 - alpha / a,
    )
}

/// Butterworth highpass split into `order / 2` sections
///
/// `order` is clamped to 2..=8 and rounded up to the next even number.
#[must_use]
pub fn highpass_cascade(
    freq_hz: f64,
    sample_rate: f64,
    order: usize,
    design: CascadeDesign,
) -> CascadeCoefficients {
    cut_cascade(CutKind::Highpass, freq_hz, sample_rate, order, design)
}

/// Butterworth lowpass split into `order / 2` sections
#[must_use]
pub fn lowpass_cascade(
    freq_hz: f64,
    sample_rate: f64,
    order: usize,
    design: CascadeDesign,
) -> CascadeCoefficients {
    cut_cascade(CutKind::Lowpass, freq_hz, sample_rate, order, design)
}

fn cut_cascade(
    kind: CutKind,
    freq_hz: f64,
    sample_rate: f64,
    order: usize,
    design: CascadeDesign,
) -> CascadeCoefficients {
    let sample_rate = sanitize_sample_rate(sample_rate);
    let freq = sanitize_frequency(freq_hz, sample_rate);
    let order = normalize_order(order);
    let sections = order / 2;

    let mut cascade = CascadeCoefficients::default();
    match design {
        CascadeDesign::Repeated => {
            let section = cut_section(kind, freq, sample_rate, BUTTERWORTH_Q);
            for _ in 0..sections {
                cascade.push(section);
            }
        }
        CascadeDesign::Butterworth => {
            for stage in 0..sections {
                let q = butterworth_stage_q(order, stage);
                cascade.push(cut_section(kind, freq, sample_rate, q));
            }
        }
    }
    cascade
}

/// Bilinear second-order highpass/lowpass with pre-warped corner
fn cut_section(kind: CutKind, freq: f64, sample_rate: f64, q: f64) -> CoefficientSet {
    let n = (PI * freq / sample_rate).tan();
    let n2 = n * n;
    let inv_q = 1.0 / q;

    let a0 = 1.0 + inv_q * n + n2;
    let a1 = 2.0 * (n2 - 1.0);
    let a2 = 1.0 - inv_q * n + n2;

    match kind {
        CutKind::Highpass => CoefficientSet::normalized(1.0, -2.0, 1.0, a0, a1, a2),
        CutKind::Lowpass => CoefficientSet::normalized(n2, 2.0 * n2, n2, a0, a1, a2),
    }
}

/// Q of stage `stage` of an even-order Butterworth filter
///
/// Pole pair angle `θ = π(2k + 1) / 2N`, `Q = 1 / (2 sin θ)`.
fn butterworth_stage_q(order: usize, stage: usize) -> f64 {
    let theta = PI * (2 * stage + 1) as f64 / (2 * order) as f64;
    1.0 / (2.0 * theta.sin())
}

fn normalize_order(order: usize) -> usize {
    let order = order.clamp(2, 2 * MAX_CUT_SECTIONS);
    order + order % 2
}

fn sanitize_sample_rate(sample_rate: f64) -> f64 {
    if sample_rate.is_finite() && sample_rate >= MIN_SAMPLE_RATE {
        sample_rate
    } else {
        FALLBACK_SAMPLE_RATE
    }
}

fn sanitize_frequency(freq_hz: f64, sample_rate: f64) -> f64 {
    let max = sample_rate * MAX_FREQ_RATIO;
    finite_or(freq_hz, max * 0.5).clamp(MIN_FREQ_HZ, max)
}

fn sanitize_q(q: f64) -> f64 {
    finite_or(q, BUTTERWORTH_Q).max(MIN_Q)
}

#[inline]
fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

// ============================================================================
// TESTS
// ============================================================================
