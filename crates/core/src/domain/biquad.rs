//! Single second-order IIR section
//!
//! Direct Form I is used instead of Transposed Direct Form II because a
//! coefficient swap only changes the multipliers: the stored history is raw
//! input/output samples, so a new filter picks up from the same signal.

use crate::domain::coeffs::CoefficientSet;
use crate::domain::response::MagnitudeResponse;

/// Stateful biquad filter (one coefficient set plus its delay line)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BiquadSection {
    coeffs: CoefficientSet,
    // Previous input samples (x[n-1], x[n-2])
    x1: f32,
    x2: f32,
    // Previous output samples (y[n-1], y[n-2])
    y1: f32,
    y2: f32,
}

impl BiquadSection {
    /// Create a new section with given coefficients and cleared state
    pub fn new(coeffs: CoefficientSet) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Replace the coefficients
    ///
    /// The delay line is kept, so a swap mid-stream produces a transient
    /// rather than a gap.
    #[inline]
    pub fn set_coefficients(&mut self, coeffs: CoefficientSet) {
        self.coeffs = coeffs;
    }

    pub fn coefficients(&self) -> &CoefficientSet {
        &self.coeffs
    }

    /// Process a single sample
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
        let c = &self.coeffs;
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    /// Process a buffer of samples in place
    pub fn process_block(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Clear the delay line, keeping the coefficients
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

impl MagnitudeResponse for BiquadSection {
    fn magnitude_at(&self, freq_hz: f64, sample_rate: f64) -> f64 {
        self.coeffs.magnitude_at(freq_hz, sample_rate)
    }
}
