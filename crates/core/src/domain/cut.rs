//! Cascaded cut filter (low-cut or high-cut band)
//!
//! A fixed array of four sections plus an active count. Sections past the
//! active count are never called, so a 12 dB/oct bank costs one section and
//! a fully bypassed bank is an exact passthrough.

use crate::domain::biquad::BiquadSection;
use crate::domain::coeffs::CoefficientSet;
use crate::domain::response::MagnitudeResponse;
use crate::domain::settings::{Slope, MAX_CUT_SECTIONS};

/// Up to four cascaded biquad sections with a selectable slope
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CutFilterBank {
    sections: [BiquadSection; MAX_CUT_SECTIONS],
    active: usize,
    bypassed: bool,
}

impl CutFilterBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load coefficients for a slope
    ///
    /// Activates `slope.sections()` sections. Section `i` gets
    /// `coefficients[i]`; when fewer sets than active sections are given the
    /// last set is repeated. An empty slice leaves no section active.
    pub fn configure(&mut self, slope: Slope, coefficients: &[CoefficientSet]) {
        let Some(last) = coefficients.last() else {
            self.active = 0;
            return;
        };

        self.active = slope.sections();
        for (i, section) in self.sections[..self.active].iter_mut().enumerate() {
            section.set_coefficients(*coefficients.get(i).unwrap_or(last));
        }
    }

    /// Process samples through every active section in cascade order
    pub fn process_block(&mut self, samples: &mut [f32]) {
        if self.bypassed {
            return;
        }
        for section in &mut self.sections[..self.active] {
            section.process_block(samples);
        }
    }

    /// Process one sample through every active section
    #[inline]
    pub fn process_sample(&mut self, mut x: f32) -> f32 {
        if self.bypassed {
            return x;
        }
        for section in &mut self.sections[..self.active] {
            x = section.process_sample(x);
        }
        x
    }

    /// True if the section at `index` does not touch the signal
    pub fn is_section_bypassed(&self, index: usize) -> bool {
        self.bypassed || index >= self.active
    }

    /// Bypass the whole bank
    pub fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    /// Number of sections selected by the current slope
    pub fn active_sections(&self) -> usize {
        self.active
    }

    pub fn section(&self, index: usize) -> Option<&BiquadSection> {
        self.sections.get(index)
    }

    /// Clear the delay lines of all sections
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }
}

impl MagnitudeResponse for CutFilterBank {
    /// Product of the active section magnitudes, 1.0 when none is active
    fn magnitude_at(&self, freq_hz: f64, sample_rate: f64) -> f64 {
        if self.bypassed {
            return 1.0;
        }
        self.sections[..self.active]
            .iter()
            .map(|section| section.magnitude_at(freq_hz, sample_rate))
            .product()
    }
}
