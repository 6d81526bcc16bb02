//! One channel's signal path: low-cut → peak → high-cut
//!
//! [`ChainCoefficients`] is the value handed from coefficient derivation to
//! the chains. It holds every band's coefficients and bypass flag by value,
//! so both channels receive identical copies and nothing is shared.

use crate::domain::biquad::BiquadSection;
use crate::domain::coeffs::{
    highpass_cascade, lowpass_cascade, peak_coefficients, CascadeCoefficients, CascadeDesign,
    CoefficientSet,
};
use crate::domain::cut::CutFilterBank;
use crate::domain::response::MagnitudeResponse;
use crate::domain::settings::{SettingsSnapshot, Slope};
use serde::{Deserialize, Serialize};

/// The three bands of the equalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    LowCut,
    Peak,
    HighCut,
}

impl Band {
    /// Processing order
    pub const ALL: [Band; 3] = [Band::LowCut, Band::Peak, Band::HighCut];
}

/// Every coefficient and bypass flag of a chain, derived from one snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainCoefficients {
    pub low_cut: CascadeCoefficients,
    pub low_cut_slope: Slope,
    pub low_cut_bypassed: bool,
    pub peak: CoefficientSet,
    pub peak_bypassed: bool,
    pub high_cut: CascadeCoefficients,
    pub high_cut_slope: Slope,
    pub high_cut_bypassed: bool,
}

impl ChainCoefficients {
    /// Run the coefficient design for every band
    ///
    /// Pure and allocation-free: the audio thread may call this itself.
    pub fn derive(settings: &SettingsSnapshot, sample_rate: f64, design: CascadeDesign) -> Self {
        Self {
            low_cut: highpass_cascade(
                settings.low_cut_freq_hz as f64,
                sample_rate,
                settings.low_cut_slope.order(),
                design,
            ),
            low_cut_slope: settings.low_cut_slope,
            low_cut_bypassed: settings.low_cut_bypassed,
            peak: peak_coefficients(
                settings.peak_freq_hz as f64,
                settings.peak_q as f64,
                settings.peak_gain_db as f64,
                sample_rate,
            ),
            peak_bypassed: settings.peak_bypassed,
            high_cut: lowpass_cascade(
                settings.high_cut_freq_hz as f64,
                sample_rate,
                settings.high_cut_slope.order(),
                design,
            ),
            high_cut_slope: settings.high_cut_slope,
            high_cut_bypassed: settings.high_cut_bypassed,
        }
    }
}

/// Mono equalizer chain
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonoChain {
    low_cut: CutFilterBank,
    peak: BiquadSection,
    peak_bypassed: bool,
    high_cut: CutFilterBank,
}

impl MonoChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a full set of derived coefficients
    pub fn apply(&mut self, coeffs: &ChainCoefficients) {
        self.low_cut.configure(coeffs.low_cut_slope, &coeffs.low_cut);
        self.low_cut.set_bypassed(coeffs.low_cut_bypassed);

        self.peak.set_coefficients(coeffs.peak);
        self.peak_bypassed = coeffs.peak_bypassed;

        self.high_cut.configure(coeffs.high_cut_slope, &coeffs.high_cut);
        self.high_cut.set_bypassed(coeffs.high_cut_bypassed);
    }

    pub fn set_band_bypass(&mut self, band: Band, bypassed: bool) {
        match band {
            Band::LowCut => self.low_cut.set_bypassed(bypassed),
            Band::Peak => self.peak_bypassed = bypassed,
            Band::HighCut => self.high_cut.set_bypassed(bypassed),
        }
    }

    pub fn is_band_bypassed(&self, band: Band) -> bool {
        match band {
            Band::LowCut => self.low_cut.is_bypassed(),
            Band::Peak => self.peak_bypassed,
            Band::HighCut => self.high_cut.is_bypassed(),
        }
    }

    /// Process a block in place, band by band
    pub fn process_block(&mut self, samples: &mut [f32]) {
        self.low_cut.process_block(samples);
        if !self.peak_bypassed {
            self.peak.process_block(samples);
        }
        self.high_cut.process_block(samples);
    }

    /// Process one sample through all bands
    ///
    /// Gives bit-identical results to [`MonoChain::process_block`].
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        let mut y = self.low_cut.process_sample(x);
        if !self.peak_bypassed {
            y = self.peak.process_sample(y);
        }
        self.high_cut.process_sample(y)
    }

    pub fn low_cut(&self) -> &CutFilterBank {
        &self.low_cut
    }

    pub fn peak(&self) -> &BiquadSection {
        &self.peak
    }

    pub fn high_cut(&self) -> &CutFilterBank {
        &self.high_cut
    }

    /// Clear every delay line, keeping the coefficients
    pub fn reset(&mut self) {
        self.low_cut.reset();
        self.peak.reset();
        self.high_cut.reset();
    }
}

impl MagnitudeResponse for MonoChain {
    fn magnitude_at(&self, freq_hz: f64, sample_rate: f64) -> f64 {
        let mut magnitude = self.low_cut.magnitude_at(freq_hz, sample_rate);
        if !self.peak_bypassed {
            magnitude *= self.peak.magnitude_at(freq_hz, sample_rate);
        }
        magnitude * self.high_cut.magnitude_at(freq_hz, sample_rate)
    }
}
