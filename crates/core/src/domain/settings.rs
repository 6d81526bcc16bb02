//! Band parameters as seen by the DSP core
//!
//! A [`SettingsSnapshot`] is produced by whatever resolves host or UI
//! parameters, and is read once per coefficient refresh. It is `Copy` so it
//! can travel through the lock-free handoff as a single value.

use crate::domain::audio::{EqError, Result};
use serde::{Deserialize, Serialize};

/// Parameter ranges and defaults
///
/// Values outside these ranges are a contract violation by the producer of
/// the snapshot. The coefficient math clamps regardless.
pub mod limits {
    /// Audible frequency range for every band (Hz)
    pub const FREQ_MIN_HZ: f32 = 20.0;
    pub const FREQ_MAX_HZ: f32 = 20_000.0;

    /// Peak band gain range (dB)
    pub const PEAK_GAIN_MIN_DB: f32 = -24.0;
    pub const PEAK_GAIN_MAX_DB: f32 = 24.0;

    /// Peak band Q range
    pub const PEAK_Q_MIN: f32 = 0.1;
    pub const PEAK_Q_MAX: f32 = 10.0;

    pub const DEFAULT_LOW_CUT_HZ: f32 = 20.0;
    pub const DEFAULT_HIGH_CUT_HZ: f32 = 20_000.0;
    pub const DEFAULT_PEAK_HZ: f32 = 750.0;
    pub const DEFAULT_PEAK_GAIN_DB: f32 = 0.0;
    pub const DEFAULT_PEAK_Q: f32 = 1.0;
}

/// Maximum number of second-order sections in a cut filter
pub const MAX_CUT_SECTIONS: usize = 4;

/// Cut filter steepness
///
/// Each step adds one second-order section, i.e. 12 dB/octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slope {
    #[default]
    Db12,
    Db24,
    Db36,
    Db48,
}

impl Slope {
    pub const ALL: [Slope; 4] = [Slope::Db12, Slope::Db24, Slope::Db36, Slope::Db48];

    /// Slope for an order index, clamping anything above 3
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Slope::Db12,
            1 => Slope::Db24,
            2 => Slope::Db36,
            _ => Slope::Db48,
        }
    }

    /// Order index in `0..=3`
    pub fn index(&self) -> usize {
        match self {
            Slope::Db12 => 0,
            Slope::Db24 => 1,
            Slope::Db36 => 2,
            Slope::Db48 => 3,
        }
    }

    /// Number of cascaded second-order sections
    pub fn sections(&self) -> usize {
        self.index() + 1
    }

    /// Filter order (always even)
    pub fn order(&self) -> usize {
        2 * self.sections()
    }

    pub fn db_per_octave(&self) -> u32 {
        12 * self.sections() as u32
    }
}

/// Immutable view of every band parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsSnapshot {
    pub peak_freq_hz: f32,
    pub peak_gain_db: f32,
    pub peak_q: f32,
    pub low_cut_freq_hz: f32,
    pub high_cut_freq_hz: f32,
    pub low_cut_slope: Slope,
    pub high_cut_slope: Slope,
    pub low_cut_bypassed: bool,
    pub high_cut_bypassed: bool,
    pub peak_bypassed: bool,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            peak_freq_hz: limits::DEFAULT_PEAK_HZ,
            peak_gain_db: limits::DEFAULT_PEAK_GAIN_DB,
            peak_q: limits::DEFAULT_PEAK_Q,
            low_cut_freq_hz: limits::DEFAULT_LOW_CUT_HZ,
            high_cut_freq_hz: limits::DEFAULT_HIGH_CUT_HZ,
            low_cut_slope: Slope::Db12,
            high_cut_slope: Slope::Db12,
            low_cut_bypassed: false,
            high_cut_bypassed: false,
            peak_bypassed: false,
        }
    }
}

impl SettingsSnapshot {
    /// Copy with every field forced into its documented range
    ///
    /// Non-finite values fall back to the defaults.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let freq = |v: f32, fallback: f32| {
            finite_or(v, fallback).clamp(limits::FREQ_MIN_HZ, limits::FREQ_MAX_HZ)
        };

        Self {
            peak_freq_hz: freq(self.peak_freq_hz, limits::DEFAULT_PEAK_HZ),
            peak_gain_db: finite_or(self.peak_gain_db, limits::DEFAULT_PEAK_GAIN_DB)
                .clamp(limits::PEAK_GAIN_MIN_DB, limits::PEAK_GAIN_MAX_DB),
            peak_q: finite_or(self.peak_q, limits::DEFAULT_PEAK_Q)
                .clamp(limits::PEAK_Q_MIN, limits::PEAK_Q_MAX),
            low_cut_freq_hz: freq(self.low_cut_freq_hz, limits::DEFAULT_LOW_CUT_HZ),
            high_cut_freq_hz: freq(self.high_cut_freq_hz, limits::DEFAULT_HIGH_CUT_HZ),
            ..*self
        }
    }

    /// Check every field against its range
    pub fn validate(&self) -> Result<()> {
        check_range("peak_freq_hz", self.peak_freq_hz, limits::FREQ_MIN_HZ, limits::FREQ_MAX_HZ)?;
        check_range(
            "peak_gain_db",
            self.peak_gain_db,
            limits::PEAK_GAIN_MIN_DB,
            limits::PEAK_GAIN_MAX_DB,
        )?;
        check_range("peak_q", self.peak_q, limits::PEAK_Q_MIN, limits::PEAK_Q_MAX)?;
        check_range(
            "low_cut_freq_hz",
            self.low_cut_freq_hz,
            limits::FREQ_MIN_HZ,
            limits::FREQ_MAX_HZ,
        )?;
        check_range(
            "high_cut_freq_hz",
            self.high_cut_freq_hz,
            limits::FREQ_MIN_HZ,
            limits::FREQ_MAX_HZ,
        )?;
        Ok(())
    }
}

fn check_range(name: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(EqError::InvalidConfiguration(format!(
            "{name} = {value} is outside [{min}, {max}]"
        )))
    }
}

#[inline]
fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
