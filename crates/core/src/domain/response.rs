//! Magnitude response sampling for visualization
//!
//! The curve is computed from the coefficients loaded in a chain, never from
//! the parameters, so what is drawn is exactly what is heard.

use serde::{Deserialize, Serialize};

/// Lowest linear magnitude converted to dB (-120 dB)
pub const MAGNITUDE_FLOOR: f64 = 1e-6;

/// dB value returned for magnitudes at or below [`MAGNITUDE_FLOOR`]
pub const MAGNITUDE_FLOOR_DB: f64 = -120.0;

/// Anything with a linear magnitude response on the unit circle
pub trait MagnitudeResponse {
    /// Linear gain at `freq_hz`. Must not mutate filter state.
    fn magnitude_at(&self, freq_hz: f64, sample_rate: f64) -> f64;
}

/// Convert linear gain to dB, flooring near-zero and non-finite values
#[inline]
pub fn gain_to_db(linear: f64) -> f64 {
    let magnitude = linear.abs();
    if magnitude.is_nan() || magnitude <= MAGNITUDE_FLOOR {
        return MAGNITUDE_FLOOR_DB;
    }
    20.0 * magnitude.min(f64::MAX).log10()
}

/// Sample the response at each frequency, in dB
pub fn sample_magnitude_db<R>(response: &R, frequencies: &[f64], sample_rate: f64) -> Vec<f64>
where
    R: MagnitudeResponse + ?Sized,
{
    let mut out = vec![0.0; frequencies.len()];
    sample_magnitude_db_into(response, frequencies, sample_rate, &mut out);
    out
}

/// Allocation-free variant of [`sample_magnitude_db`]
///
/// Writes `min(frequencies.len(), out.len())` values.
pub fn sample_magnitude_db_into<R>(
    response: &R,
    frequencies: &[f64],
    sample_rate: f64,
    out: &mut [f64],
) where
    R: MagnitudeResponse + ?Sized,
{
    for (db, &freq) in out.iter_mut().zip(frequencies) {
        *db = gain_to_db(response.magnitude_at(freq, sample_rate));
    }
}

// ============================================================================
// FREQUENCY AXIS
// ============================================================================

/// Log-mapped frequency axis, one point per horizontal display pixel
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyAxis {
    min_hz: f64,
    max_hz: f64,
    frequencies: Vec<f64>,
}

impl FrequencyAxis {
    /// `points` frequencies spaced evenly in log frequency, ends included
    ///
    /// The bounds are swapped if given in the wrong order and clamped to at
    /// least 1 Hz.
    pub fn log_spaced(min_hz: f64, max_hz: f64, points: usize) -> Self {
        let (lo, hi) = if min_hz <= max_hz {
            (min_hz, max_hz)
        } else {
            (max_hz, min_hz)
        };
        let mut axis = Self {
            min_hz: lo.max(1.0),
            max_hz: hi.max(1.0),
            frequencies: Vec::with_capacity(points),
        };

        let last = points.saturating_sub(1).max(1) as f64;
        for i in 0..points {
            let freq = axis.frequency_at(i as f64 / last);
            axis.frequencies.push(freq);
        }
        axis
    }

    /// Audible range, 20 Hz to 20 kHz
    pub fn audible(points: usize) -> Self {
        Self::log_spaced(20.0, 20_000.0, points)
    }

    /// Frequency at a normalized position in `0.0..=1.0`
    pub fn frequency_at(&self, normalized: f64) -> f64 {
        let t = normalized.clamp(0.0, 1.0);
        self.min_hz * (self.max_hz / self.min_hz).powf(t)
    }

    /// Normalized position of a frequency, the inverse of [`Self::frequency_at`]
    pub fn position_of(&self, freq_hz: f64) -> f64 {
        let span = (self.max_hz / self.min_hz).ln();
        if span <= 0.0 {
            return 0.0;
        }
        ((freq_hz.max(self.min_hz) / self.min_hz).ln() / span).clamp(0.0, 1.0)
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn min_hz(&self) -> f64 {
        self.min_hz
    }

    pub fn max_hz(&self) -> f64 {
        self.max_hz
    }
}

// ============================================================================
// DB RANGE
// ============================================================================

/// Vertical dB window of a response view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbRange {
    pub min_db: f64,
    pub max_db: f64,
}

impl Default for DbRange {
    fn default() -> Self {
        Self::FULL
    }
}

impl DbRange {
    /// ±24 dB, the full peak gain range
    pub const FULL: DbRange = DbRange {
        min_db: -24.0,
        max_db: 24.0,
    };

    /// ±12 dB
    pub const NARROW: DbRange = DbRange {
        min_db: -12.0,
        max_db: 12.0,
    };

    /// Map a dB value linearly onto `[bottom, top]`
    ///
    /// `max_db` lands on `top` and `min_db` on `bottom`. Values outside the
    /// window are extrapolated, not clamped.
    pub fn to_y(&self, db: f64, top: f64, bottom: f64) -> f64 {
        let span = self.max_db - self.min_db;
        if span == 0.0 {
            return bottom;
        }
        bottom + (db - self.min_db) / span * (top - bottom)
    }

    pub fn contains(&self, db: f64) -> bool {
        (self.min_db..=self.max_db).contains(&db)
    }
}
