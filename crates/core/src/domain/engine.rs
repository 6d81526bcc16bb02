//! Stereo equalizer engine
//!
//! [`StereoEngine`] lives on the audio thread. It owns two [`MonoChain`]s
//! that always receive the same coefficients, and picks up settings
//! published through an [`EngineHandle`] at the start of each block.

use crate::domain::audio::{Channel, EqError, Result};
use crate::domain::chain::{ChainCoefficients, MonoChain};
use crate::domain::coeffs::CascadeDesign;
use crate::domain::handoff::UpdateCoordinator;
use crate::domain::response::sample_magnitude_db;
use crate::domain::settings::SettingsSnapshot;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Two-channel equalizer
#[derive(Debug)]
pub struct StereoEngine {
    left: MonoChain,
    right: MonoChain,
    settings: SettingsSnapshot,
    design: CascadeDesign,
    sample_rate: Option<f64>,
    max_block_size: usize,
    coordinator: Arc<UpdateCoordinator>,
}

impl Default for StereoEngine {
    fn default() -> Self {
        Self::new(CascadeDesign::default())
    }
}

impl StereoEngine {
    pub fn new(design: CascadeDesign) -> Self {
        Self {
            left: MonoChain::new(),
            right: MonoChain::new(),
            settings: SettingsSnapshot::default(),
            design,
            sample_rate: None,
            max_block_size: 0,
            coordinator: Arc::new(UpdateCoordinator::new()),
        }
    }

    /// Prepare for streaming
    ///
    /// Call before the first block and again whenever the sample rate
    /// changes. Clears filter state and re-derives coefficients for the new
    /// rate, including any settings published since the last block.
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize) -> Result<()> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(EqError::InvalidSampleRate(sample_rate));
        }
        if max_block_size == 0 {
            return Err(EqError::InvalidConfiguration(
                "max_block_size must be greater than zero".to_string(),
            ));
        }

        info!(
            "Preparing EQ engine: {} Hz, max block {} samples, {:?} cascade",
            sample_rate, max_block_size, self.design
        );

        self.sample_rate = Some(sample_rate);
        self.max_block_size = max_block_size;
        self.coordinator.set_sample_rate(sample_rate);

        let generation = self.coordinator.take_pending().map(|(generation, settings)| {
            self.settings = settings;
            generation
        });

        self.load_coefficients();
        self.reset();

        match generation {
            Some(generation) => self.coordinator.mark_applied(generation, &self.settings),
            None => self.coordinator.store_applied(&self.settings),
        }
        Ok(())
    }

    /// Derive coefficients for `settings` and load them into both channels
    ///
    /// For the thread that owns the engine. Other threads go through
    /// [`EngineHandle::publish`]. Before `prepare` the settings are only
    /// stored.
    pub fn apply_settings(&mut self, settings: &SettingsSnapshot) {
        self.settings = *settings;
        if self.sample_rate.is_some() {
            trace!("Re-deriving coefficients: {:?}", settings);
            self.load_coefficients();
        }
        self.coordinator.store_applied(&self.settings);
    }

    /// Process one block of planar stereo audio in place
    ///
    /// Applies any pending settings first. Never allocates, blocks or logs.
    /// On error the buffers are left untouched.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) -> Result<()> {
        self.check_block(left.len())?;
        if left.len() != right.len() {
            return Err(EqError::ChannelLengthMismatch {
                left: left.len(),
                right: right.len(),
            });
        }

        self.consume_pending();
        self.left.process_block(left);
        self.right.process_block(right);
        Ok(())
    }

    /// Process one block of interleaved stereo audio (`L R L R ...`) in place
    pub fn process_interleaved(&mut self, samples: &mut [f32]) -> Result<()> {
        if samples.len() % 2 != 0 {
            return Err(EqError::OddInterleavedLength(samples.len()));
        }
        self.check_block(samples.len() / 2)?;

        self.consume_pending();
        for frame in samples.chunks_exact_mut(2) {
            frame[0] = self.left.process_sample(frame[0]);
            frame[1] = self.right.process_sample(frame[1]);
        }
        Ok(())
    }

    /// Clear all delay lines, keeping coefficients
    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    pub fn chain(&self, channel: Channel) -> &MonoChain {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        }
    }

    /// Settings the live coefficients were derived from
    pub fn settings(&self) -> &SettingsSnapshot {
        &self.settings
    }

    pub fn sample_rate(&self) -> Option<f64> {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    pub fn design(&self) -> CascadeDesign {
        self.design
    }

    pub fn coordinator(&self) -> &Arc<UpdateCoordinator> {
        &self.coordinator
    }

    /// Control-side handle sharing this engine's handoff
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            coordinator: Arc::clone(&self.coordinator),
            design: self.design,
        }
    }

    fn check_block(&self, frames: usize) -> Result<()> {
        if self.sample_rate.is_none() {
            return Err(EqError::NotPrepared);
        }
        if frames > self.max_block_size {
            return Err(EqError::BlockTooLarge {
                len: frames,
                max: self.max_block_size,
            });
        }
        Ok(())
    }

    #[inline]
    fn consume_pending(&mut self) {
        if let Some((generation, settings)) = self.coordinator.take_pending() {
            self.settings = settings;
            self.load_coefficients();
            self.coordinator.mark_applied(generation, &self.settings);
        }
    }

    fn load_coefficients(&mut self) {
        let Some(sample_rate) = self.sample_rate else {
            return;
        };
        let coeffs = ChainCoefficients::derive(&self.settings, sample_rate, self.design);
        self.left.apply(&coeffs);
        self.right.apply(&coeffs);
    }
}

// ============================================================================
// CONTROL HANDLE
// ============================================================================

/// Control-thread side of a [`StereoEngine`]
///
/// Publishes settings and draws the response curve. The curve is computed
/// from a mirror chain derived from the settings the audio thread last
/// applied, with the same function, sample rate and cascade design as the
/// live chains, so its coefficients are identical to the ones being heard.
/// Published settings show up in the curve once a block has picked them up.
///
/// Handles are cheap to clone and all clones share the engine's handoff.
/// Concurrent publishes from several clones coalesce to the newest
/// generation.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    coordinator: Arc<UpdateCoordinator>,
    design: CascadeDesign,
}

impl EngineHandle {
    /// Publish new settings, returning their generation
    pub fn publish(&self, settings: SettingsSnapshot) -> u64 {
        let generation = self.coordinator.publish(settings);
        debug!("Published settings generation {}", generation);
        generation
    }

    /// Settings the live coefficients were derived from
    pub fn settings(&self) -> SettingsSnapshot {
        self.coordinator.applied_settings()
    }

    pub fn sample_rate(&self) -> Option<f64> {
        self.coordinator.sample_rate()
    }

    /// True while published settings are not yet live
    pub fn is_pending(&self) -> bool {
        self.coordinator.is_dirty()
    }

    pub fn published_generation(&self) -> u64 {
        self.coordinator.published_generation()
    }

    pub fn applied_generation(&self) -> u64 {
        self.coordinator.applied_generation()
    }

    /// Chain equivalent to one live channel
    pub fn mirror_chain(&self) -> Result<MonoChain> {
        let sample_rate = self.sample_rate().ok_or(EqError::NotPrepared)?;
        Ok(self.mirror_at(sample_rate))
    }

    /// Magnitude response in dB at each frequency
    pub fn response_db(&self, frequencies: &[f64]) -> Result<Vec<f64>> {
        let sample_rate = self.sample_rate().ok_or(EqError::NotPrepared)?;
        let chain = self.mirror_at(sample_rate);
        Ok(sample_magnitude_db(&chain, frequencies, sample_rate))
    }

    fn mirror_at(&self, sample_rate: f64) -> MonoChain {
        let mut chain = MonoChain::new();
        chain.apply(&ChainCoefficients::derive(
            &self.coordinator.applied_settings(),
            sample_rate,
            self.design,
        ));
        chain
    }
}
