//! Lock-free settings handoff between the control and audio threads
//!
//! Performance characteristics:
//! - Lock-free on both sides, wait-free for the consumer
//! - No allocations after construction
//! - At most one pending update: newer snapshots replace older ones
//!
//! The audio thread clears the dirty state by storing the generation it
//! applied, after the new coefficients are in place. A publish that lands
//! while the audio thread is deriving keeps the handoff dirty and is picked
//! up on the next block.
//!
//! The applied snapshot itself is mirrored back to the control side through
//! a sequence lock, so every handle draws what the audio thread is running.

use crate::domain::settings::{SettingsSnapshot, Slope};
use crossbeam::queue::ArrayQueue;
use crossbeam::utils::CachePadded;
use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};

/// Pending settings plus the generation counters that track them
///
/// Shared between the threads behind an `Arc`. Any number of control
/// threads may publish; exactly one thread (the one owning the engine)
/// consumes and records applied settings.
pub struct UpdateCoordinator {
    /// Single-slot mailbox of `(generation, snapshot)`
    pending: ArrayQueue<(u64, SettingsSnapshot)>,

    /// Last generation handed to `publish`
    published: CachePadded<AtomicU64>,

    /// Last generation whose coefficients are live
    applied: CachePadded<AtomicU64>,

    /// Snapshot the live coefficients were derived from
    applied_settings: AppliedSlot,

    /// Prepared sample rate as `f64` bits, 0 until prepared
    sample_rate: CachePadded<AtomicU64>,
}

impl std::fmt::Debug for UpdateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateCoordinator")
            .field("published", &self.published_generation())
            .field("applied", &self.applied_generation())
            .field("applied_settings", &self.applied_settings())
            .field("sample_rate", &self.sample_rate())
            .finish()
    }
}

impl Default for UpdateCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateCoordinator {
    pub fn new() -> Self {
        Self {
            pending: ArrayQueue::new(1),
            published: CachePadded::new(AtomicU64::new(0)),
            applied: CachePadded::new(AtomicU64::new(0)),
            applied_settings: AppliedSlot::new(&SettingsSnapshot::default()),
            sample_rate: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Queue a snapshot for the audio thread (control side)
    ///
    /// Replaces any snapshot not yet consumed. Returns the generation the
    /// snapshot was published under. Safe to call from several threads: if
    /// a slower publisher displaces a newer snapshot, the newer one is put
    /// back, so the highest generation is always the one that ends up live.
    pub fn publish(&self, settings: SettingsSnapshot) -> u64 {
        let generation = self.published.fetch_add(1, Ordering::AcqRel) + 1;
        let mut entry = (generation, settings);
        while let Some(displaced) = self.pending.force_push(entry) {
            if displaced.0 < entry.0 {
                break;
            }
            entry = displaced;
        }
        generation
    }

    /// Take the pending snapshot, if any (audio side)
    ///
    /// Snapshots older than the applied generation are dropped. The caller
    /// must report the generation through [`Self::mark_applied`] once the
    /// coefficients derived from it are live.
    #[inline]
    pub fn take_pending(&self) -> Option<(u64, SettingsSnapshot)> {
        let applied = self.applied.load(Ordering::Acquire);
        self.pending
            .pop()
            .filter(|&(generation, _)| generation > applied)
    }

    /// Record that a generation's coefficients are in place (audio side)
    #[inline]
    pub fn mark_applied(&self, generation: u64, settings: &SettingsSnapshot) {
        self.store_applied(settings);
        self.applied.fetch_max(generation, Ordering::AcqRel);
    }

    /// Record settings loaded without going through `publish` (audio side)
    ///
    /// Single writer: only the thread that owns the engine calls this.
    #[inline]
    pub fn store_applied(&self, settings: &SettingsSnapshot) {
        self.applied_settings.store(settings);
    }

    /// Settings the live coefficients were derived from
    pub fn applied_settings(&self) -> SettingsSnapshot {
        self.applied_settings.load()
    }

    /// True while a published generation has not been applied
    pub fn is_dirty(&self) -> bool {
        self.published.load(Ordering::Acquire) != self.applied.load(Ordering::Acquire)
    }

    pub fn published_generation(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    pub fn applied_generation(&self) -> u64 {
        self.applied.load(Ordering::Acquire)
    }

    /// Record the sample rate the audio side was prepared with
    pub fn set_sample_rate(&self, sample_rate: f64) {
        self.sample_rate
            .store(sample_rate.to_bits(), Ordering::Release);
    }

    /// Prepared sample rate, `None` before the first prepare
    pub fn sample_rate(&self) -> Option<f64> {
        let rate = f64::from_bits(self.sample_rate.load(Ordering::Acquire));
        (rate.is_finite() && rate > 0.0).then_some(rate)
    }
}

// ============================================================================
// APPLIED SNAPSHOT
// ============================================================================

const WORDS: usize = 6;

/// Sequence lock over a [`SettingsSnapshot`] packed into atomic words
///
/// One writer, any number of readers. The sequence is odd while a write is
/// in progress; readers retry until they see the same even value on both
/// sides of their copy. Writes never wait.
struct AppliedSlot {
    seq: CachePadded<AtomicU64>,
    words: [AtomicU32; WORDS],
}

impl AppliedSlot {
    fn new(settings: &SettingsSnapshot) -> Self {
        Self {
            seq: CachePadded::new(AtomicU64::new(0)),
            words: pack(settings).map(AtomicU32::new),
        }
    }

    fn store(&self, settings: &SettingsSnapshot) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        for (word, value) in self.words.iter().zip(pack(settings)) {
            word.store(value, Ordering::Relaxed);
        }

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    fn load(&self) -> SettingsSnapshot {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 == 0 {
                let words: [u32; WORDS] =
                    std::array::from_fn(|i| self.words[i].load(Ordering::Relaxed));
                fence(Ordering::Acquire);
                if self.seq.load(Ordering::Relaxed) == before {
                    return unpack(words);
                }
            }
            std::hint::spin_loop();
        }
    }
}

const LOW_BYPASS: u32 = 1 << 4;
const HIGH_BYPASS: u32 = 1 << 5;
const PEAK_BYPASS: u32 = 1 << 6;

fn pack(settings: &SettingsSnapshot) -> [u32; WORDS] {
    let mut flags = settings.low_cut_slope.index() as u32
        | (settings.high_cut_slope.index() as u32) << 2;
    if settings.low_cut_bypassed {
        flags |= LOW_BYPASS;
    }
    if settings.high_cut_bypassed {
        flags |= HIGH_BYPASS;
    }
    if settings.peak_bypassed {
        flags |= PEAK_BYPASS;
    }

    [
        settings.peak_freq_hz.to_bits(),
        settings.peak_gain_db.to_bits(),
        settings.peak_q.to_bits(),
        settings.low_cut_freq_hz.to_bits(),
        settings.high_cut_freq_hz.to_bits(),
        flags,
    ]
}

fn unpack(words: [u32; WORDS]) -> SettingsSnapshot {
    let flags = words[5];
    SettingsSnapshot {
        peak_freq_hz: f32::from_bits(words[0]),
        peak_gain_db: f32::from_bits(words[1]),
        peak_q: f32::from_bits(words[2]),
        low_cut_freq_hz: f32::from_bits(words[3]),
        high_cut_freq_hz: f32::from_bits(words[4]),
        low_cut_slope: Slope::from_index((flags & 0b11) as usize),
        high_cut_slope: Slope::from_index(((flags >> 2) & 0b11) as usize),
        low_cut_bypassed: flags & LOW_BYPASS != 0,
        high_cut_bypassed: flags & HIGH_BYPASS != 0,
        peak_bypassed: flags & PEAK_BYPASS != 0,
    }
}
