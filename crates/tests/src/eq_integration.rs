//! Integration tests for the equalizer engine
//!
//! These tests drive the engine the way a host does: prepare, publish
//! settings from a control thread, process blocks, and compare the audible
//! result with the drawn response.

use contour_core::domain::{
    gain_to_db, highpass_cascade, peak_coefficients, sample_magnitude_db, CascadeDesign, Channel,
    ChainCoefficients, EqConfig, EqError, FrequencyAxis, MagnitudeResponse, MonoChain,
    PresetManager, SettingsSnapshot, Slope, StereoEngine,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const SAMPLE_RATE: f64 = 44_100.0;
const BLOCK: usize = 256;

fn generate_sine_wave(frequency: f64, sample_rate: f64, samples: usize) -> Vec<f32> {
    (0..samples)
        .map(|i| (std::f64::consts::TAU * frequency * i as f64 / sample_rate).sin() as f32)
        .collect()
}

fn rms(buffer: &[f32]) -> f64 {
    let sum_sq: f64 = buffer.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / buffer.len() as f64).sqrt()
}

fn prepared(design: CascadeDesign) -> StereoEngine {
    let mut engine = StereoEngine::new(design);
    engine.prepare(SAMPLE_RATE, BLOCK).unwrap();
    engine
}

/// Run a mono signal through both channels block by block
fn run(engine: &mut StereoEngine, input: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let mut left = input.to_vec();
    let mut right = input.to_vec();
    for (l, r) in left.chunks_mut(BLOCK).zip(right.chunks_mut(BLOCK)) {
        engine.process_block(l, r).unwrap();
    }
    (left, right)
}

fn db_at(chain: &MonoChain, freq: f64) -> f64 {
    gain_to_db(chain.magnitude_at(freq, SAMPLE_RATE))
}

// ============================================================================
// REFERENCE SCENARIOS
// ============================================================================

#[test]
fn test_peak_scenario() {
    let mut engine = prepared(CascadeDesign::Repeated);
    engine.apply_settings(&SettingsSnapshot {
        peak_freq_hz: 1000.0,
        peak_gain_db: 12.0,
        peak_q: 1.0,
        ..Default::default()
    });

    let chain = engine.chain(Channel::Left);
    assert!((db_at(chain, 1000.0) - 12.0).abs() < 0.1);
    // Default cut corners sit at 20 Hz and 20 kHz, so compare against
    // the chain with the peak flattened
    let mut flat = chain.clone();
    flat.set_band_bypass(contour_core::domain::Band::Peak, true);
    for freq in [20.0, 20_000.0] {
        assert!((db_at(chain, freq) - db_at(&flat, freq)).abs() < 0.1);
    }
}

#[test]
fn test_peak_alone_is_flat_at_band_edges() {
    let coeffs = peak_coefficients(1000.0, 1.0, 12.0, SAMPLE_RATE);
    for freq in [20.0, 20_000.0] {
        assert!(gain_to_db(coeffs.magnitude_at(freq, SAMPLE_RATE)).abs() < 0.1);
    }
}

#[test]
fn test_low_cut_scenario_repeated_sections() {
    let single = highpass_cascade(1000.0, SAMPLE_RATE, 2, CascadeDesign::Repeated);
    let single_db_250 = gain_to_db(single[0].magnitude_at(250.0, SAMPLE_RATE));

    let mut engine = prepared(CascadeDesign::Repeated);
    engine.apply_settings(&SettingsSnapshot {
        low_cut_freq_hz: 1000.0,
        low_cut_slope: Slope::Db12,
        high_cut_bypassed: true,
        peak_bypassed: true,
        ..Default::default()
    });
    let chain = engine.chain(Channel::Left);
    assert!((db_at(chain, 1000.0) + 3.0).abs() < 0.1);
    assert!((db_at(chain, 250.0) + 24.0).abs() < 0.5);

    engine.apply_settings(&SettingsSnapshot {
        low_cut_freq_hz: 1000.0,
        low_cut_slope: Slope::Db48,
        high_cut_bypassed: true,
        peak_bypassed: true,
        ..Default::default()
    });
    let chain = engine.chain(Channel::Left);
    assert_eq!(chain.low_cut().active_sections(), 4);
    assert!((db_at(chain, 250.0) - 4.0 * single_db_250).abs() < 1e-6);
}

#[test]
fn test_low_cut_scenario_butterworth_sections() {
    let mut engine = prepared(CascadeDesign::Butterworth);
    engine.apply_settings(&SettingsSnapshot {
        low_cut_freq_hz: 1000.0,
        low_cut_slope: Slope::Db48,
        high_cut_bypassed: true,
        peak_bypassed: true,
        ..Default::default()
    });

    let chain = engine.chain(Channel::Left);
    // True 8th-order Butterworth: still -3 dB at the corner
    assert!((db_at(chain, 1000.0) + 3.01).abs() < 0.05);
    let bank = chain.low_cut();
    let first = bank.section(0).unwrap().coefficients();
    let last = bank.section(3).unwrap().coefficients();
    assert_ne!(first, last);
}

#[test]
fn test_all_bands_bypassed_is_bit_exact() {
    let mut engine = prepared(CascadeDesign::Repeated);
    engine.apply_settings(&SettingsSnapshot {
        peak_gain_db: 24.0,
        low_cut_freq_hz: 5000.0,
        high_cut_freq_hz: 200.0,
        low_cut_slope: Slope::Db48,
        high_cut_slope: Slope::Db48,
        low_cut_bypassed: true,
        high_cut_bypassed: true,
        peak_bypassed: true,
        ..Default::default()
    });

    let input = generate_sine_wave(440.0, SAMPLE_RATE, BLOCK * 4);
    let (left, right) = run(&mut engine, &input);

    assert_eq!(left, input);
    assert_eq!(right, input);
}

// ============================================================================
// WHAT YOU SEE IS WHAT YOU HEAR
// ============================================================================

#[test]
fn test_drawn_curve_matches_measured_gain() {
    let settings = SettingsSnapshot {
        peak_freq_hz: 2000.0,
        peak_gain_db: -9.0,
        peak_q: 2.0,
        low_cut_freq_hz: 100.0,
        low_cut_slope: Slope::Db24,
        high_cut_freq_hz: 8000.0,
        high_cut_slope: Slope::Db12,
        ..Default::default()
    };

    let mut engine = prepared(CascadeDesign::Repeated);
    let handle = engine.handle();
    handle.publish(settings);

    // Warm-up block applies the update
    let mut warm_left = vec![0.0; BLOCK];
    let mut warm_right = vec![0.0; BLOCK];
    engine.process_block(&mut warm_left, &mut warm_right).unwrap();

    for freq in [300.0, 2000.0, 5000.0] {
        engine.reset();
        let input = generate_sine_wave(freq, SAMPLE_RATE, 44_100);
        let (left, _) = run(&mut engine, &input);

        // Skip the first quarter second of transient
        let measured = gain_to_db(rms(&left[11_025..]) / rms(&input[11_025..]));
        let drawn = handle.response_db(&[freq]).unwrap()[0];
        assert!(
            (measured - drawn).abs() < 0.1,
            "{freq} Hz: measured {measured:.3} dB, drawn {drawn:.3} dB"
        );
    }
}

#[test]
fn test_response_is_deterministic() {
    let mut engine = prepared(CascadeDesign::Butterworth);
    engine.apply_settings(&SettingsSnapshot {
        peak_gain_db: 6.0,
        high_cut_freq_hz: 6000.0,
        high_cut_slope: Slope::Db36,
        ..Default::default()
    });

    let axis = FrequencyAxis::audible(600);
    let chain = engine.chain(Channel::Right);
    let first = sample_magnitude_db(chain, axis.frequencies(), SAMPLE_RATE);
    let second = sample_magnitude_db(chain, axis.frequencies(), SAMPLE_RATE);

    assert_eq!(first, second);
    assert!(first.iter().all(|db| db.is_finite()));
}

// ============================================================================
// STEREO
// ============================================================================

#[test]
fn test_interleaved_equals_planar() {
    let settings = SettingsSnapshot {
        peak_freq_hz: 400.0,
        peak_gain_db: 5.0,
        low_cut_freq_hz: 60.0,
        low_cut_slope: Slope::Db36,
        ..Default::default()
    };
    let mut planar = prepared(CascadeDesign::Repeated);
    let mut interleaved = prepared(CascadeDesign::Repeated);
    planar.apply_settings(&settings);
    interleaved.apply_settings(&settings);

    let left_in = generate_sine_wave(100.0, SAMPLE_RATE, BLOCK);
    let right_in = generate_sine_wave(3000.0, SAMPLE_RATE, BLOCK);

    let mut frames: Vec<f32> = left_in
        .iter()
        .zip(&right_in)
        .flat_map(|(&l, &r)| [l, r])
        .collect();
    interleaved.process_interleaved(&mut frames).unwrap();

    let mut left = left_in.clone();
    let mut right = right_in.clone();
    planar.process_block(&mut left, &mut right).unwrap();

    let (l, r): (Vec<f32>, Vec<f32>) = frames.chunks_exact(2).map(|f| (f[0], f[1])).unzip();
    assert_eq!(l, left);
    assert_eq!(r, right);
}

#[test]
fn test_channels_do_not_share_state() {
    let mut engine = prepared(CascadeDesign::Repeated);
    engine.apply_settings(&SettingsSnapshot {
        peak_gain_db: 12.0,
        ..Default::default()
    });

    // Loud left, silent right: right must stay silent
    let mut left = generate_sine_wave(750.0, SAMPLE_RATE, BLOCK);
    let mut right = vec![0.0; BLOCK];
    engine.process_block(&mut left, &mut right).unwrap();
    assert!(right.iter().all(|&s| s == 0.0));
}

#[test]
fn test_errors_leave_buffers_untouched() {
    let mut engine = StereoEngine::default();
    let input = generate_sine_wave(440.0, SAMPLE_RATE, 32);
    let mut left = input.clone();
    let mut right = input.clone();

    assert_eq!(
        engine.process_block(&mut left, &mut right),
        Err(EqError::NotPrepared)
    );

    engine.prepare(SAMPLE_RATE, 16).unwrap();
    assert_eq!(
        engine.process_block(&mut left, &mut right),
        Err(EqError::BlockTooLarge { len: 32, max: 16 })
    );
    assert_eq!(left, input);
    assert_eq!(right, input);
}

// ============================================================================
// CROSS-THREAD HANDOFF
// ============================================================================

#[test]
fn test_two_thread_session_converges_to_last_update() {
    let mut engine = prepared(CascadeDesign::Repeated);
    let handle = engine.handle();
    let stop = Arc::new(AtomicBool::new(false));

    let audio = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let input = generate_sine_wave(1000.0, SAMPLE_RATE, BLOCK);
            let mut left = vec![0.0; BLOCK];
            let mut right = vec![0.0; BLOCK];
            let mut blocks = 0usize;
            while !stop.load(Ordering::Acquire) {
                left.copy_from_slice(&input);
                right.copy_from_slice(&input);
                engine.process_block(&mut left, &mut right).unwrap();
                assert!(left.iter().chain(&right).all(|s| s.is_finite()));
                blocks += 1;
                thread::yield_now();
            }
            // One more block picks up anything published after the last one
            engine.process_block(&mut left, &mut right).unwrap();
            (engine, blocks)
        })
    };

    let mut last = SettingsSnapshot::default();
    for step in 0..500 {
        last = SettingsSnapshot {
            peak_gain_db: (step % 49) as f32 - 24.0,
            peak_freq_hz: 200.0 + step as f32 * 10.0,
            low_cut_slope: Slope::from_index(step % 4),
            ..Default::default()
        };
        handle.publish(last);
        if step % 50 == 0 {
            thread::yield_now();
        }
    }
    stop.store(true, Ordering::Release);

    let (engine, blocks) = audio.join().unwrap();
    assert!(blocks > 0);
    assert!(!handle.is_pending());
    assert_eq!(handle.applied_generation(), 500);
    assert_eq!(*engine.settings(), last);
    assert_eq!(handle.settings(), last);

    // Live coefficients equal a fresh derivation of the final snapshot
    let expected = ChainCoefficients::derive(&last, SAMPLE_RATE, CascadeDesign::Repeated);
    let mut reference = MonoChain::new();
    reference.apply(&expected);
    for channel in Channel::ALL {
        assert_eq!(
            engine.chain(channel).peak().coefficients(),
            reference.peak().coefficients()
        );
        assert_eq!(
            engine.chain(channel).low_cut().active_sections(),
            last.low_cut_slope.sections()
        );
    }
}

// ============================================================================
// PRESETS
// ============================================================================

#[tokio::test]
async fn test_preset_round_trip_drives_engine() {
    let temp_dir = TempDir::new().unwrap();
    let manager = PresetManager::new(temp_dir.path().to_path_buf());

    for (name, config) in EqConfig::factory_presets() {
        manager.save_preset(name, &config).await.unwrap();
    }
    let names = manager.list_presets().await.unwrap();
    assert_eq!(names.len(), EqConfig::factory_presets().len());

    let config = manager.load_preset("telephone").await.unwrap();
    let mut engine = StereoEngine::new(config.engine.cascade_design);
    engine.apply_settings(&config.settings);
    engine
        .prepare(config.engine.sample_rate as f64, config.engine.max_block_size)
        .unwrap();

    let chain = engine.chain(Channel::Left);
    let rate = config.engine.sample_rate as f64;
    let band = gain_to_db(chain.magnitude_at(1500.0, rate));
    let below = gain_to_db(chain.magnitude_at(60.0, rate));
    let above = gain_to_db(chain.magnitude_at(15_000.0, rate));
    assert!(band > 0.0);
    assert!(below < -30.0);
    assert!(above < -30.0);
}

// ============================================================================
// PROPERTIES
// ============================================================================

fn any_slope() -> impl Strategy<Value = Slope> {
    (0usize..4).prop_map(Slope::from_index)
}

fn any_settings() -> impl Strategy<Value = SettingsSnapshot> {
    (
        (20.0f32..20_000.0, -24.0f32..24.0, 0.1f32..10.0),
        (20.0f32..20_000.0, 20.0f32..20_000.0),
        (any_slope(), any_slope()),
        (any::<bool>(), any::<bool>(), any::<bool>()),
    )
        .prop_map(|(peak, cuts, slopes, bypass)| SettingsSnapshot {
            peak_freq_hz: peak.0,
            peak_gain_db: peak.1,
            peak_q: peak.2,
            low_cut_freq_hz: cuts.0,
            high_cut_freq_hz: cuts.1,
            low_cut_slope: slopes.0,
            high_cut_slope: slopes.1,
            low_cut_bypassed: bypass.0,
            high_cut_bypassed: bypass.1,
            peak_bypassed: bypass.2,
        })
}

proptest! {
    #[test]
    fn prop_valid_settings_give_finite_output(settings in any_settings()) {
        let mut engine = prepared(CascadeDesign::Repeated);
        engine.apply_settings(&settings);

        let input = generate_sine_wave(997.0, SAMPLE_RATE, BLOCK);
        let (left, right) = run(&mut engine, &input);
        prop_assert!(left.iter().chain(&right).all(|s| s.is_finite()));

        let axis = FrequencyAxis::audible(64);
        let curve = sample_magnitude_db(engine.chain(Channel::Left), axis.frequencies(), SAMPLE_RATE);
        prop_assert!(curve.iter().all(|db| db.is_finite()));
    }

    #[test]
    fn prop_stereo_chains_always_match(settings in any_settings()) {
        let mut engine = prepared(CascadeDesign::Butterworth);
        engine.apply_settings(&settings);
        prop_assert_eq!(engine.chain(Channel::Left), engine.chain(Channel::Right));
    }
}
