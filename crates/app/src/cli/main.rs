//! Contour CLI Application

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use contour_core::domain::{
    default_preset_dir, gain_to_db, Channel, EqConfig, MagnitudeResponse, PresetManager,
    PresetWatcher, SettingsSnapshot, StereoEngine,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "contour")]
#[command(about = "Three-band parametric equalizer", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Preset directory (defaults to the user config directory)
    #[arg(long, global = true)]
    preset_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Where the settings come from
#[derive(clap::Args)]
struct Source {
    /// Preset name in the preset directory
    #[arg(short, long, conflicts_with = "config")]
    preset: Option<String>,

    /// Path to a config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Write the factory presets to the preset directory
    Init {
        /// Overwrite existing presets
        #[arg(long)]
        force: bool,
    },

    /// List available presets
    Presets,

    /// Print the magnitude response
    Response {
        #[command(flatten)]
        source: Source,

        /// Number of log-spaced points (defaults to the view width)
        #[arg(short = 'n', long)]
        points: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run a simulated session: an audio thread processes a test signal
    /// while the control thread sweeps the peak gain
    Process {
        #[command(flatten)]
        source: Source,

        /// Length of the session in seconds
        #[arg(short, long, default_value_t = 2.0)]
        seconds: f64,

        /// Interval between parameter changes in milliseconds
        #[arg(long, default_value_t = 50)]
        update_ms: u64,
    },

    /// Print the response of a preset every time its file changes
    Watch {
        /// Preset name in the preset directory
        preset: String,
    },
}

#[derive(Serialize)]
struct ResponsePoint {
    freq_hz: f64,
    db: f64,
}

#[derive(Debug, Default)]
struct ChannelLevels {
    sum_sq_in: f64,
    sum_sq_out: f64,
    samples: usize,
}

impl ChannelLevels {
    fn accumulate(&mut self, input: &[f32], output: &[f32]) {
        self.sum_sq_in += input.iter().map(|&s| (s as f64).powi(2)).sum::<f64>();
        self.sum_sq_out += output.iter().map(|&s| (s as f64).powi(2)).sum::<f64>();
        self.samples += input.len();
    }

    fn rms_db(sum_sq: f64, samples: usize) -> f64 {
        gain_to_db((sum_sq / samples.max(1) as f64).sqrt())
    }

    fn report(&self, channel: Channel) {
        println!(
            "   {:?}: in {:>7.2} dBFS  out {:>7.2} dBFS",
            channel,
            Self::rms_db(self.sum_sq_in, self.samples),
            Self::rms_db(self.sum_sq_out, self.samples)
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    let preset_dir = match cli.preset_dir {
        Some(dir) => dir,
        None => default_preset_dir()?,
    };
    let presets = PresetManager::new(preset_dir);

    match cli.command {
        Command::Init { force } => init(&presets, force).await,
        Command::Presets => list(&presets).await,
        Command::Response {
            source,
            points,
            json,
        } => {
            let config = load(&presets, &source).await?;
            response(&config, points, json)
        }
        Command::Process {
            source,
            seconds,
            update_ms,
        } => {
            let config = load(&presets, &source).await?;
            process(config, seconds, Duration::from_millis(update_ms.max(1))).await
        }
        Command::Watch { preset } => watch(&presets, &preset).await,
    }
}

async fn load(presets: &PresetManager, source: &Source) -> anyhow::Result<EqConfig> {
    if let Some(name) = &source.preset {
        return presets
            .load_preset(name)
            .await
            .with_context(|| format!("loading preset {name}"));
    }
    if let Some(path) = &source.config {
        return EqConfig::load_from_file(path)
            .await
            .with_context(|| format!("loading {}", path.display()));
    }
    debug!("No preset or config given, using defaults");
    Ok(EqConfig::default())
}

async fn init(presets: &PresetManager, force: bool) -> anyhow::Result<()> {
    for (name, config) in EqConfig::factory_presets() {
        if !force && presets.preset_exists(name).await {
            warn!(name, "Preset exists, skipping (use --force to overwrite)");
            continue;
        }
        presets.save_preset(name, &config).await?;
        println!("wrote {}", presets.preset_path(name)?.display());
    }
    Ok(())
}

async fn list(presets: &PresetManager) -> anyhow::Result<()> {
    let names = presets
        .list_presets()
        .await
        .with_context(|| format!("reading {}", presets.preset_dir().display()))?;

    if names.is_empty() {
        println!("No presets in {} (run `contour init`)", presets.preset_dir().display());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn response(config: &EqConfig, points: Option<usize>, json: bool) -> anyhow::Result<()> {
    let sample_rate = config.engine.sample_rate as f64;
    let mut engine = StereoEngine::new(config.engine.cascade_design);
    engine.prepare(sample_rate, config.engine.max_block_size)?;
    engine.apply_settings(&config.settings);
    let handle = engine.handle();

    let mut view = config.view.clone();
    if let Some(points) = points {
        view.width_px = u32::try_from(points).context("too many points")?;
    }
    let axis = view.axis();
    let curve = handle.response_db(axis.frequencies())?;

    if json {
        let points: Vec<ResponsePoint> = axis
            .frequencies()
            .iter()
            .zip(&curve)
            .map(|(&freq_hz, &db)| ResponsePoint { freq_hz, db })
            .collect();
        println!("{}", serde_json::to_string_pretty(&points)?);
    } else {
        println!("{:>10}  {:>8}", "Hz", "dB");
        for (freq, db) in axis.frequencies().iter().zip(&curve) {
            println!("{:>10.1}  {:>+8.2}", freq, db);
        }
    }
    Ok(())
}

/// Mix of a low, mid and high tone, 90° apart between channels
fn test_signal(frame: usize, sample_rate: f64, channel: Channel) -> f32 {
    let t = frame as f64 / sample_rate;
    let phase = match channel {
        Channel::Left => 0.0,
        Channel::Right => std::f64::consts::FRAC_PI_2,
    };
    [(60.0, 0.3), (1000.0, 0.3), (10_000.0, 0.3)]
        .iter()
        .map(|&(freq, amp)| amp * (std::f64::consts::TAU * freq * t + phase).sin())
        .sum::<f64>() as f32
}

async fn process(config: EqConfig, seconds: f64, update_every: Duration) -> anyhow::Result<()> {
    if !(seconds.is_finite() && seconds > 0.0) {
        bail!("--seconds must be positive");
    }

    let sample_rate = config.engine.sample_rate as f64;
    let block = config.engine.max_block_size;
    let total_frames = (seconds * sample_rate) as usize;

    let mut engine = StereoEngine::new(config.engine.cascade_design);
    engine.apply_settings(&config.settings);
    engine.prepare(sample_rate, block)?;
    let handle = engine.handle();

    info!(
        "Simulating {:.2}s at {} Hz in blocks of {}",
        seconds, sample_rate, block
    );

    // Audio thread: paced like a device callback
    let audio = tokio::task::spawn_blocking(move || -> anyhow::Result<[ChannelLevels; 2]> {
        let block_period = Duration::from_secs_f64(block as f64 / sample_rate);
        let mut levels: [ChannelLevels; 2] = Default::default();
        let mut inputs = [vec![0.0f32; block], vec![0.0f32; block]];
        let mut left = vec![0.0f32; block];
        let mut right = vec![0.0f32; block];

        let mut frame = 0;
        while frame < total_frames {
            let len = block.min(total_frames - frame);
            for channel in Channel::ALL {
                for (i, sample) in inputs[channel.index()][..len].iter_mut().enumerate() {
                    *sample = test_signal(frame + i, sample_rate, channel);
                }
            }
            left[..len].copy_from_slice(&inputs[0][..len]);
            right[..len].copy_from_slice(&inputs[1][..len]);

            engine.process_block(&mut left[..len], &mut right[..len])?;

            levels[0].accumulate(&inputs[0][..len], &left[..len]);
            levels[1].accumulate(&inputs[1][..len], &right[..len]);
            frame += len;
            std::thread::sleep(block_period);
        }
        Ok(levels)
    });

    // Control thread: sweep the peak gain until the session ends
    let base = config.settings;
    let mut step = 0u32;
    while !audio.is_finished() {
        tokio::time::sleep(update_every).await;
        let gain = ((step as f32 * 0.2).sin() * 12.0).clamp(-24.0, 24.0);
        handle.publish(SettingsSnapshot {
            peak_gain_db: gain,
            ..base
        });
        step += 1;
    }

    let levels = audio.await.context("audio thread panicked")??;

    println!("Session: {:.2}s, {} parameter updates", seconds, step);
    println!(
        "   published generation {}, applied generation {}",
        handle.published_generation(),
        handle.applied_generation()
    );
    for channel in Channel::ALL {
        levels[channel.index()].report(channel);
    }
    Ok(())
}

async fn watch(presets: &PresetManager, name: &str) -> anyhow::Result<()> {
    let path = presets.preset_path(name)?;
    let watcher = PresetWatcher::new(presets.preset_dir().to_path_buf()).await?;
    let mut changes = watcher.subscribe();

    print_summary(presets, name).await;
    info!(path = %path.display(), "Watching preset, Ctrl-C to stop");

    loop {
        tokio::select! {
            changed = changes.recv() => match changed {
                Ok(changed) if same_file(&changed, &path) => {
                    print_summary(presets, name).await;
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Watcher lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    a.file_name() == b.file_name()
}

async fn print_summary(presets: &PresetManager, name: &str) {
    let config = match presets.load_preset(name).await {
        Ok(config) => config,
        Err(e) => {
            warn!("Could not load preset {name}: {e}");
            return;
        }
    };

    let sample_rate = config.engine.sample_rate as f64;
    let mut engine = StereoEngine::new(config.engine.cascade_design);
    engine.apply_settings(&config.settings);
    if let Err(e) = engine.prepare(sample_rate, config.engine.max_block_size) {
        warn!("Could not prepare engine for preset {name}: {e}");
        return;
    }

    let chain = engine.chain(Channel::Left);
    let spots: Vec<String> = [30.0, 100.0, 300.0, 1000.0, 3000.0, 10_000.0]
        .iter()
        .map(|&freq| {
            let db = gain_to_db(chain.magnitude_at(freq, sample_rate));
            format!("{freq:.0} Hz {db:+.1} dB")
        })
        .collect();
    println!("{name}: {}", spots.join(" | "));
}
