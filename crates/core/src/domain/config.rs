//! Configuration and presets for Contour
//!
//! This module provides:
//! - Configuration structs for the engine, the response view and band settings
//! - Preset system with TOML serialization
//! - Hot-reload support via file system watcher

use crate::domain::coeffs::CascadeDesign;
use crate::domain::response::{DbRange, FrequencyAxis};
use crate::domain::settings::{SettingsSnapshot, Slope};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),
}

/// Supported sample rates (Hz)
const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<u32> = 8_000..=384_000;

/// Largest accepted block size (samples per channel)
const MAX_BLOCK_SIZE: usize = 16_384;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Largest block the host will pass, in samples per channel
    pub max_block_size: usize,

    /// How cut filters are split into sections
    pub cascade_design: CascadeDesign,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            max_block_size: 512,
            cascade_design: CascadeDesign::Repeated,
        }
    }
}

/// Response view configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Horizontal resolution, one response point per pixel
    pub width_px: u32,

    pub min_freq_hz: f64,
    pub max_freq_hz: f64,

    /// Vertical dB window
    pub db_range: DbRange,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            width_px: 600,
            min_freq_hz: 20.0,
            max_freq_hz: 20_000.0,
            db_range: DbRange::FULL,
        }
    }
}

impl ViewConfig {
    /// Log frequency axis with one point per pixel
    pub fn axis(&self) -> FrequencyAxis {
        FrequencyAxis::log_spaced(self.min_freq_hz, self.max_freq_hz, self.width_px as usize)
    }
}

/// Complete Contour configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EqConfig {
    pub engine: EngineConfig,
    pub view: ViewConfig,
    pub settings: SettingsSnapshot,
}

impl EqConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration, falling back to defaults
    ///
    /// A missing file is created with the defaults. A corrupt or invalid
    /// file is copied to `*.toml.corrupt` and the defaults are returned.
    #[instrument(skip(path))]
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, creating default");
            let config = Self::default();
            if let Err(e) = config.save_to_file(path).await {
                error!(path = %path.display(), error = %e, "Failed to save default config");
            }
            return config;
        }

        match Self::load_from_file(path).await {
            Ok(config) => config,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load config, using default");

                let backup_path = path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }
                Self::default()
            }
        }
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Reject values the engine or view cannot use
    pub fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        if !SAMPLE_RATE_RANGE.contains(&engine.sample_rate) {
            return Err(ConfigError::Invalid(format!(
                "sample_rate {} is outside {}..={}",
                engine.sample_rate,
                SAMPLE_RATE_RANGE.start(),
                SAMPLE_RATE_RANGE.end()
            )));
        }
        if engine.max_block_size == 0 || engine.max_block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "max_block_size {} is outside 1..={}",
                engine.max_block_size, MAX_BLOCK_SIZE
            )));
        }

        let view = &self.view;
        if view.width_px == 0 {
            return Err(ConfigError::Invalid("view width_px must be positive".to_string()));
        }
        let freq_ok = view.min_freq_hz > 0.0 && view.min_freq_hz < view.max_freq_hz;
        if !freq_ok {
            return Err(ConfigError::Invalid(format!(
                "view frequency range {}..{} Hz is empty",
                view.min_freq_hz, view.max_freq_hz
            )));
        }
        let db_ok = view.db_range.min_db < view.db_range.max_db;
        if !db_ok {
            return Err(ConfigError::Invalid(format!(
                "view dB range {}..{} is empty",
                view.db_range.min_db, view.db_range.max_db
            )));
        }

        self.settings
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Built-in presets written by `contour init`
    pub fn factory_presets() -> Vec<(&'static str, Self)> {
        let with = |settings: SettingsSnapshot| Self {
            settings,
            ..Self::default()
        };

        vec![
            ("flat", Self::default()),
            (
                "rumble_filter",
                with(SettingsSnapshot {
                    low_cut_freq_hz: 80.0,
                    low_cut_slope: Slope::Db48,
                    ..Default::default()
                }),
            ),
            (
                "vocal_presence",
                with(SettingsSnapshot {
                    peak_freq_hz: 3000.0,
                    peak_gain_db: 4.5,
                    peak_q: 1.4,
                    low_cut_freq_hz: 100.0,
                    low_cut_slope: Slope::Db24,
                    ..Default::default()
                }),
            ),
            (
                "telephone",
                with(SettingsSnapshot {
                    peak_freq_hz: 1500.0,
                    peak_gain_db: 6.0,
                    peak_q: 0.7,
                    low_cut_freq_hz: 300.0,
                    high_cut_freq_hz: 3400.0,
                    low_cut_slope: Slope::Db36,
                    high_cut_slope: Slope::Db36,
                    ..Default::default()
                }),
            ),
        ]
    }
}

/// Default preset directory
///
/// Returns `~/.config/contour/presets` on Linux,
/// `%APPDATA%\contour\presets` on Windows
pub fn default_preset_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("contour").join("presets"))
        .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
}

// ============================================================================
// PRESETS
// ============================================================================

/// File system watcher for preset hot-reload
pub struct PresetWatcher {
    _watcher: notify::RecommendedWatcher,
    preset_tx: broadcast::Sender<PathBuf>,
}

impl PresetWatcher {
    /// Watch a preset directory, creating it if needed
    pub async fn new(preset_dir: PathBuf) -> Result<Self> {
        use notify::Watcher;

        let (preset_tx, _preset_rx) = broadcast::channel(32);

        fs::create_dir_all(&preset_dir).await?;

        let tx_clone = preset_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                    ) {
                        return;
                    }
                    for path in event.paths.into_iter().filter(|p| is_preset_file(p)) {
                        // No receivers is not an error: nobody is listening yet
                        if tx_clone.receiver_count() > 0 {
                            if let Err(e) = tx_clone.send(path) {
                                error!("Failed to send preset change event: {}", e);
                            }
                        }
                    }
                }
                Err(e) => warn!("Preset watcher error: {}", e),
            }
        })?;

        watcher.watch(&preset_dir, notify::RecursiveMode::NonRecursive)?;

        info!(path = %preset_dir.display(), "Preset watcher started");

        Ok(Self {
            _watcher: watcher,
            preset_tx,
        })
    }

    /// Subscribe to preset change events (paths of changed `*.toml` files)
    pub fn subscribe(&self) -> broadcast::Receiver<PathBuf> {
        self.preset_tx.subscribe()
    }
}

fn is_preset_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}

/// Named presets stored as `<name>.toml` in one directory
#[derive(Debug, Clone)]
pub struct PresetManager {
    preset_dir: PathBuf,
}

impl PresetManager {
    pub fn new(preset_dir: PathBuf) -> Self {
        Self { preset_dir }
    }

    pub fn preset_dir(&self) -> &Path {
        &self.preset_dir
    }

    /// Path of a preset file
    ///
    /// Names containing path separators or starting with a dot are rejected.
    pub fn preset_path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && Path::new(name).file_name().is_some();
        if !valid {
            return Err(ConfigError::Invalid(format!("invalid preset name: {name:?}")));
        }
        Ok(self.preset_dir.join(format!("{}.toml", name)))
    }

    /// List all available presets
    #[instrument(skip(self))]
    pub async fn list_presets(&self) -> Result<Vec<String>> {
        let mut presets = Vec::new();

        let mut entries = fs::read_dir(&self.preset_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_preset_file(&path) {
                if let Some(name) = path.file_stem().and_then(|n| n.to_str()) {
                    presets.push(name.to_string());
                }
            }
        }

        presets.sort();
        debug!(count = presets.len(), "Listed presets");
        Ok(presets)
    }

    /// Load a preset by name
    #[instrument(skip(self))]
    pub async fn load_preset(&self, name: &str) -> Result<EqConfig> {
        let path = self.preset_path(name)?;

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        EqConfig::load_from_file(&path).await
    }

    /// Save a preset by name, replacing any existing one
    #[instrument(skip(self, config))]
    pub async fn save_preset(&self, name: &str, config: &EqConfig) -> Result<()> {
        config.validate()?;
        let path = self.preset_path(name)?;
        config.save_to_file(&path).await
    }

    /// Delete a preset by name
    #[instrument(skip(self))]
    pub async fn delete_preset(&self, name: &str) -> Result<()> {
        let path = self.preset_path(name)?;

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        fs::remove_file(&path).await?;
        info!(name, "Preset deleted");
        Ok(())
    }

    /// Check if a preset exists
    pub async fn preset_exists(&self, name: &str) -> bool {
        match self.preset_path(name) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
