//! Domain entities and business rules

pub mod audio;
pub mod settings;
pub mod coeffs;
pub mod biquad;
pub mod cut;
pub mod chain;
pub mod response;
pub mod handoff;
pub mod engine;
pub mod config;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{Channel, EqError};
pub use biquad::BiquadSection;
pub use chain::{Band, ChainCoefficients, MonoChain};
pub use coeffs::{
    highpass_cascade, lowpass_cascade, peak_coefficients, CascadeCoefficients, CascadeDesign,
    CoefficientSet,
};
pub use config::{
    default_preset_dir, ConfigError, EngineConfig, EqConfig, PresetManager, PresetWatcher,
    ViewConfig,
};
pub use cut::CutFilterBank;
pub use engine::{EngineHandle, StereoEngine};
pub use handoff::UpdateCoordinator;
pub use response::{
    gain_to_db, sample_magnitude_db, sample_magnitude_db_into, DbRange, FrequencyAxis,
    MagnitudeResponse,
};
pub use settings::{SettingsSnapshot, Slope};
