//! Contour equalizer core
//!
//! Filter design, cascaded second-order sections, the stereo processing
//! engine, the lock-free coefficient handoff between the control thread and
//! the audio thread, and magnitude-response sampling for visualization.

pub mod domain;
