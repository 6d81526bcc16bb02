//! Integration tests for the Contour equalizer
//!
//! The tests live in `eq_integration.rs`; run with
//! `cargo test -p contour-tests`.
