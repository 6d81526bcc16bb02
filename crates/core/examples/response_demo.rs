//! Example drawing an EQ curve as text
//!
//! Run with: cargo run --package contour-core --example response_demo

use contour_core::domain::{
    gain_to_db, Channel, DbRange, MagnitudeResponse, SettingsSnapshot, Slope, StereoEngine,
    ViewConfig,
};

const ROWS: usize = 17;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("contour_core=debug,info")
        .init();

    println!("=== Contour Response Demo ===\n");

    let mut engine = StereoEngine::default();
    engine.prepare(48_000.0, 512)?;

    let handle = engine.handle();
    handle.publish(SettingsSnapshot {
        peak_freq_hz: 2500.0,
        peak_gain_db: 9.0,
        peak_q: 0.8,
        low_cut_freq_hz: 120.0,
        low_cut_slope: Slope::Db24,
        high_cut_freq_hz: 9000.0,
        high_cut_slope: Slope::Db12,
        ..Default::default()
    });

    // The next block picks up the published settings
    let mut left = vec![0.0; 64];
    let mut right = vec![0.0; 64];
    engine.process_block(&mut left, &mut right)?;

    let view = ViewConfig {
        width_px: 72,
        db_range: DbRange::FULL,
        ..Default::default()
    };
    let axis = view.axis();
    let curve = handle.response_db(axis.frequencies())?;

    let mut grid = vec![vec![' '; axis.len()]; ROWS];
    for (x, &db) in curve.iter().enumerate() {
        let y = view.db_range.to_y(db, 0.0, (ROWS - 1) as f64).round();
        if (0.0..ROWS as f64).contains(&y) {
            grid[y as usize][x] = '*';
        }
    }

    for (row, line) in grid.iter().enumerate() {
        let db = view.db_range.max_db
            - row as f64 * (view.db_range.max_db - view.db_range.min_db) / (ROWS - 1) as f64;
        println!("{:>6.1} dB |{}", db, line.iter().collect::<String>());
    }
    println!(
        "          {:<36}{:>36}",
        format!("{} Hz", axis.min_hz()),
        format!("{} Hz", axis.max_hz())
    );

    println!("\nSpot checks (live left channel):");
    let chain = engine.chain(Channel::Left);
    for freq in [50.0, 120.0, 1000.0, 2500.0, 9000.0, 16_000.0] {
        let db = gain_to_db(chain.magnitude_at(freq, 48_000.0));
        println!("   {:>7.0} Hz  {:>+7.2} dB", freq, db);
    }

    Ok(())
}
