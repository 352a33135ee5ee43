// Next Pass Setup
// Rewrites the simulator's start-time and step-count records so the next
// run brackets the satellite's next pass over the ground station.

use anyhow::{Context, Result};
use orbit_ephemeris::{ElevationModel, GroundSite};
use pass_predict::{derive_window, MarginConfig, PassFinder};
use sim_config::{ConfigStore, StartTimeRecord};
use tracing::info;

/// Ground site: Svalbard.
const GS_LAT_DEG: f64 = 78.229;
const GS_LON_DEG: f64 = 15.407;
const GS_HEIGHT_M: f64 = 0.0;

/// Margins around the pass and how far ahead to search for one.
const MARGINS: MarginConfig = MarginConfig {
    pre_margin_s: 60,
    post_margin_s: 60,
    search_horizon_s: 12 * 3600,
};

const DEFAULT_CONFIG_DIR: &str = "configuration";

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "next_pass_setup=info,sim_config=info".to_string()),
        )
        .init();

    let config_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_DIR.to_string());
    let store = ConfigStore::new(&config_dir);

    let start = store
        .read_start_time()
        .context("reading start-time record")?;
    let step_duration = store
        .read_step_duration()
        .context("reading step-duration record")?;
    let elements = store.read_ephemeris().context("reading ephemeris")?;

    let site = GroundSite::new(GS_LAT_DEG, GS_LON_DEG, GS_HEIGHT_M);
    let model =
        ElevationModel::new(&elements, site).context("initialising elevation model")?;

    info!(
        "Searching {} h ahead of {} for a pass over {:.3}N {:.3}E",
        MARGINS.search_horizon_s / 3600,
        start.instant,
        site.latitude_deg,
        site.longitude_deg
    );

    let pass = PassFinder::default().find_next_pass(
        start.instant,
        MARGINS.search_horizon(),
        |at| model.elevation_deg(at),
    )?;

    let window = derive_window(&pass, &MARGINS, step_duration)?;

    // Persist only once the whole computation has succeeded.
    store.write_start_time(&StartTimeRecord {
        header: start.header,
        instant: window.start_time,
    })?;
    store.write_step_count(window.step_count)?;

    info!("=== Next pass configured ===");
    info!("Original start : {}", start.instant);
    info!("AOS (rise)     : {}", pass.aos);
    info!(
        "Peak elev      : {:.1} deg at {}",
        pass.peak_elevation_deg, pass.peak_instant
    );
    info!("LOS (set)      : {}", pass.los);
    info!(
        "New start      : {} (= AOS - {} s)",
        window.start_time, MARGINS.pre_margin_s
    );
    info!("Step duration  : {}", window.step_duration);
    info!("Num steps      : {}", window.step_count);

    Ok(())
}
