//! Pass Prediction Library
//!
//! Finds the next interval during which a satellite is above a ground
//! site's local horizon (AOS to LOS) and derives the simulation window
//! that brackets it: a start time and a discrete step count for the
//! event-driven simulator.
//!
//! The elevation function is treated as an opaque oracle, so the search
//! works identically against an SGP4-backed model or a synthetic profile.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod finder;
pub mod window;

pub use finder::PassFinder;
pub use window::derive_window;

/// Coarse scan step used when none is configured, seconds.
pub const DEFAULT_COARSE_STEP_S: i64 = 10;

/// Bisection iterations used when none is configured. 24 halvings of a
/// 10 s bracket land below a microsecond.
pub const DEFAULT_BISECTION_ITERS: u32 = 24;

#[derive(Error, Debug)]
pub enum PassError {
    #[error("No pass found within {horizon_s} s of {start}")]
    NotFound {
        start: DateTime<Utc>,
        horizon_s: i64,
    },
    #[error("Invalid step duration {0}, must be positive")]
    InvalidStepDuration(Duration),
    #[error("Elevation oracle failed: {0}")]
    Oracle(String),
}

pub type Result<T> = std::result::Result<T, PassError>;

/// One elevation evaluation taken during the scan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ElevationSample {
    pub instant: DateTime<Utc>,
    pub elevation_deg: f64,
}

/// A single horizon-to-horizon pass.
///
/// `aos < los`, elevation is ~0 at both endpoints and positive strictly
/// between them; the peak lies within `[aos, los]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PassWindow {
    pub aos: DateTime<Utc>,
    pub los: DateTime<Utc>,
    pub peak_instant: DateTime<Utc>,
    pub peak_elevation_deg: f64,
}

impl PassWindow {
    /// Time spent above the horizon.
    pub fn duration(&self) -> Duration {
        self.los - self.aos
    }
}

/// Margins around the pass and how far ahead to search for it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarginConfig {
    /// Seconds of simulation before AOS.
    pub pre_margin_s: u32,
    /// Seconds of simulation after LOS.
    pub post_margin_s: u32,
    /// How far past the start instant to look for a pass, seconds.
    pub search_horizon_s: u32,
}

impl MarginConfig {
    pub fn pre_margin(&self) -> Duration {
        Duration::seconds(i64::from(self.pre_margin_s))
    }

    pub fn post_margin(&self) -> Duration {
        Duration::seconds(i64::from(self.post_margin_s))
    }

    pub fn search_horizon(&self) -> Duration {
        Duration::seconds(i64::from(self.search_horizon_s))
    }
}

/// The window handed to the discrete-event simulator: where to start and
/// how many steps to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationWindow {
    pub start_time: DateTime<Utc>,
    pub step_duration: Duration,
    pub step_count: u64,
}
