//! Simulation Configuration Store
//!
//! Reads and writes the fixed-format text records that drive the
//! discrete-event simulator: start instant, step duration, step count,
//! and the satellite ephemeris.
//!
//! Each `.dat` record is line oriented: a header line followed by one CSV
//! payload line of zero-padded integers. Writes are full-file rewrites;
//! the directory is not shared across processes.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use orbit_ephemeris::TwoLineElements;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Record file names inside the configuration directory.
pub const DATE_TIME_FILE: &str = "date-time.dat";
pub const TIME_STEP_FILE: &str = "time-step.dat";
pub const NUM_STEPS_FILE: &str = "num-steps.dat";
pub const TLE_FILE: &str = "planet.tle";

/// Header of the step count record.
pub const STEP_COUNT_HEADER: &str = "steps";

/// Width of the zero-padded step count payload; the simulator reads the
/// field at this fixed width.
pub const STEP_COUNT_WIDTH: usize = 19;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to parse {file}: {reason}")]
    Parse { file: PathBuf, reason: String },
    #[error("Invalid ephemeris: {0}")]
    Ephemeris(#[from] orbit_ephemeris::EphemerisError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// The start-time record: a header line, preserved verbatim across
/// rewrites, and a UTC instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTimeRecord {
    pub header: String,
    pub instant: DateTime<Utc>,
}

/// Store over one configuration directory.
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the simulation start instant from `date-time.dat`.
    pub fn read_start_time(&self) -> Result<StartTimeRecord> {
        let path = self.dir.join(DATE_TIME_FILE);
        let text = read(&path)?;
        let (header, payload) = split_record(&path, &text)?;

        let [year, month, day, hour, minute, second, nanosecond] =
            parse_fields::<7>(&path, payload)?;

        let instant = NaiveDate::from_ymd_opt(year as i32, month, day)
            .and_then(|d| d.and_hms_nano_opt(hour, minute, second, nanosecond))
            .map(|dt| Utc.from_utc_datetime(&dt))
            .ok_or_else(|| ConfigError::Parse {
                file: path.clone(),
                reason: format!("out-of-range date-time {:?}", payload),
            })?;

        Ok(StartTimeRecord {
            header: header.to_string(),
            instant,
        })
    }

    /// Read the simulator step duration from `time-step.dat`.
    pub fn read_step_duration(&self) -> Result<Duration> {
        let path = self.dir.join(TIME_STEP_FILE);
        let text = read(&path)?;
        let (_, payload) = split_record(&path, &text)?;

        let [hours, minutes, seconds, nanoseconds] = parse_fields::<4>(&path, payload)?;

        Ok(Duration::hours(i64::from(hours))
            + Duration::minutes(i64::from(minutes))
            + Duration::seconds(i64::from(seconds))
            + Duration::nanoseconds(i64::from(nanoseconds)))
    }

    /// Load the two-line element set from `planet.tle`.
    pub fn read_ephemeris(&self) -> Result<TwoLineElements> {
        let path = self.dir.join(TLE_FILE);
        info!("Loading ephemeris from {:?}", path);
        let text = read(&path)?;
        Ok(TwoLineElements::parse(&text)?)
    }

    /// Rewrite `date-time.dat`, keeping the record's header line.
    pub fn write_start_time(&self, record: &StartTimeRecord) -> Result<()> {
        let path = self.dir.join(DATE_TIME_FILE);
        let t = record.instant;
        let payload = format!(
            "{:04},{:02},{:02},{:02},{:02},{:02},{:09}",
            t.year(),
            t.month(),
            t.day(),
            t.hour(),
            t.minute(),
            t.second(),
            t.nanosecond()
        );
        fs::write(&path, format!("{}\n{}\n", record.header, payload))?;
        info!("Wrote start time {} to {:?}", t, path);
        Ok(())
    }

    /// Rewrite `num-steps.dat` with the fixed-width step count.
    pub fn write_step_count(&self, steps: u64) -> Result<()> {
        let path = self.dir.join(NUM_STEPS_FILE);
        fs::write(
            &path,
            format!(
                "{}\n{:0width$}\n",
                STEP_COUNT_HEADER,
                steps,
                width = STEP_COUNT_WIDTH
            ),
        )?;
        info!("Wrote {} steps to {:?}", steps, path);
        Ok(())
    }
}

fn read(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(ConfigError::NotFound(path.to_path_buf()))
        }
        Err(e) => Err(ConfigError::Io(e)),
    }
}

/// Split a record into its header and payload lines.
fn split_record<'a>(path: &Path, text: &'a str) -> Result<(&'a str, &'a str)> {
    let mut lines = text.lines();
    let header = lines.next().ok_or_else(|| ConfigError::Parse {
        file: path.to_path_buf(),
        reason: "missing header line".to_string(),
    })?;
    let payload = lines.next().ok_or_else(|| ConfigError::Parse {
        file: path.to_path_buf(),
        reason: "missing payload line".to_string(),
    })?;
    Ok((header.trim_end(), payload.trim()))
}

/// Parse a payload of exactly `N` comma separated unsigned integers.
fn parse_fields<const N: usize>(path: &Path, payload: &str) -> Result<[u32; N]> {
    let parts: Vec<&str> = payload.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(ConfigError::Parse {
            file: path.to_path_buf(),
            reason: format!(
                "expected {} comma separated fields, got {}",
                N,
                parts.len()
            ),
        });
    }

    let mut fields = [0u32; N];
    for (slot, part) in fields.iter_mut().zip(&parts) {
        *slot = part.parse().map_err(|e| ConfigError::Parse {
            file: path.to_path_buf(),
            reason: format!("bad integer {:?}: {}", part, e),
        })?;
    }
    Ok(fields)
}
