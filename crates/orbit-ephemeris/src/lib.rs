//! Orbit Ephemeris Library
//!
//! TLE handling and topocentric elevation angles for a fixed ground site.
//! Wraps SGP4 propagation and the TEME -> ECEF -> ENU chain needed to answer
//! "how far above the local horizon is the satellite at time t?".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EphemerisError {
    #[error("Invalid TLE format: {0}")]
    InvalidTle(String),
    #[error("Propagation failed: {0}")]
    PropagationFailed(String),
}

pub type Result<T> = std::result::Result<T, EphemerisError>;

/// A two-line element set, optionally preceded by a name line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoLineElements {
    pub name: Option<String>,
    pub line1: String,
    pub line2: String,
}

impl TwoLineElements {
    /// Parse the 2-line or name-prefixed 3-line TLE form.
    ///
    /// Blank lines are ignored. The standard lines must carry their `"1 "`
    /// and `"2 "` prefixes; anything else is rejected before propagation is
    /// ever attempted.
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        match lines.as_slice() {
            [l1, l2] if l1.starts_with("1 ") && l2.starts_with("2 ") => Ok(Self {
                name: None,
                line1: l1.to_string(),
                line2: l2.to_string(),
            }),
            [name, l1, l2] if l1.starts_with("1 ") && l2.starts_with("2 ") => Ok(Self {
                name: Some(name.to_string()),
                line1: l1.to_string(),
                line2: l2.to_string(),
            }),
            _ => Err(EphemerisError::InvalidTle(
                "expected [name], line 1 (\"1 ...\"), line 2 (\"2 ...\")".to_string(),
            )),
        }
    }
}

/// Ground site in geodetic coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GroundSite {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub height_m: f64,
}

impl GroundSite {
    pub fn new(latitude_deg: f64, longitude_deg: f64, height_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            height_m,
        }
    }

    /// Site position in the Earth-fixed frame, km.
    pub fn ecef_km(&self) -> [f64; 3] {
        transforms::geodetic_to_ecef(self.latitude_deg, self.longitude_deg, self.height_m / 1000.0)
    }
}

/// Elevation oracle for one satellite as seen from one ground site.
///
/// The SGP4 constants are initialised once from the TLE; each call to
/// [`ElevationModel::elevation_deg`] propagates to the requested instant.
/// Safe to call repeatedly (a pass search makes hundreds to low thousands
/// of evaluations).
pub struct ElevationModel {
    constants: sgp4::Constants,
    epoch: DateTime<Utc>,
    site: GroundSite,
    site_ecef_km: [f64; 3],
}

impl ElevationModel {
    pub fn new(elements: &TwoLineElements, site: GroundSite) -> Result<Self> {
        let parsed = sgp4::Elements::from_tle(
            elements.name.clone(),
            elements.line1.as_bytes(),
            elements.line2.as_bytes(),
        )
        .map_err(|e| EphemerisError::InvalidTle(format!("{:?}", e)))?;

        let constants = sgp4::Constants::from_elements(&parsed)
            .map_err(|e| EphemerisError::PropagationFailed(format!("{:?}", e)))?;

        let epoch = DateTime::<Utc>::from_naive_utc_and_offset(parsed.datetime, Utc);

        Ok(Self {
            constants,
            epoch,
            site,
            site_ecef_km: site.ecef_km(),
        })
    }

    /// TLE epoch as a UTC instant.
    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    /// Elevation of the satellite above the site's local horizon, degrees.
    pub fn elevation_deg(&self, at: DateTime<Utc>) -> Result<f64> {
        let since_epoch = at.signed_duration_since(self.epoch);
        let nanos = since_epoch.num_nanoseconds().ok_or_else(|| {
            EphemerisError::PropagationFailed("instant too far from TLE epoch".to_string())
        })?;
        let minutes = nanos as f64 / 60e9;

        let prediction = self
            .constants
            .propagate(minutes)
            .map_err(|e| EphemerisError::PropagationFailed(format!("{:?}", e)))?;

        let sat_ecef = transforms::teme_to_ecef(prediction.position, transforms::gmst_rad(at));
        Ok(transforms::elevation_deg(
            self.site_ecef_km,
            &self.site,
            sat_ecef,
        ))
    }
}

pub mod transforms {
    //! Earth-fixed frame plumbing: WGS-84 geodetic to ECEF, sidereal time,
    //! the TEME to ECEF rotation, and the ENU decomposition for look angles.

    use super::GroundSite;
    use chrono::{DateTime, Utc};

    const WGS84_A_KM: f64 = 6378.137;
    const WGS84_E2: f64 = 0.006_694_379_990_14;

    /// Geodetic latitude/longitude (degrees) and height (km) to ECEF, km.
    pub fn geodetic_to_ecef(lat_deg: f64, lon_deg: f64, height_km: f64) -> [f64; 3] {
        let lat = lat_deg.to_radians();
        let lon = lon_deg.to_radians();
        let n = WGS84_A_KM / (1.0 - WGS84_E2 * lat.sin().powi(2)).sqrt();

        [
            (n + height_km) * lat.cos() * lon.cos(),
            (n + height_km) * lat.cos() * lon.sin(),
            (n * (1.0 - WGS84_E2) + height_km) * lat.sin(),
        ]
    }

    /// Greenwich mean sidereal time, radians in `[0, 2π)`.
    pub fn gmst_rad(at: DateTime<Utc>) -> f64 {
        // Days since J2000.0 (2000-01-01 12:00:00 UTC).
        const J2000_UNIX_S: f64 = 946_728_000.0;
        let unix_s = at.timestamp() as f64 + f64::from(at.timestamp_subsec_nanos()) * 1e-9;
        let days = (unix_s - J2000_UNIX_S) / 86_400.0;

        let hours = (18.697_374_558 + 24.065_709_824_419_08 * days).rem_euclid(24.0);
        (hours * 15.0).to_radians()
    }

    /// Rotate a TEME position into the Earth-fixed frame by the given
    /// sidereal angle.
    pub fn teme_to_ecef(position: [f64; 3], gmst: f64) -> [f64; 3] {
        let (sin_g, cos_g) = gmst.sin_cos();

        [
            position[0] * cos_g + position[1] * sin_g,
            -position[0] * sin_g + position[1] * cos_g,
            position[2],
        ]
    }

    /// Elevation of a target above the site's local horizontal plane, degrees.
    pub fn elevation_deg(site_ecef_km: [f64; 3], site: &GroundSite, sat_ecef_km: [f64; 3]) -> f64 {
        let dx = sat_ecef_km[0] - site_ecef_km[0];
        let dy = sat_ecef_km[1] - site_ecef_km[1];
        let dz = sat_ecef_km[2] - site_ecef_km[2];

        let lat = site.latitude_deg.to_radians();
        let lon = site.longitude_deg.to_radians();
        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let sin_lon = lon.sin();
        let cos_lon = lon.cos();

        // East-North-Up rotation
        let east = -sin_lon * dx + cos_lon * dy;
        let north = -sin_lat * cos_lon * dx - sin_lat * sin_lon * dy + cos_lat * dz;
        let up = cos_lat * cos_lon * dx + cos_lat * sin_lon * dy + sin_lat * dz;

        let horiz = (east * east + north * north).sqrt();
        up.atan2(horiz).to_degrees()
    }
}
