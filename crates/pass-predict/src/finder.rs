//! Coarse-scan / bisection search for the next pass.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::{
    ElevationSample, PassError, PassWindow, Result, DEFAULT_BISECTION_ITERS, DEFAULT_COARSE_STEP_S,
};

/// Scans forward from a start instant for the next AOS/LOS pair.
///
/// The coarse linear scan bounds the cost at `horizon / coarse_step`
/// evaluations and cannot miss a crossing as long as the elevation changes
/// sign at most once per coarse step; at the default 10 s step that holds
/// for every realistic LEO angular rate. Callers tracking faster
/// geometries should shrink `coarse_step` to match.
///
/// Each detected crossing is refined by bisection with a fixed iteration
/// count, so termination is guaranteed even if the oracle is noisy near
/// the horizon.
#[derive(Debug, Clone, Copy)]
pub struct PassFinder {
    pub coarse_step: Duration,
    pub bisection_iters: u32,
}

impl Default for PassFinder {
    fn default() -> Self {
        Self {
            coarse_step: Duration::seconds(DEFAULT_COARSE_STEP_S),
            bisection_iters: DEFAULT_BISECTION_ITERS,
        }
    }
}

impl PassFinder {
    pub fn new(coarse_step: Duration, bisection_iters: u32) -> Self {
        Self {
            coarse_step,
            bisection_iters,
        }
    }

    /// Find the first full pass after `start`, looking no further than
    /// `start + horizon`.
    ///
    /// `elevation` maps a UTC instant to degrees above the local horizon.
    /// Returns [`PassError::NotFound`] when the horizon is exhausted before
    /// a complete AOS/LOS pair is seen; a partial window is never returned.
    /// If the satellite is already up at `start`, that partial pass is
    /// skipped and the next full one is reported.
    pub fn find_next_pass<F, E>(
        &self,
        start: DateTime<Utc>,
        horizon: Duration,
        mut elevation: F,
    ) -> Result<PassWindow>
    where
        F: FnMut(DateTime<Utc>) -> std::result::Result<f64, E>,
        E: std::fmt::Display,
    {
        let mut eval =
            |at: DateTime<Utc>| elevation(at).map_err(|e| PassError::Oracle(e.to_string()));

        let end = start + horizon;
        let mut t = start;
        let mut prev = eval(t)?;
        let mut aos: Option<DateTime<Utc>> = None;
        let mut track: Vec<ElevationSample> = Vec::new();

        while t <= end {
            let t_next = t + self.coarse_step;
            let next = eval(t_next)?;

            if aos.is_none() && prev <= 0.0 && next > 0.0 {
                let rise = self.refine_rising(&mut eval, t, t_next)?;
                debug!("AOS refined to {}", rise);

                // samples taken before the pass must not pollute peak tracking
                track.clear();
                track.push(ElevationSample {
                    instant: rise,
                    elevation_deg: eval(rise)?,
                });
                aos = Some(rise);
            }

            if aos.is_some() && next > 0.0 {
                track.push(ElevationSample {
                    instant: t_next,
                    elevation_deg: next,
                });
            }

            if let Some(rise) = aos {
                if prev > 0.0 && next <= 0.0 {
                    let set = self.refine_falling(&mut eval, t, t_next)?;
                    debug!("LOS refined to {}", set);

                    track.push(ElevationSample {
                        instant: set,
                        elevation_deg: 0.0,
                    });

                    // highest retained sample; ties go to scan order
                    let mut peak = track[0];
                    for sample in &track[1..] {
                        if sample.elevation_deg > peak.elevation_deg {
                            peak = *sample;
                        }
                    }

                    return Ok(PassWindow {
                        aos: rise,
                        los: set,
                        peak_instant: peak.instant,
                        peak_elevation_deg: peak.elevation_deg,
                    });
                }
            }

            t = t_next;
            prev = next;
        }

        Err(PassError::NotFound {
            start,
            horizon_s: horizon.num_seconds(),
        })
    }

    /// Bisect a bracket with `elevation(lo) <= 0 < elevation(hi)` down to
    /// the rising crossing.
    fn refine_rising<G>(
        &self,
        eval: &mut G,
        mut lo: DateTime<Utc>,
        mut hi: DateTime<Utc>,
    ) -> Result<DateTime<Utc>>
    where
        G: FnMut(DateTime<Utc>) -> Result<f64>,
    {
        for _ in 0..self.bisection_iters {
            let mid = lo + (hi - lo) / 2;
            if eval(mid)? > 0.0 {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        Ok(hi)
    }

    /// Bisect a bracket with `elevation(lo) > 0 >= elevation(hi)` down to
    /// the falling crossing.
    fn refine_falling<G>(
        &self,
        eval: &mut G,
        mut lo: DateTime<Utc>,
        mut hi: DateTime<Utc>,
    ) -> Result<DateTime<Utc>>
    where
        G: FnMut(DateTime<Utc>) -> Result<f64>,
    {
        for _ in 0..self.bisection_iters {
            let mid = lo + (hi - lo) / 2;
            if eval(mid)? > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::convert::Infallible;
    use std::f64::consts::TAU;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn elapsed_s(at: DateTime<Utc>, since: DateTime<Utc>) -> f64 {
        (at - since).num_nanoseconds().unwrap() as f64 * 1e-9
    }

    fn seconds_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
        (b - a).num_nanoseconds().unwrap() as f64 * 1e-9
    }

    #[test]
    fn test_triangle_crossing_accuracy() {
        // zeros at +300 s and +900 s, apex 5.0 deg at +600 s
        let start = t0();
        let oracle = move |at| {
            let s = elapsed_s(at, start);
            Ok::<_, Infallible>(5.0 - (s - 600.0).abs() / 60.0)
        };

        let pass = PassFinder::default()
            .find_next_pass(start, Duration::hours(1), oracle)
            .unwrap();

        assert!(seconds_between(start + Duration::seconds(300), pass.aos).abs() < 1e-3);
        assert!(seconds_between(start + Duration::seconds(900), pass.los).abs() < 1e-3);
        assert!(seconds_between(start + Duration::seconds(600), pass.peak_instant).abs() <= 10.0);
        assert!(pass.peak_elevation_deg > 4.99);
    }

    #[test]
    fn test_sine_scenario_masked_horizon() {
        // 90 minute orbit masked 2 deg below the horizon; analytic
        // crossings at 5400 * asin(0.2) / TAU and its mirror.
        let start = t0();
        let oracle = move |at| {
            let s = elapsed_s(at, start);
            Ok::<_, Infallible>(10.0 * (TAU * s / 5400.0).sin() - 2.0)
        };

        let pass = PassFinder::default()
            .find_next_pass(start, Duration::hours(12), oracle)
            .unwrap();

        let aos_s = 5400.0 * (0.2f64).asin() / TAU;
        let los_s = 5400.0 * (std::f64::consts::PI - (0.2f64).asin()) / TAU;
        assert!((elapsed_s(pass.aos, start) - aos_s).abs() < 1e-3);
        assert!((elapsed_s(pass.los, start) - los_s).abs() < 1e-3);

        // only the first pass of the 12 h horizon is reported
        assert!(elapsed_s(pass.los, start) < 5400.0);

        // peak 8.0 deg at the quarter period
        assert!(seconds_between(start + Duration::seconds(1350), pass.peak_instant).abs() <= 10.0);
        assert!((pass.peak_elevation_deg - 8.0).abs() < 0.01);

        // ceil(60 + (LOS - AOS) + 60) at a 1 s step
        let margins = crate::MarginConfig {
            pre_margin_s: 60,
            post_margin_s: 60,
            search_horizon_s: 43_200,
        };
        let window = crate::derive_window(&pass, &margins, Duration::seconds(1)).unwrap();
        assert_eq!(window.step_count, 2474);
        assert_eq!(window.start_time, pass.aos - Duration::seconds(60));
    }

    #[test]
    fn test_never_visible_is_not_found() {
        let start = t0();
        let result = PassFinder::default().find_next_pass(start, Duration::hours(1), |_| {
            Ok::<_, Infallible>(-5.0)
        });

        match result {
            Err(PassError::NotFound { start: s, horizon_s }) => {
                assert_eq!(s, start);
                assert_eq!(horizon_s, 3600);
            }
            other => panic!("expected NotFound, got {:?}", other.map(|p| p.aos)),
        }
    }

    #[test]
    fn test_rise_without_set_is_not_found() {
        // rises at +900 s and stays up past the 1000 s horizon
        let start = t0();
        let result = PassFinder::default().find_next_pass(start, Duration::seconds(1000), move |at| {
            Ok::<_, Infallible>((elapsed_s(at, start) - 900.0) / 10.0)
        });

        assert!(matches!(result, Err(PassError::NotFound { .. })));
    }

    #[test]
    fn test_mid_pass_start_skips_to_next_full_pass() {
        // same orbit as the scenario test, phase-shifted so the satellite
        // is already 7 deg up at the start instant
        let start = t0();
        let oracle = move |at| {
            let s = elapsed_s(at, start);
            Ok::<_, Infallible>(10.0 * (TAU * (s + 1000.0) / 5400.0).sin() - 2.0)
        };

        let pass = PassFinder::default()
            .find_next_pass(start, Duration::hours(12), oracle)
            .unwrap();

        let aos_s = 5400.0 * (0.2f64).asin() / TAU + 5400.0 - 1000.0;
        let los_s = 5400.0 * (std::f64::consts::PI - (0.2f64).asin()) / TAU + 5400.0 - 1000.0;
        assert!((elapsed_s(pass.aos, start) - aos_s).abs() < 1e-3);
        assert!((elapsed_s(pass.los, start) - los_s).abs() < 1e-3);
    }

    #[test]
    fn test_flat_peak_resolves_to_first_sample() {
        // rectangular profile: every in-pass sample reads 1.0, so the
        // refined AOS sample itself must win the tie
        let start = t0();
        let oracle = move |at| {
            let s = elapsed_s(at, start);
            Ok::<_, Infallible>(if (200.0..400.0).contains(&s) { 1.0 } else { -1.0 })
        };

        let pass = PassFinder::default()
            .find_next_pass(start, Duration::hours(1), oracle)
            .unwrap();

        assert_eq!(pass.peak_instant, pass.aos);
        assert!((pass.peak_elevation_deg - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_oracle_error_propagates() {
        let start = t0();
        let result = PassFinder::default()
            .find_next_pass(start, Duration::hours(1), |_| Err::<f64, _>("sgp4 blew up"));

        match result {
            Err(PassError::Oracle(msg)) => assert!(msg.contains("sgp4 blew up")),
            other => panic!("expected Oracle error, got {:?}", other.map(|p| p.aos)),
        }
    }
}
