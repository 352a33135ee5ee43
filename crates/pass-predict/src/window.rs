//! Simulation window derivation.

use chrono::Duration;

use crate::{MarginConfig, PassError, PassWindow, Result, SimulationWindow};

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Convert a found pass plus margins into the simulator's start time and
/// step count.
///
/// The start time is `aos - pre_margin`. The step count is the exact
/// ceiling of the covered span over the step duration, computed in integer
/// nanoseconds: a span that is an exact multiple of the step yields the
/// exact quotient, never quotient + 1. A degenerate zero-length span still
/// yields one step.
pub fn derive_window(
    pass: &PassWindow,
    margins: &MarginConfig,
    step_duration: Duration,
) -> Result<SimulationWindow> {
    let step_ns = match step_duration.num_nanoseconds() {
        Some(ns) if ns > 0 => i128::from(ns),
        _ => return Err(PassError::InvalidStepDuration(step_duration)),
    };

    let above = pass.duration();
    let above_ns =
        i128::from(above.num_seconds()) * NANOS_PER_SEC + i128::from(above.subsec_nanos());
    let covered_ns = i128::from(margins.pre_margin_s) * NANOS_PER_SEC
        + above_ns
        + i128::from(margins.post_margin_s) * NANOS_PER_SEC;

    let step_count = ((covered_ns + step_ns - 1) / step_ns).max(1) as u64;

    Ok(SimulationWindow {
        start_time: pass.aos - margins.pre_margin(),
        step_duration,
        step_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn pass_of_length(len: Duration) -> PassWindow {
        let aos: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        PassWindow {
            aos,
            los: aos + len,
            peak_instant: aos + len / 2,
            peak_elevation_deg: 42.0,
        }
    }

    fn margins(pre: u32, post: u32) -> MarginConfig {
        MarginConfig {
            pre_margin_s: pre,
            post_margin_s: post,
            search_horizon_s: 43_200,
        }
    }

    #[test]
    fn test_exact_multiple_gives_exact_quotient() {
        let pass = pass_of_length(Duration::seconds(100));

        let window = derive_window(&pass, &margins(60, 60), Duration::seconds(1)).unwrap();
        assert_eq!(window.step_count, 220);

        // 220 s / 0.4 s divides exactly in nanoseconds as well
        let window = derive_window(&pass, &margins(60, 60), Duration::milliseconds(400)).unwrap();
        assert_eq!(window.step_count, 550);
    }

    #[test]
    fn test_partial_step_rounds_up() {
        let pass = pass_of_length(Duration::seconds(100) + Duration::nanoseconds(1));

        let window = derive_window(&pass, &margins(0, 0), Duration::seconds(1)).unwrap();
        assert_eq!(window.step_count, 101);
    }

    #[test]
    fn test_start_time_is_aos_minus_pre_margin() {
        let pass = pass_of_length(Duration::seconds(600));

        let window = derive_window(&pass, &margins(60, 30), Duration::seconds(1)).unwrap();
        assert_eq!(window.start_time, pass.aos - Duration::seconds(60));
    }

    #[test]
    fn test_grazing_pass_still_gets_one_step() {
        let pass = pass_of_length(Duration::zero());

        let window = derive_window(&pass, &margins(0, 0), Duration::seconds(1)).unwrap();
        assert_eq!(window.step_count, 1);

        let window = derive_window(&pass, &margins(60, 60), Duration::seconds(1)).unwrap();
        assert_eq!(window.step_count, 120);
    }

    #[test]
    fn test_non_positive_step_duration_rejected() {
        let pass = pass_of_length(Duration::seconds(100));

        assert!(matches!(
            derive_window(&pass, &margins(60, 60), Duration::zero()),
            Err(PassError::InvalidStepDuration(_))
        ));
        assert!(matches!(
            derive_window(&pass, &margins(60, 60), Duration::seconds(-1)),
            Err(PassError::InvalidStepDuration(_))
        ));
    }
}
