// Respawn-time arithmetic.
//
// A respawn instant is the kill instant plus the boss interval. When a stored
// respawn has already elapsed without a new kill, the boss has gone through one
// or more unobserved cycles; `catch_up` finds the next future boundary.

use chrono::{DateTime, Duration, TimeZone};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Convert a (possibly fractional) hour count into a duration, millisecond precision.
pub fn interval_duration(interval_hours: f64) -> Duration {
    Duration::milliseconds((interval_hours * MILLIS_PER_HOUR).round() as i64)
}

/// Respawn instant for a kill. `interval_hours` must be positive; catalog
/// import rejects anything else.
pub fn compute_respawn<Tz: TimeZone>(kill_time: DateTime<Tz>, interval_hours: f64) -> DateTime<Tz> {
    kill_time + interval_duration(interval_hours)
}

/// Result of catching a stored respawn up to the present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchUp<Tz: TimeZone> {
    pub next_respawn: DateTime<Tz>,
    pub cycles_passed: i64,
}

/// Advance `respawn_time` by whole intervals until it is at or after `now`.
///
/// A respawn exactly equal to `now` is still upcoming and is returned with zero
/// cycles. Otherwise the cycle count is `ceil((now - respawn) / interval)`: the
/// full cycles from [`cycles_elapsed_if_past`], plus one unless that already
/// lands exactly on `now`.
pub fn catch_up<Tz: TimeZone>(
    respawn_time: DateTime<Tz>,
    interval_hours: f64,
    now: &DateTime<Tz>,
) -> CatchUp<Tz> {
    if respawn_time >= *now {
        return CatchUp {
            next_respawn: respawn_time,
            cycles_passed: 0,
        };
    }

    let step_ms = interval_ms(interval_hours);
    let mut cycles = cycles_elapsed_if_past(&respawn_time, interval_hours, now);
    if respawn_time.clone() + Duration::milliseconds(cycles * step_ms) < *now {
        cycles += 1;
    }
    let next_respawn = respawn_time + Duration::milliseconds(cycles * step_ms);

    CatchUp {
        next_respawn,
        cycles_passed: cycles,
    }
}

/// Number of full intervals that have fully elapsed since `respawn_time`,
/// without advancing anything. Zero when the respawn is still ahead.
pub fn cycles_elapsed_if_past<Tz: TimeZone>(
    respawn_time: &DateTime<Tz>,
    interval_hours: f64,
    now: &DateTime<Tz>,
) -> i64 {
    if respawn_time >= now {
        return 0;
    }
    let elapsed_ms = (now.clone() - respawn_time.clone()).num_milliseconds();
    (elapsed_ms / interval_ms(interval_hours)).max(0)
}

fn interval_ms(interval_hours: f64) -> i64 {
    interval_duration(interval_hours).num_milliseconds().max(1)
}
