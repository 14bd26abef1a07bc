//! Duration parsing and query window calculation

use anyhow::{bail, Result};
use chrono::{DateTime, SecondsFormat, TimeDelta, Timelike, Utc};
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Fallback for unparseable `window` and `update_interval` settings
pub const DEFAULT_DURATION: Duration = Duration::from_secs(60);

/// Parse a duration string such as "30s", "5m", "1h30m", "1.5h" or "7d".
///
/// Accepts a sequence of decimal numbers, each with a unit suffix: `ns`,
/// `us` (or `µs`), `ms`, `s`, `m`, `h`, `d`. A bare `0` is allowed; any other
/// number without a unit is an error.
///
/// Negative durations are rejected: a negative window would put its start
/// after its end.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let input = s.trim();
    let mut rest = input.strip_prefix('+').unwrap_or(input);

    if rest.starts_with('-') {
        bail!("negative duration {:?}", s);
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        bail!("invalid duration {:?}", s);
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." {
            bail!("invalid duration {:?}", s);
        }
        let value: f64 = number.parse()?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let unit_nanos = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "d" => 86400e9,
            "" => bail!("missing unit in duration {:?}", s),
            other => bail!("unknown unit {:?} in duration {:?}", other, s),
        };

        total_nanos += value * unit_nanos;
        rest = tail;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        bail!("invalid duration {:?}", s);
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Parse a duration setting, falling back to one minute on error.
///
/// The failure is logged with the name of the setting and never returned.
pub fn duration_or_default(value: &str, setting: &str) -> Duration {
    parse_duration(value).unwrap_or_else(|e| {
        warn!(
            setting = %setting,
            value = %value,
            "Error parsing '{}' config: {}. Defaulting to 1m",
            setting, e
        );
        DEFAULT_DURATION
    })
}

/// Zero the seconds and sub-second part of an instant
pub fn truncate_to_minute(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

/// A `[start, end)` query window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window of length `duration` ending at the last whole minute before `now`.
    ///
    /// Arithmetic is done on absolute instants, so the window covers exactly
    /// `duration` regardless of time zone or DST.
    pub fn ending_at(now: DateTime<Utc>, duration: Duration) -> Self {
        let end = truncate_to_minute(now);
        let start = TimeDelta::from_std(duration)
            .ok()
            .and_then(|delta| end.checked_sub_signed(delta))
            .unwrap_or_else(|| {
                warn!(
                    duration_secs = duration.as_secs(),
                    "Window duration out of range. Defaulting to 1m"
                );
                end - TimeDelta::minutes(1)
            });
        Self { start, end }
    }
}

impl fmt::Display for TimeWindow {
    /// `start,end` as RFC 3339 timestamps, the format of the `window` query parameter
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{}",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// Compute the query window for a relative duration such as "30m".
///
/// The Allocation API would otherwise use the request time as the end of a
/// relative window, so the window is converted into an explicit pair of
/// minute-aligned timestamps. An unparseable duration falls back to 1m.
pub fn compute_window(duration: &str, now: DateTime<Utc>) -> TimeWindow {
    TimeWindow::ending_at(now, duration_or_default(duration, "window"))
}

/// [`compute_window`] formatted as a `window` query parameter value
pub fn window_param(duration: &str, now: DateTime<Utc>) -> String {
    compute_window(duration, now).to_string()
}
