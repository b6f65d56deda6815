//! Adaptive pacing between loop cycles.
//!
//! Recent ledger activity means the agent is mid-burst and should be invoked
//! again soon; a long quiet gap relaxes polling back to the cold delay.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::core::types::ProgressRecord;

pub const DEFAULT_HOT_DELAY: Duration = Duration::from_secs(60);
pub const DEFAULT_COLD_DELAY: Duration = Duration::from_secs(300);
pub const DEFAULT_ACTIVE_WINDOW: Duration = Duration::from_secs(300);

/// Delays used by [`next_delay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay while the last attempt is within `active_window`.
    pub hot: Duration,
    /// Delay when the ledger is empty, unreadable, or quiet.
    pub cold: Duration,
    pub active_window: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            hot: DEFAULT_HOT_DELAY,
            cold: DEFAULT_COLD_DELAY,
            active_window: DEFAULT_ACTIVE_WINDOW,
        }
    }
}

/// Compute the sleep before the next cycle from the most recent record.
///
/// A timestamp in the future (clock skew) counts as zero elapsed time.
pub fn next_delay(
    policy: &BackoffPolicy,
    last: Option<&ProgressRecord>,
    now: DateTime<Utc>,
) -> Duration {
    let Some(last_at) = last.and_then(|record| parse_timestamp(&record.timestamp)) else {
        return policy.cold;
    };
    let elapsed = (now - last_at).to_std().unwrap_or(Duration::ZERO);
    if elapsed < policy.active_window {
        policy.hot
    } else {
        policy.cold
    }
}

/// Ledger timestamp form: RFC 3339, whole seconds, `Z` suffix.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an ISO-8601 timestamp. Offset-less values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn record_at(timestamp: &str) -> ProgressRecord {
        ProgressRecord::new("1", "fix", timestamp, "success")
    }

    fn iso(at: DateTime<Utc>) -> String {
        format_timestamp(at)
    }

    #[test]
    fn empty_ledger_is_cold() {
        let delay = next_delay(&BackoffPolicy::default(), None, Utc::now());
        assert_eq!(delay, Duration::from_secs(300));
    }

    #[test]
    fn fresh_record_is_hot() {
        let now = Utc::now();
        let record = record_at(&iso(now));
        let delay = next_delay(&BackoffPolicy::default(), Some(&record), now);
        assert_eq!(delay, Duration::from_secs(60));
    }

    #[test]
    fn stale_record_is_cold() {
        let now = Utc::now();
        let record = record_at(&iso(now - TimeDelta::seconds(400)));
        let delay = next_delay(&BackoffPolicy::default(), Some(&record), now);
        assert_eq!(delay, Duration::from_secs(300));
    }

    #[test]
    fn window_boundary_is_cold() {
        let now = Utc::now();
        let record = record_at(&iso(now - TimeDelta::seconds(300)));
        let delay = next_delay(&BackoffPolicy::default(), Some(&record), now);
        assert_eq!(delay, Duration::from_secs(300));
    }

    #[test]
    fn future_timestamp_counts_as_recent() {
        let now = Utc::now();
        let record = record_at(&iso(now + TimeDelta::seconds(3600)));
        let delay = next_delay(&BackoffPolicy::default(), Some(&record), now);
        assert_eq!(delay, Duration::from_secs(60));
    }

    #[test]
    fn unparseable_or_missing_timestamp_is_cold() {
        let now = Utc::now();
        for raw in ["", "yesterday", "2026-13-45T99:00:00Z"] {
            let delay = next_delay(&BackoffPolicy::default(), Some(&record_at(raw)), now);
            assert_eq!(delay, Duration::from_secs(300), "timestamp {raw:?}");
        }
    }

    #[test]
    fn parses_offset_and_naive_forms() {
        let with_offset = parse_timestamp("2026-03-01T10:00:00+02:00").expect("offset");
        let naive = parse_timestamp("2026-03-01T08:00:00").expect("naive");
        let fractional = parse_timestamp("2026-03-01T08:00:00.250Z").expect("fractional");
        assert_eq!(with_offset, naive);
        assert!(fractional > naive);
    }

    #[test]
    fn formatted_timestamps_parse_back() {
        let now = Utc::now();
        let formatted = format_timestamp(now);
        assert!(formatted.ends_with('Z'));
        let parsed = parse_timestamp(&formatted).expect("parse");
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn custom_policy_is_respected() {
        let policy = BackoffPolicy {
            hot: Duration::from_secs(5),
            cold: Duration::from_secs(50),
            active_window: Duration::from_secs(10),
        };
        let now = Utc::now();
        let record = record_at(&iso(now - TimeDelta::seconds(20)));
        assert_eq!(next_delay(&policy, Some(&record), now), Duration::from_secs(50));
    }
}
