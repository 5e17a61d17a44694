use std::time::Duration;

use serde::{Deserialize, Serialize};

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 60 * SECONDS_PER_MINUTE;

/// Duration-valued setting.
///
/// Accepts either a bare integer (seconds) or a structured mapping whose parts are summed:
/// ```yaml
/// worker_timeout: 900
/// heartbeat_period: { minutes: 5 }
/// sleep_interval: { seconds: 1, milliseconds: 500 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSetting {
    Seconds(u64),
    Structured(DurationParts),
}

/// Structured form of a [`DurationSetting`]; every part defaults to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DurationParts {
    #[serde(default)]
    pub hours: u64,
    #[serde(default)]
    pub minutes: u64,
    #[serde(default)]
    pub seconds: u64,
    #[serde(default)]
    pub milliseconds: u64,
}

impl DurationSetting {
    pub const fn from_secs(secs: u64) -> Self {
        Self::Seconds(secs)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self::Structured(DurationParts {
            hours: 0,
            minutes: 0,
            seconds: 0,
            milliseconds: millis,
        })
    }

    /// Normalize to a [`Duration`].
    pub fn as_duration(&self) -> Duration {
        match *self {
            DurationSetting::Seconds(s) => Duration::from_secs(s),
            DurationSetting::Structured(p) => {
                let secs = p
                    .hours
                    .saturating_mul(SECONDS_PER_HOUR)
                    .saturating_add(p.minutes.saturating_mul(SECONDS_PER_MINUTE))
                    .saturating_add(p.seconds);
                Duration::from_secs(secs).saturating_add(Duration::from_millis(p.milliseconds))
            }
        }
    }

    /// Whole seconds of the normalized value.
    #[inline]
    pub fn total_seconds(&self) -> u64 {
        self.as_duration().as_secs()
    }
}

impl From<Duration> for DurationSetting {
    fn from(d: Duration) -> Self {
        if d.subsec_millis() == 0 {
            Self::Seconds(d.as_secs())
        } else {
            Self::Structured(DurationParts {
                seconds: d.as_secs(),
                milliseconds: u64::from(d.subsec_millis()),
                ..Default::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_hours_and_minutes_normalize_to_seconds() {
        let d: DurationSetting = serde_json::from_str(r#"{"hours":1,"minutes":30}"#).unwrap();
        assert_eq!(d.total_seconds(), 5400);
    }

    #[test]
    fn bare_integer_stays_seconds() {
        let d: DurationSetting = serde_json::from_str("900").unwrap();
        assert_eq!(d, DurationSetting::Seconds(900));
        assert_eq!(d.total_seconds(), 900);
    }

    #[test]
    fn milliseconds_are_kept_below_a_second() {
        let d: DurationSetting = serde_json::from_str(r#"{"milliseconds":250}"#).unwrap();
        assert_eq!(d.as_duration(), Duration::from_millis(250));
        assert_eq!(d.total_seconds(), 0);
    }

    #[test]
    fn rejects_unknown_parts_and_negative_values() {
        assert!(serde_json::from_str::<DurationSetting>(r#"{"days":1}"#).is_err());
        assert!(serde_json::from_str::<DurationSetting>("-5").is_err());
        assert!(serde_json::from_str::<DurationSetting>(r#""15s""#).is_err());
    }

    #[test]
    fn from_duration_picks_compact_form() {
        assert_eq!(
            DurationSetting::from(Duration::from_secs(3)),
            DurationSetting::Seconds(3)
        );
        assert_eq!(
            DurationSetting::from(Duration::from_millis(1500)).as_duration(),
            Duration::from_millis(1500)
        );
    }
}
