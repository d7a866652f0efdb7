//! Severity-based retention.
//!
//! Every stored event carries an absolute `expires_at`, computed once when the
//! event is created. The TTL index on that field (`expireAfterSeconds = 0`)
//! is the only thing that ever deletes events.
//!
//! | severity        | tier       | default retention |
//! |-----------------|------------|-------------------|
//! | `>= 8`          | critical   | 90 days           |
//! | `5..=7`         | medium     | 30 days           |
//! | `<= 4`, invalid | low        | 7 days            |

use chrono::{DateTime, Duration, Utc};
use core_config::{ConfigError, FromEnv, env_parse};
use serde::{Deserialize, Serialize};
use std::num::IntErrorKind;
use strum::{Display, EnumString};

/// Retention tier derived from an event's severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RetentionTier {
    Low,
    Medium,
    Critical,
}

impl RetentionTier {
    pub fn for_severity(severity: i64) -> Self {
        match severity {
            s if s >= 8 => Self::Critical,
            5..=7 => Self::Medium,
            _ => Self::Low,
        }
    }

    /// Classify loosely typed input. Missing or unparseable values fall back
    /// to [`RetentionTier::Low`].
    pub fn classify(severity: Option<&SeverityValue>) -> Self {
        severity
            .and_then(SeverityValue::as_integer)
            .map_or(Self::Low, |s| match s {
                Coerced::Value(v) => Self::for_severity(v),
                Coerced::AboveRange => Self::Critical,
                Coerced::BelowRange => Self::Low,
            })
    }
}

/// Severity as it may arrive from producers: a number or a numeric string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeverityValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

enum Coerced {
    Value(i64),
    AboveRange,
    BelowRange,
}

impl SeverityValue {
    fn as_integer(&self) -> Option<Coerced> {
        match self {
            Self::Integer(v) => Some(Coerced::Value(*v)),
            Self::Float(v) if v.is_finite() => Some(if *v >= i64::MAX as f64 {
                Coerced::AboveRange
            } else if *v <= i64::MIN as f64 {
                Coerced::BelowRange
            } else {
                Coerced::Value(v.trunc() as i64)
            }),
            Self::Float(_) => None,
            Self::Text(raw) => match raw.trim().parse::<i64>() {
                Ok(v) => Some(Coerced::Value(v)),
                Err(e) => match e.kind() {
                    IntErrorKind::PosOverflow => Some(Coerced::AboveRange),
                    IntErrorKind::NegOverflow => Some(Coerced::BelowRange),
                    _ => None,
                },
            },
        }
    }
}

impl From<i32> for SeverityValue {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<i64> for SeverityValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for SeverityValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Upper bound on any retention window
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Retention windows in days per tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    pub low_days: i64,
    pub medium_days: i64,
    pub critical_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            low_days: 7,
            medium_days: 30,
            critical_days: 90,
        }
    }
}

/// Environment variables:
/// - `EVENTS_TTL_DAYS_LOW` (default: 7)
/// - `EVENTS_TTL_DAYS_MEDIUM` (default: 30)
/// - `EVENTS_TTL_DAYS_CRITICAL` (default: 90)
impl FromEnv for RetentionConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            low_days: env_parse("EVENTS_TTL_DAYS_LOW", defaults.low_days)?,
            medium_days: env_parse("EVENTS_TTL_DAYS_MEDIUM", defaults.medium_days)?,
            critical_days: env_parse("EVENTS_TTL_DAYS_CRITICAL", defaults.critical_days)?,
        };

        for (key, days) in [
            ("EVENTS_TTL_DAYS_LOW", config.low_days),
            ("EVENTS_TTL_DAYS_MEDIUM", config.medium_days),
            ("EVENTS_TTL_DAYS_CRITICAL", config.critical_days),
        ] {
            if !(1..=MAX_RETENTION_DAYS).contains(&days) {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    details: format!(
                        "retention must be between 1 and {MAX_RETENTION_DAYS} days, got {days}"
                    ),
                });
            }
        }

        Ok(config)
    }
}

/// Maps severities to retention windows and expiration timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionPolicy {
    config: RetentionConfig,
}

impl RetentionPolicy {
    pub fn new(config: RetentionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    pub fn days_for_tier(&self, tier: RetentionTier) -> i64 {
        match tier {
            RetentionTier::Low => self.config.low_days,
            RetentionTier::Medium => self.config.medium_days,
            RetentionTier::Critical => self.config.critical_days,
        }
    }

    /// Retention in days. Never fails: bad input lands in the low tier.
    pub fn ttl_days(&self, severity: Option<&SeverityValue>) -> i64 {
        self.days_for_tier(RetentionTier::classify(severity))
    }

    /// `now` plus the retention window for `severity`.
    pub fn expires_at(
        &self,
        severity: Option<&SeverityValue>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        now + Duration::days(self.ttl_days(severity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy() -> RetentionPolicy {
        RetentionPolicy::default()
    }

    fn days(value: impl Into<SeverityValue>) -> i64 {
        policy().ttl_days(Some(&value.into()))
    }

    #[test]
    fn test_critical_tier() {
        assert_eq!(days(8), 90);
        assert_eq!(days(9), 90);
        assert_eq!(days(10), 90);
        assert_eq!(days(100_000), 90);
        assert_eq!(days("8"), 90);
        assert_eq!(days(" 9 "), 90);
        assert_eq!(days("100000000000000000000000"), 90);
    }

    #[test]
    fn test_medium_tier() {
        for severity in 5..=7 {
            assert_eq!(days(severity), 30, "severity {severity}");
        }
        assert_eq!(days("6"), 30);
    }

    #[test]
    fn test_low_tier() {
        for severity in 1..=4 {
            assert_eq!(days(severity), 7, "severity {severity}");
        }
        assert_eq!(days("2"), 7);
        assert_eq!(days(0), 7);
        assert_eq!(days(-3), 7);
    }

    #[test]
    fn test_invalid_input_falls_back_to_low() {
        assert_eq!(policy().ttl_days(None), 7);
        assert_eq!(days("jjjj"), 7);
        assert_eq!(days(""), 7);
        assert_eq!(days("8.5"), 7);
        assert_eq!(policy().ttl_days(Some(&SeverityValue::Float(f64::NAN))), 7);
    }

    #[test]
    fn test_float_severity_truncates() {
        assert_eq!(policy().ttl_days(Some(&SeverityValue::Float(8.9))), 90);
        assert_eq!(policy().ttl_days(Some(&SeverityValue::Float(7.99))), 30);
    }

    #[test]
    fn test_severity_value_deserializes_untagged() {
        let values: Vec<Option<SeverityValue>> =
            serde_json::from_str(r#"[9, 6.5, "3", null]"#).unwrap();
        assert_eq!(values[0], Some(SeverityValue::Integer(9)));
        assert_eq!(values[1], Some(SeverityValue::Float(6.5)));
        assert_eq!(values[2], Some(SeverityValue::Text("3".into())));
        assert_eq!(values[3], None);
    }

    #[test]
    fn test_expires_at_adds_retention_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let expires = policy().expires_at(Some(&SeverityValue::from(9)), now);
        assert_eq!(expires, Utc.with_ymd_and_hms(2024, 5, 30, 12, 0, 0).unwrap());

        let expires = policy().expires_at(None, now);
        assert_eq!(expires, Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_custom_windows() {
        let policy = RetentionPolicy::new(RetentionConfig {
            low_days: 1,
            medium_days: 2,
            critical_days: 3,
        });
        assert_eq!(policy.days_for_tier(RetentionTier::Medium), 2);
        assert_eq!(policy.ttl_days(Some(&SeverityValue::from(10))), 3);
    }

    #[test]
    fn test_retention_config_from_env() {
        temp_env::with_vars(
            [
                ("EVENTS_TTL_DAYS_LOW", Some("3")),
                ("EVENTS_TTL_DAYS_MEDIUM", None::<&str>),
                ("EVENTS_TTL_DAYS_CRITICAL", Some("365")),
            ],
            || {
                let config = RetentionConfig::from_env().unwrap();
                assert_eq!(config.low_days, 3);
                assert_eq!(config.medium_days, 30);
                assert_eq!(config.critical_days, 365);
            },
        );
    }

    #[test]
    fn test_retention_config_rejects_bad_values() {
        temp_env::with_var("EVENTS_TTL_DAYS_LOW", Some("week"), || {
            assert!(matches!(
                RetentionConfig::from_env(),
                Err(ConfigError::ParseError { .. })
            ));
        });
        temp_env::with_var("EVENTS_TTL_DAYS_CRITICAL", Some("0"), || {
            assert!(matches!(
                RetentionConfig::from_env(),
                Err(ConfigError::Invalid { .. })
            ));
        });
        temp_env::with_var("EVENTS_TTL_DAYS_MEDIUM", Some("1000000000000000"), || {
            assert!(matches!(
                RetentionConfig::from_env(),
                Err(ConfigError::Invalid { .. })
            ));
        });
    }
}
