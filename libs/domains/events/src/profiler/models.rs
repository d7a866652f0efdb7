use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::clock;
use crate::error::Result;

/// Slow-operation threshold used when level 1 is requested without one
pub const DEFAULT_SLOW_MS: i64 = 100;

/// Profiler configuration as last read from the server, plus the
/// application's scheduled stop time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProfilerSnapshot {
    pub level: i32,
    pub slowms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<DateTime<Utc>>,
}

impl ProfilerSnapshot {
    pub fn level_verbose(&self) -> String {
        match self.level {
            0 => "Disabled - no data collection".to_string(),
            1 => format!("Slow operations only (>{}ms)", self.slowms),
            2 => "All operations".to_string(),
            _ => "Unknown level".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_stop_condition"))]
pub struct StartProfilerRequest {
    /// 0 = off, 1 = slow operations only, 2 = all operations
    #[validate(range(min = 0, max = 2, message = "level must be 0, 1 or 2"))]
    pub level: i32,

    #[validate(range(min = 1, message = "slowms must be positive"))]
    pub slowms: Option<i64>,

    /// Disable automatically after this many minutes
    #[validate(range(min = 1, message = "timeout_minutes must be positive"))]
    pub timeout_minutes: Option<i64>,

    /// Disable automatically at this time
    pub till: Option<DateTime<Utc>>,
}

fn validate_stop_condition(request: &StartProfilerRequest) -> std::result::Result<(), ValidationError> {
    if request.till.is_some() && request.timeout_minutes.is_some() {
        let mut err = ValidationError::new("exclusive_stop_condition");
        err.message = Some("till and timeout_minutes are mutually exclusive".into());
        return Err(err);
    }
    Ok(())
}

impl StartProfilerRequest {
    pub fn stop() -> Self {
        Self::default()
    }

    /// Requested auto-stop time, if any. Fails when the timeout runs past
    /// the representable date range.
    pub fn stop_time(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        if let Some(till) = self.till {
            return Ok(Some(till));
        }
        self.timeout_minutes
            .map(|minutes| clock::after(now, TimeDelta::try_minutes(minutes), "timeout_minutes"))
            .transpose()
    }
}

/// Profiler status as returned by the admin endpoints
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProfilerStatus {
    pub level: i32,
    pub level_verbose: String,
    pub slowms: i64,
    /// Scheduled auto-stop time
    pub till: Option<DateTime<Utc>>,
}

impl From<&ProfilerSnapshot> for ProfilerStatus {
    fn from(snapshot: &ProfilerSnapshot) -> Self {
        Self {
            level: snapshot.level,
            level_verbose: snapshot.level_verbose(),
            slowms: snapshot.slowms,
            till: snapshot.stop_time,
        }
    }
}
