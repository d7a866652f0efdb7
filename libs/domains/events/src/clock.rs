use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{EventError, Result};

/// Source of the current UTC time
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// `now - span`, rejecting spans that leave the representable range.
pub fn before(now: DateTime<Utc>, span: Option<TimeDelta>, field: &str) -> Result<DateTime<Utc>> {
    span.and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| out_of_range(field))
}

/// `now + span`, rejecting spans that leave the representable range.
pub fn after(now: DateTime<Utc>, span: Option<TimeDelta>, field: &str) -> Result<DateTime<Utc>> {
    span.and_then(|span| now.checked_add_signed(span))
        .ok_or_else(|| out_of_range(field))
}

fn out_of_range(field: &str) -> EventError {
    EventError::Validation(format!("{field} is out of range"))
}

#[cfg(test)]
pub(crate) use manual::ManualClock;
