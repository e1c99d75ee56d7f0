//! Lookback window shared by both aggregators.
use chrono::{DateTime, TimeDelta, Utc};

use crate::{Result, error::ReleaseNotesError};

/// Cutoff instant computed once per invocation. Anything closed at or after
/// `since` belongs to the release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    since: DateTime<Utc>,
}

impl LookbackWindow {
    /// Window starting `days` days before `now`.
    pub fn ending_at(now: DateTime<Utc>, days: u32) -> Result<Self> {
        let since = TimeDelta::try_days(i64::from(days))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| {
                ReleaseNotesError::invalid_config(format!(
                    "lookback of {days} days is out of range"
                ))
            })?;

        Ok(Self { since })
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    /// Inclusive lower bound check.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.since
    }
}
