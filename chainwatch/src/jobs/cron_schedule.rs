use std::str::FromStr;

use chrono::{DateTime, Utc};
use derive_more::Display;

#[derive(Debug, Clone, PartialEq, Display)]
#[display("Invalid cron schedule `{expression}`: {reason}")]
pub struct InvalidCronSchedule {
    pub expression: String,
    pub reason: String,
}

impl std::error::Error for InvalidCronSchedule {}

/// Cron expression with an optional leading seconds field.
/// Five-field expressions fire at second zero.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, InvalidCronSchedule> {
        let normalized = normalize(expression);

        cron::Schedule::from_str(&normalized)
            .map(|schedule| Self {
                expression: expression.to_string(),
                schedule,
            })
            .map_err(|error| InvalidCronSchedule {
                expression: expression.to_string(),
                reason: error.to_string(),
            })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(after).next()
    }

    /// The fire time after `previous_due`. When a worker fell behind and that
    /// time already passed, missed fire times are skipped up to `now`.
    pub fn next_due(
        &self,
        previous_due: &DateTime<Utc>,
        now: &DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let next = self.next_after(previous_due)?;

        if next < *now {
            self.next_after(now)
        } else {
            Some(next)
        }
    }
}

fn normalize(expression: &str) -> String {
    let expression = expression.trim();

    if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}
