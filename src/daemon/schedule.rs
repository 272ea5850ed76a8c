//! Hour/minute schedules.

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

/// Fires at `minute` past every hour, or once a day when `hour` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(default)]
    pub minute: u32,
}

impl CronSchedule {
    pub fn daily(hour: u32, minute: u32) -> Self {
        Self {
            hour: Some(hour),
            minute,
        }
    }

    pub fn hourly(minute: u32) -> Self {
        Self { hour: None, minute }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.minute > 59 {
            return Err(format!("minute {} is out of range 0-59", self.minute));
        }
        if let Some(hour) = self.hour.filter(|h| *h > 23) {
            return Err(format!("hour {} is out of range 0-23", hour));
        }
        Ok(())
    }

    /// First firing time strictly after `now`.
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let minute = self.minute.min(59);
        match self.hour {
            Some(hour) => {
                let Some(today) = now.date().and_hms_opt(hour.min(23), minute, 0) else {
                    return now + Duration::days(1);
                };
                if today > now {
                    today
                } else {
                    today + Duration::days(1)
                }
            }
            None => {
                let Some(this_hour) = now.date().and_hms_opt(now.hour(), minute, 0) else {
                    return now + Duration::hours(1);
                };
                if this_hour > now {
                    this_hour
                } else {
                    this_hour + Duration::hours(1)
                }
            }
        }
    }

    /// Next firing time in local time.
    pub fn next_local(&self, now: DateTime<Local>) -> DateTime<Local> {
        let mut candidate = self.next_after(now.naive_local());
        // Skip wall-clock times that do not exist (DST gaps)
        for _ in 0..48 {
            if let Some(at) = Local.from_local_datetime(&candidate).earliest() {
                if at > now {
                    return at;
                }
            }
            candidate = self.next_after(candidate);
        }
        now + Duration::hours(1)
    }

    /// How long to sleep from `now` until the next firing.
    pub fn until_next(&self, now: DateTime<Local>) -> std::time::Duration {
        (self.next_local(now) - now)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60))
    }
}

impl std::fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.hour {
            Some(hour) => write!(f, "daily at {:02}:{:02}", hour, self.minute),
            None => write!(f, "hourly at :{:02}", self.minute),
        }
    }
}
