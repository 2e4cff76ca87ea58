// Calendar gate deciding whether a scheduler tick may start a cycle
//
// Working hours are evaluated in a fixed named timezone, never the process-local one.
// An unknown timezone closes the gate for good: ticks are skipped, never fired wrongly.

use crate::config::ScheduleConfig;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

/// Outcome of evaluating the gate for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Open,
    OutsideWorkingHours { hour: u32 },
    Weekend(Weekday),
    TimezoneUnavailable,
}

impl GateDecision {
    pub fn is_open(&self) -> bool {
        matches!(self, GateDecision::Open)
    }

    /// Short label used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            GateDecision::Open => "open",
            GateDecision::OutsideWorkingHours { .. } => "outside_working_hours",
            GateDecision::Weekend(_) => "weekend",
            GateDecision::TimezoneUnavailable => "timezone_unavailable",
        }
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateDecision::Open => write!(f, "open"),
            GateDecision::OutsideWorkingHours { hour } => {
                write!(f, "outside working hours (current hour {:02})", hour)
            }
            GateDecision::Weekend(day) => write!(f, "weekend ({})", day),
            GateDecision::TimezoneUnavailable => write!(f, "timezone unavailable"),
        }
    }
}

/// Half-open working-hours window `[start_hour, end_hour)` on weekdays
#[derive(Debug, Clone)]
pub struct CalendarGate {
    timezone: Option<Tz>,
    timezone_name: String,
    start_hour: u32,
    end_hour: u32,
}

impl CalendarGate {
    /// Build a gate; an unparseable timezone yields a permanently closed gate
    pub fn new(timezone_name: &str, start_hour: u32, end_hour: u32) -> Self {
        let timezone = match Tz::from_str(timezone_name) {
            Ok(tz) => Some(tz),
            Err(e) => {
                tracing::error!(
                    timezone = timezone_name,
                    error = %e,
                    "Failed to load timezone, calendar gate will stay closed"
                );
                None
            }
        };

        Self {
            timezone,
            timezone_name: timezone_name.to_string(),
            start_hour,
            end_hour,
        }
    }

    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self::new(&config.timezone, config.work_start_hour, config.work_end_hour)
    }

    pub fn timezone_name(&self) -> &str {
        &self.timezone_name
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }

    /// Evaluate the gate for the current instant
    pub fn evaluate_now(&self) -> GateDecision {
        self.evaluate(Utc::now())
    }

    /// Evaluate the gate for a given instant
    pub fn evaluate(&self, now: DateTime<Utc>) -> GateDecision {
        let Some(timezone) = self.timezone else {
            return GateDecision::TimezoneUnavailable;
        };

        let local = now.with_timezone(&timezone);
        let hour = local.hour();
        if !within_working_hours(hour, self.start_hour, self.end_hour) {
            return GateDecision::OutsideWorkingHours { hour };
        }

        let weekday = local.weekday();
        if is_weekend(weekday) {
            return GateDecision::Weekend(weekday);
        }

        GateDecision::Open
    }

    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.evaluate(now).is_open()
    }
}

/// `start_hour <= hour < end_hour`
#[inline]
pub fn within_working_hours(hour: u32, start_hour: u32, end_hour: u32) -> bool {
    hour >= start_hour && hour < end_hour
}

#[inline]
pub fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}
