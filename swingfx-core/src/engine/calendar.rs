//! Market hours.
//!
//! The forex week is measured on the New York wall clock: trading stops
//! Friday 16:50 and resumes Monday 08:10.

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;

pub trait MarketCalendar {
    fn is_closed(&self, now: DateTime<Utc>) -> bool;
}

/// Weekly closed window in a fixed exchange timezone.
#[derive(Debug, Clone, Copy)]
pub struct ForexCalendar {
    timezone: Tz,
    close_day: Weekday,
    close_time: NaiveTime,
    open_day: Weekday,
    open_time: NaiveTime,
}

impl Default for ForexCalendar {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            close_day: Weekday::Fri,
            close_time: NaiveTime::from_hms_opt(16, 50, 0).unwrap_or(NaiveTime::MIN),
            open_day: Weekday::Mon,
            open_time: NaiveTime::from_hms_opt(8, 10, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl ForexCalendar {
    pub fn new(
        timezone: Tz,
        close: (Weekday, NaiveTime),
        open: (Weekday, NaiveTime),
    ) -> Self {
        Self {
            timezone,
            close_day: close.0,
            close_time: close.1,
            open_day: open.0,
            open_time: open.1,
        }
    }
}

fn minute_of_week(day: Weekday, time: NaiveTime) -> u32 {
    day.num_days_from_monday() * 24 * 60 + time.hour() * 60 + time.minute()
}

impl MarketCalendar for ForexCalendar {
    fn is_closed(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone);
        let m = minute_of_week(local.weekday(), local.time());
        let close = minute_of_week(self.close_day, self.close_time);
        let open = minute_of_week(self.open_day, self.open_time);

        if close > open {
            // window wraps over the week boundary
            m >= close || m < open
        } else {
            m >= close && m < open
        }
    }
}

/// Calendar that never closes (simulations, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl MarketCalendar for AlwaysOpen {
    fn is_closed(&self, _now: DateTime<Utc>) -> bool {
        false
    }
}
