//! Date registers (`seconds`, `minutes`, `hours`, `dw`, `dy`, `mo`, `year`, `yr`)
//!
//! The registers are ordinary number registers that are defined on startup.

#[cfg(feature = "time")]
use chrono::prelude::*;

/// The date and time used to initialize the date registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    seconds: i64,
    minutes: i64,
    hours: i64,
    day_of_week: i64,
    day: i64,
    month: i64,
    year: i64,
}

impl Date {
    /// The current local time.
    #[cfg(feature = "time")]
    pub fn now() -> Date {
        let dt: DateTime<Local> = Local::now();
        Date {
            seconds: dt.second() as i64,
            minutes: dt.minute() as i64,
            hours: dt.hour() as i64,
            day_of_week: dt.weekday().number_from_sunday() as i64,
            day: dt.day() as i64,
            month: dt.month() as i64,
            year: dt.year() as i64,
        }
    }

    #[cfg(not(feature = "time"))]
    pub fn now() -> Date {
        Date::new_with_values(0, 0, 0, 0, 0, 0, 0)
    }

    /// Create a date with the provided values.
    ///
    /// This is useful when the clock can't be used, and in unit tests.
    /// The day of the week is 1 for Sunday.
    pub fn new_with_values(
        seconds: i64,
        minutes: i64,
        hours: i64,
        day_of_week: i64,
        day: i64,
        month: i64,
        year: i64,
    ) -> Date {
        Date {
            seconds,
            minutes,
            hours,
            day_of_week,
            day,
            month,
            year,
        }
    }

    /// Names and values of the date registers.
    pub fn registers(&self) -> Vec<(&'static str, i64)> {
        vec![
            ("seconds", self.seconds),
            ("minutes", self.minutes),
            ("hours", self.hours),
            ("dw", self.day_of_week),
            ("dy", self.day),
            ("mo", self.month),
            ("year", self.year),
            ("yr", self.year - 1900),
        ]
    }
}

impl Default for Date {
    fn default() -> Self {
        Self::now()
    }
}
