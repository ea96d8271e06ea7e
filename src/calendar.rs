//! Regional date and clock strings for stored records.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use icu_calendar::{persian::Persian, Date};

/// Date and time as written to a user's sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStamp {
    /// `YYYY-MM-DD` in the regional calendar.
    pub date: String,
    /// `HH:MM:SS` on the regional wall clock.
    pub time: String,
}

pub trait LocalCalendar: Send + Sync {
    fn stamp(&self, at: DateTime<Utc>) -> LocalStamp;
}

/// Solar Hijri dates on the Tehran wall clock.
#[derive(Debug, Clone, Copy)]
pub struct PersianCalendar {
    tz: Tz,
}

impl PersianCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Default for PersianCalendar {
    fn default() -> Self {
        Self::new(chrono_tz::Asia::Tehran)
    }
}

impl LocalCalendar for PersianCalendar {
    fn stamp(&self, at: DateTime<Utc>) -> LocalStamp {
        let local = at.with_timezone(&self.tz);
        let gregorian = local.date_naive();
        let date = persian_date(gregorian).unwrap_or_else(|| {
            tracing::warn!(%gregorian, "Persian date conversion failed, storing Gregorian date");
            gregorian.format("%Y-%m-%d").to_string()
        });

        LocalStamp {
            date,
            time: local.format("%H:%M:%S").to_string(),
        }
    }
}

fn persian_date(date: NaiveDate) -> Option<String> {
    let month = u8::try_from(date.month()).ok()?;
    let day = u8::try_from(date.day()).ok()?;
    let persian = Date::try_new_iso_date(date.year(), month, day)
        .ok()?
        .to_calendar(Persian);

    Some(format!(
        "{:04}-{:02}-{:02}",
        persian.year().number,
        persian.month().ordinal,
        persian.day_of_month().0
    ))
}
