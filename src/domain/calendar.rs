//! Exchange trading calendars.
//!
//! Open-day rules, checked in order:
//! 1. Saturday and Sunday are closed.
//! 2. TSX only: days in the special-open table are open.
//! 3. Days in the region's special-closed table are closed.
//! 4. Regional holidays are closed, except that a US holiday observed on
//!    Friday December 31 (New Year's Day falling on a Saturday) stays open.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::error::SimError;

/// First and last year a default calendar precomputes holidays for. Dates
/// outside the range still work, their holidays are computed on demand.
pub const DEFAULT_FIRST_YEAR: i32 = 1970;
pub const DEFAULT_LAST_YEAR: i32 = 2100;

/// Market closures outside the holiday rules (9/11, presidential mourning,
/// hurricane Sandy).
const US_SPECIAL_CLOSED_DAYS: [(i32, u32, u32); 9] = [
    (2001, 9, 11),
    (2001, 9, 12),
    (2001, 9, 13),
    (2001, 9, 14),
    (2004, 6, 11),
    (2007, 1, 2),
    (2012, 10, 29),
    (2012, 10, 30),
    (2018, 12, 5),
];

const CA_SPECIAL_CLOSED_DAYS: [(i32, u32, u32); 2] = [(2001, 9, 11), (2001, 9, 12)];

/// TSX opened on these days even though they are holidays.
const CA_SPECIAL_OPEN_DAYS: [(i32, u32, u32); 1] = [(2003, 12, 26)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Nyse,
    Nasdaq,
    Tsx,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Nyse => "nyse",
            Region::Nasdaq => "nasdaq",
            Region::Tsx => "tsx",
        }
    }

    fn is_canadian(&self) -> bool {
        matches!(self, Region::Tsx)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nyse" => Ok(Region::Nyse),
            "nasdaq" => Ok(Region::Nasdaq),
            "tsx" => Ok(Region::Tsx),
            _ => Err(SimError::UnknownRegion {
                value: s.to_string(),
            }),
        }
    }
}

/// Holiday calendar for one region, precomputed over a range of years.
#[derive(Debug, Clone)]
pub struct TradingCalendar {
    region: Region,
    first_year: i32,
    last_year: i32,
    holidays: BTreeSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(region: Region) -> Self {
        Self::with_years(region, DEFAULT_FIRST_YEAR, DEFAULT_LAST_YEAR)
    }

    /// Calendar covering the years spanned by `start..=end`.
    pub fn for_range(region: Region, start: NaiveDate, end: NaiveDate) -> Self {
        Self::with_years(region, start.year(), end.year())
    }

    pub fn with_years(region: Region, first_year: i32, last_year: i32) -> Self {
        // Observed dates can spill into the neighbouring year.
        let holidays = (first_year - 1..=last_year + 1)
            .flat_map(|year| holidays_in_year(region, year))
            .collect();
        TradingCalendar {
            region,
            first_year,
            last_year,
            holidays,
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Holidays in the precomputed range, in date order.
    pub fn holidays(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.holidays.iter().copied()
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        if (self.first_year..=self.last_year).contains(&date.year()) {
            return self.holidays.contains(&date);
        }
        (date.year() - 1..=date.year() + 1)
            .flat_map(|year| holidays_in_year(self.region, year))
            .any(|h| h == date)
    }

    pub fn is_open_day(&self, date: NaiveDate) -> bool {
        if is_weekend(date) {
            return false;
        }

        if self.region.is_canadian() {
            if in_table(date, &CA_SPECIAL_OPEN_DAYS) {
                return true;
            }
            if in_table(date, &CA_SPECIAL_CLOSED_DAYS) {
                return false;
            }
            return !self.is_holiday(date);
        }

        if in_table(date, &US_SPECIAL_CLOSED_DAYS) {
            return false;
        }
        // New Year's Day on a Saturday: the Friday before is still a
        // trading day in the US.
        let new_years_eve_friday =
            date.weekday() == Weekday::Fri && date.month() == 12 && date.day() == 31;
        !(self.is_holiday(date) && !new_years_eve_friday)
    }

    /// First open day on or after `date`.
    pub fn next_open_day(&self, date: NaiveDate) -> NaiveDate {
        let mut day = date;
        while !self.is_open_day(day) {
            day += Duration::days(1);
        }
        day
    }

    /// Step `days` open days forward (positive) or backward (negative).
    pub fn shift_open_days(&self, date: NaiveDate, days: i64) -> Result<NaiveDate, SimError> {
        if days == 0 {
            return Err(SimError::ZeroShift);
        }
        let step = Duration::days(days.signum());
        let mut day = date;
        let mut shifted = 0;
        while shifted < days.abs() {
            day += step;
            if self.is_open_day(day) {
                shifted += 1;
            }
        }
        Ok(day)
    }
}

/// One-off check without keeping a calendar around.
pub fn is_open_day(date: NaiveDate, region: Region) -> bool {
    TradingCalendar::for_range(region, date, date).is_open_day(date)
}

/// One-off shift without keeping a calendar around.
pub fn shift_open_days(date: NaiveDate, days: i64, region: Region) -> Result<NaiveDate, SimError> {
    TradingCalendar::for_range(region, date, date).shift_open_days(date, days)
}

/// Weekdays in `[start, end)`, ignoring holidays. Negative when `end` is
/// before `start`.
pub fn busday_count(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        return -busday_count(end, start);
    }
    let total = (end - start).num_days();
    let full_weeks = total / 7;
    let mut count = full_weeks * 5;
    let mut day = start + Duration::days(full_weeks * 7);
    while day < end {
        if !is_weekend(day) {
            count += 1;
        }
        day += Duration::days(1);
    }
    count
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn in_table(date: NaiveDate, table: &[(i32, u32, u32)]) -> bool {
    table.contains(&(date.year(), date.month(), date.day()))
}

fn holidays_in_year(region: Region, year: i32) -> Vec<NaiveDate> {
    if region.is_canadian() {
        ca_holidays(year)
    } else {
        us_holidays(year)
    }
}

fn us_holidays(year: i32) -> Vec<NaiveDate> {
    let mut days = vec![
        fixed(year, 1, 1).map(nearest_workday),
        nth_weekday(year, 2, Weekday::Mon, 3),
        good_friday(year),
        fixed(year, 5, 31).map(|d| weekday_on_or_before(d, Weekday::Mon)),
        fixed(year, 7, 4).map(nearest_workday),
        nth_weekday(year, 9, Weekday::Mon, 1),
        nth_weekday(year, 11, Weekday::Thu, 4),
        fixed(year, 12, 25).map(nearest_workday),
    ];
    if year >= 1986 {
        days.push(nth_weekday(year, 1, Weekday::Mon, 3));
    }
    days.into_iter().flatten().collect()
}

fn ca_holidays(year: i32) -> Vec<NaiveDate> {
    let mut days = vec![
        fixed(year, 1, 1).map(next_monday),
        good_friday(year),
        fixed(year, 5, 24).map(|d| weekday_on_or_before(d, Weekday::Mon)),
        fixed(year, 7, 1).map(next_monday),
        nth_weekday(year, 8, Weekday::Mon, 1),
        nth_weekday(year, 9, Weekday::Mon, 1),
        nth_weekday(year, 10, Weekday::Mon, 2),
        fixed(year, 12, 25).map(weekend_plus_two),
        fixed(year, 12, 26).map(weekend_plus_two),
    ];
    if year >= 2008 {
        days.push(nth_weekday(year, 2, Weekday::Mon, 3));
    }
    days.into_iter().flatten().collect()
}

fn fixed(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn weekday_on_or_before(date: NaiveDate, weekday: Weekday) -> NaiveDate {
    let back = (date.weekday().num_days_from_monday() + 7 - weekday.num_days_from_monday()) % 7;
    date - Duration::days(back as i64)
}

/// Saturday moves to Friday, Sunday to Monday.
fn nearest_workday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// Saturday and Sunday both move to the following Monday.
fn next_monday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date + Duration::days(2),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// Christmas and Boxing Day on a weekend are pushed back two days.
fn weekend_plus_two(date: NaiveDate) -> NaiveDate {
    if is_weekend(date) {
        date + Duration::days(2)
    } else {
        date
    }
}

fn good_friday(year: i32) -> Option<NaiveDate> {
    easter_sunday(year).map(|d| d - Duration::days(2))
}

/// Anonymous Gregorian computus.
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
