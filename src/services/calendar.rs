//! UTC calendar helpers: months, Monday-Sunday weeks and the weeks that fit
//! entirely inside a month

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeDelta, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A UTC calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        // Constructed only through validated paths
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day().pred_opt().unwrap_or(NaiveDate::MAX)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("Invalid month '{}', expected YYYY-MM", s))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("Invalid year in '{}'", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("Invalid month in '{}'", s))?;
        Self::new(year, month).ok_or_else(|| format!("Month out of range: '{}'", s))
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Monday of the Monday-Sunday week containing `date`
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date.week(Weekday::Mon).first_day()
}

/// Sunday closing the week that starts on `monday`
pub fn sunday_of(monday: NaiveDate) -> NaiveDate {
    monday + Days::new(6)
}

/// Every Monday-Sunday week lying entirely inside `month`, as Mondays.
///
/// Weeks that start in the previous month or end in the next are excluded,
/// so a week straddling a month boundary belongs to neither month.
pub fn complete_weeks_in(month: YearMonth) -> Vec<NaiveDate> {
    let first = month.first_day();
    let last = month.last_day();

    let mut monday = monday_of(first);
    if monday < first {
        monday = monday + Days::new(7);
    }

    let mut weeks = Vec::new();
    while sunday_of(monday) <= last {
        weeks.push(monday);
        monday = monday + Days::new(7);
    }
    weeks
}

/// 00:00:00 UTC on `date`
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Last representable instant of `date` in UTC
pub fn day_end(date: NaiveDate) -> DateTime<Utc> {
    day_start(date) + TimeDelta::days(1) - TimeDelta::nanoseconds(1)
}

/// Inclusive day iterator
pub fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_year_month_parse_and_display() {
        let ym: YearMonth = "2026-02".parse().unwrap();
        assert_eq!(ym.to_string(), "2026-02");
        assert_eq!(ym.first_day(), date(2026, 2, 1));
        assert_eq!(ym.last_day(), date(2026, 2, 28));
        assert!("2026-13".parse::<YearMonth>().is_err());
        assert!("202602".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_year_month_wraps_years() {
        let dec = YearMonth::new(2025, 12).unwrap();
        assert_eq!(dec.next(), YearMonth::new(2026, 1).unwrap());
        assert_eq!(dec.next().previous(), dec);
        assert_eq!(dec.last_day(), date(2025, 12, 31));
    }

    #[test]
    fn test_leap_february() {
        let feb = YearMonth::new(2028, 2).unwrap();
        assert_eq!(feb.last_day(), date(2028, 2, 29));
    }

    #[test]
    fn test_monday_of() {
        // 2026-01-04 is a Sunday
        assert_eq!(monday_of(date(2026, 1, 4)), date(2025, 12, 29));
        assert_eq!(monday_of(date(2026, 1, 5)), date(2026, 1, 5));
        assert_eq!(monday_of(date(2026, 1, 7)), date(2026, 1, 5));
    }

    #[test]
    fn test_complete_weeks_exclude_boundary_weeks() {
        // January 2026: Thu 1st .. Sat 31st
        let weeks = complete_weeks_in(YearMonth::new(2026, 1).unwrap());
        assert_eq!(
            weeks,
            vec![date(2026, 1, 5), date(2026, 1, 12), date(2026, 1, 19)]
        );
        // The week of Mon 26 Jan spills into February
        assert!(!weeks.contains(&date(2026, 1, 26)));

        let feb = complete_weeks_in(YearMonth::new(2026, 2).unwrap());
        assert_eq!(feb.first(), Some(&date(2026, 2, 2)));
        assert!(!feb.contains(&date(2026, 1, 26)));
    }

    #[test]
    fn test_month_starting_on_monday() {
        // June 2026 starts on a Monday and ends on a Tuesday
        let weeks = complete_weeks_in(YearMonth::new(2026, 6).unwrap());
        assert_eq!(weeks.len(), 4);
        assert_eq!(weeks[0], date(2026, 6, 1));
    }

    #[test]
    fn test_day_bounds() {
        let d = date(2026, 3, 15);
        assert_eq!(day_start(d).date_naive(), d);
        assert_eq!(day_end(d).date_naive(), d);
        assert_eq!((day_end(d) + TimeDelta::nanoseconds(1)).date_naive(), date(2026, 3, 16));
    }

    #[test]
    fn test_days_between_is_inclusive() {
        let days: Vec<_> = days_between(date(2026, 1, 30), date(2026, 2, 2)).collect();
        assert_eq!(days.len(), 4);
    }
}
