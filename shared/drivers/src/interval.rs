use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of the period a [`TimeInterval`] covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Granularity {
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
    All,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hour => "HOUR",
            Granularity::Day => "DAY",
            Granularity::Week => "WEEK",
            Granularity::Month => "MONTH",
            Granularity::Quarter => "QUARTER",
            Granularity::Year => "YEAR",
            Granularity::All => "ALL",
        }
    }

    /// Start of the period containing `t`
    pub fn lower(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Granularity::Hour => {
                let hour = NaiveTime::from_hms_opt(t.hour(), 0, 0).unwrap_or_default();
                Utc.from_utc_datetime(&t.date_naive().and_time(hour))
            }
            Granularity::Day => start_of_day(t.date_naive()),
            Granularity::Week => {
                let date = t.date_naive();
                let offset = date.weekday().num_days_from_monday() as i64;
                date.checked_sub_signed(Duration::days(offset))
                    .map_or(DateTime::<Utc>::MIN_UTC, start_of_day)
            }
            Granularity::Month => start_of_day(first_of_month(t.year(), t.month())),
            Granularity::Quarter => {
                let month = (t.month0() / 3) * 3 + 1;
                start_of_day(first_of_month(t.year(), month))
            }
            Granularity::Year => start_of_day(first_of_month(t.year(), 1)),
            Granularity::All => DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Exclusive end of the period containing `t`, saturating at
    /// `DateTime::<Utc>::MAX_UTC` for the last representable period.
    pub fn upper(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let lower = self.lower(t);
        match self {
            Granularity::Hour => saturating_add(lower, Duration::hours(1)),
            Granularity::Day => saturating_add(lower, Duration::days(1)),
            Granularity::Week => saturating_add(lower, Duration::weeks(1)),
            Granularity::Month => add_months(lower, 1),
            Granularity::Quarter => add_months(lower, 3),
            Granularity::Year => add_months(lower, 12),
            Granularity::All => DateTime::<Utc>::MAX_UTC,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn saturating_add(t: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    t.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// `t` is always the first instant of a month here
fn add_months(t: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    let total = t.month0() + months;
    let year = t.year() + (total / 12) as i32;
    NaiveDate::from_ymd_opt(year, total % 12 + 1, 1)
        .map_or(DateTime::<Utc>::MAX_UTC, start_of_day)
}

/// Half-open time range `[lower, upper)` aligned to a granularity.
///
/// Used as the unit of incremental sync: the scheduler asks a driver which
/// intervals exist and then requests objects one interval at a time.
///
/// Deserialized intervals must already be aligned; a stored `lower`/`upper`
/// pair that `TimeInterval::new` would not produce is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StoredInterval")]
pub struct TimeInterval {
    granularity: Granularity,
    lower: DateTime<Utc>,
    upper: DateTime<Utc>,
}

impl TimeInterval {
    /// Interval of `granularity` that contains `t`
    pub fn new(granularity: Granularity, t: DateTime<Utc>) -> Self {
        Self {
            granularity,
            lower: granularity.lower(t),
            upper: granularity.upper(t),
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn lower(&self) -> DateTime<Utc> {
        self.lower
    }

    pub fn upper(&self) -> DateTime<Utc> {
        self.upper
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.lower <= t && t < self.upper
    }

    pub fn is_all(&self) -> bool {
        self.granularity == Granularity::All
    }

    /// Stable key identifying the interval in sync state
    pub fn signature(&self) -> String {
        format!("{}_{}", self.lower.to_rfc3339(), self.upper.to_rfc3339())
    }
}

#[derive(Deserialize)]
struct StoredInterval {
    granularity: Granularity,
    lower: DateTime<Utc>,
    upper: DateTime<Utc>,
}

impl TryFrom<StoredInterval> for TimeInterval {
    type Error = String;

    fn try_from(stored: StoredInterval) -> Result<Self, Self::Error> {
        let interval = TimeInterval::new(stored.granularity, stored.lower);
        if interval.lower != stored.lower || interval.upper != stored.upper {
            return Err(format!(
                "interval [{} - {}) is not aligned to {}",
                stored.lower.to_rfc3339(),
                stored.upper.to_rfc3339(),
                stored.granularity
            ));
        }
        Ok(interval)
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return f.write_str("ALL");
        }
        write!(
            f,
            "{} [{} - {})",
            self.granularity,
            self.lower.to_rfc3339(),
            self.upper.to_rfc3339()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 17).unwrap()
    }

    #[test]
    fn test_day_interval_is_half_open() {
        let interval = TimeInterval::new(Granularity::Day, at(2024, 3, 15, 13, 45));

        assert_eq!(interval.lower(), Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
        assert_eq!(interval.upper(), Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap());
        assert!(interval.contains(interval.lower()));
        assert!(!interval.contains(interval.upper()));
    }

    #[test]
    fn test_hour_interval() {
        let interval = TimeInterval::new(Granularity::Hour, at(2024, 3, 15, 13, 45));
        assert_eq!(interval.lower(), Utc.with_ymd_and_hms(2024, 3, 15, 13, 0, 0).unwrap());
        assert_eq!(interval.upper(), Utc.with_ymd_and_hms(2024, 3, 15, 14, 0, 0).unwrap());
    }

    #[test]
    fn test_week_starts_on_monday() {
        // 2024-03-17 is a Sunday
        let interval = TimeInterval::new(Granularity::Week, at(2024, 3, 17, 23, 0));
        assert_eq!(interval.lower(), Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
        assert_eq!(interval.upper(), Utc.with_ymd_and_hms(2024, 3, 18, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_month_quarter_year_roll_over() {
        let december = at(2023, 12, 31, 23, 59);

        let month = TimeInterval::new(Granularity::Month, december);
        assert_eq!(month.lower(), Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(month.upper(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let quarter = TimeInterval::new(Granularity::Quarter, at(2024, 5, 20, 8, 0));
        assert_eq!(quarter.lower(), Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());
        assert_eq!(quarter.upper(), Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap());

        let year = TimeInterval::new(Granularity::Year, december);
        assert_eq!(year.lower(), Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(year.upper(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_all_interval_contains_everything() {
        let interval = TimeInterval::new(Granularity::All, Utc::now());
        assert!(interval.is_all());
        assert!(interval.contains(at(1999, 1, 1, 0, 0)));
        assert!(interval.contains(at(2099, 1, 1, 0, 0)));
        assert_eq!(interval.to_string(), "ALL");
    }

    #[test]
    fn test_last_period_saturates() {
        let max = DateTime::<Utc>::MAX_UTC;
        for granularity in [
            Granularity::Hour,
            Granularity::Day,
            Granularity::Week,
            Granularity::Month,
            Granularity::Quarter,
            Granularity::Year,
        ] {
            let interval = TimeInterval::new(granularity, max);
            assert_eq!(interval.upper(), max, "{}", granularity);
            assert!(interval.lower() <= interval.upper());
        }

        let first = TimeInterval::new(Granularity::Week, DateTime::<Utc>::MIN_UTC);
        assert!(first.lower() <= first.upper());

        let far = TimeInterval::new(Granularity::Hour, at(3000, 6, 1, 13, 45));
        assert_eq!(far.lower(), Utc.with_ymd_and_hms(3000, 6, 1, 13, 0, 0).unwrap());
    }

    #[test]
    fn test_stored_interval_must_be_aligned() {
        let interval = TimeInterval::new(Granularity::Day, at(2024, 3, 15, 13, 45));
        let wire = serde_json::to_value(interval).unwrap();
        let decoded: TimeInterval = serde_json::from_value(wire).unwrap();
        assert_eq!(decoded, interval);

        let misaligned = serde_json::json!({
            "granularity": "DAY",
            "lower": "2024-03-15T13:45:00Z",
            "upper": "2024-03-15T12:00:00Z"
        });
        let err = serde_json::from_value::<TimeInterval>(misaligned).unwrap_err();
        assert!(err.to_string().contains("is not aligned to DAY"));
    }

    #[test]
    fn test_signature_is_stable() {
        let a = TimeInterval::new(Granularity::Day, at(2024, 3, 15, 1, 0));
        let b = TimeInterval::new(Granularity::Day, at(2024, 3, 15, 22, 30));
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a, b);
    }
}
