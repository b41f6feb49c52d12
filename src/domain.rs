use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

/// A calendar month, the granularity of the date-range filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, KiraError> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(KiraError::InvalidPeriod(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    pub fn from_date<D: Datelike>(date: &D) -> Self {
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
        // Constructors only admit months chrono can represent.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
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

    pub fn prev(&self) -> Self {
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
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| KiraError::InvalidPeriod(value.to_string()))?;
        let is_valid = year.len() == 4
            && month.len() == 2
            && year.chars().all(|ch| ch.is_ascii_digit())
            && month.chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(KiraError::InvalidPeriod(value.to_string()));
        }
        let year = year
            .parse::<i32>()
            .map_err(|_| KiraError::InvalidPeriod(value.to_string()))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| KiraError::InvalidPeriod(value.to_string()))?;
        Self::new(year, month).map_err(|_| KiraError::InvalidPeriod(value.to_string()))
    }
}

impl TryFrom<String> for Period {
    type Error = KiraError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(value: Period) -> Self {
        value.to_string()
    }
}

/// Inclusive month range. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: Period,
    end: Period,
}

impl DateRange {
    pub fn new(start: Period, end: Period) -> Result<Self, KiraError> {
        if start > end {
            return Err(KiraError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Period {
        self.start
    }

    pub fn end(&self) -> Period {
        self.end
    }

    pub fn contains(&self, period: Period) -> bool {
        self.start <= period && period <= self.end
    }

    /// Clamps both bounds into `bounds`. Order is preserved because the
    /// same monotonic clamp is applied to each side.
    pub fn clamp_to(&self, bounds: &DateRange) -> DateRange {
        DateRange {
            start: self.start.clamp(bounds.start, bounds.end),
            end: self.end.clamp(bounds.start, bounds.end),
        }
    }

    /// Builds a sub-range of `self` from optional ends. A missing end takes
    /// the matching bound and a given end is clamped first, so a lone start
    /// past the last month yields the last month alone.
    pub fn narrow(
        &self,
        start: Option<Period>,
        end: Option<Period>,
    ) -> Result<DateRange, KiraError> {
        let start = start.map_or(self.start, |p| p.clamp(self.start, self.end));
        let end = end.map_or(self.end, |p| p.clamp(self.start, self.end));
        DateRange::new(start, end)
    }

    pub fn months(&self) -> usize {
        let span = (self.end.year - self.start.year) * 12 + self.end.month as i32
            - self.start.month as i32;
        span as usize + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

/// 8-bit RGBA color, serialized as `[r, g, b, a]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self::opaque((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    pub fn r(&self) -> u8 {
        self.0[0]
    }

    pub fn g(&self) -> u8 {
        self.0[1]
    }

    pub fn b(&self) -> u8 {
        self.0[2]
    }

    pub fn a(&self) -> u8 {
        self.0[3]
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a()
        )
    }
}

/// One cleaned sighting of the base table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub species: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub event_date: NaiveDateTime,
    pub year: i32,
    pub period: Period,
    pub region: Option<String>,
    /// Global row count of `species` across the whole base table.
    pub species_count: Option<usize>,
}

impl Observation {
    pub fn species(&self) -> Option<&str> {
        self.species.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_period_valid() {
        let period: Period = "2019-05".parse().unwrap();
        assert_eq!(period.year(), 2019);
        assert_eq!(period.month(), 5);
        assert_eq!(period.to_string(), "2019-05");
    }

    #[test]
    fn parse_period_invalid() {
        for raw in ["2019-13", "2019-5", "19-05", "2019/05", "abcd-ef"] {
            let err = raw.parse::<Period>().unwrap_err();
            assert_matches!(err, KiraError::InvalidPeriod(_));
        }
    }

    #[test]
    fn period_steps_across_years() {
        let dec: Period = "2020-12".parse().unwrap();
        assert_eq!(dec.next().to_string(), "2021-01");
        assert_eq!(dec.next().prev(), dec);
    }

    #[test]
    fn date_range_rejects_reversed_bounds() {
        let a: Period = "2021-03".parse().unwrap();
        let b: Period = "2020-03".parse().unwrap();
        assert_matches!(
            DateRange::new(a, b),
            Err(KiraError::InvalidDateRange { .. })
        );
    }

    #[test]
    fn date_range_clamps_into_bounds() {
        let bounds = DateRange::new("2018-01".parse().unwrap(), "2020-06".parse().unwrap())
            .unwrap();
        let wide = DateRange::new("2010-01".parse().unwrap(), "2030-01".parse().unwrap())
            .unwrap();
        assert_eq!(wide.clamp_to(&bounds), bounds);
        assert_eq!(bounds.months(), 30);
        assert!(bounds.contains("2018-01".parse().unwrap()));
        assert!(!bounds.contains("2020-07".parse().unwrap()));
    }

    #[test]
    fn narrow_clamps_each_given_end() {
        let bounds = DateRange::new("2018-01".parse().unwrap(), "2020-06".parse().unwrap())
            .unwrap();
        let late = bounds.narrow(Some("2030-01".parse().unwrap()), None).unwrap();
        assert_eq!(late.to_string(), "2020-06 .. 2020-06");
        let early = bounds.narrow(None, Some("2010-01".parse().unwrap())).unwrap();
        assert_eq!(early.to_string(), "2018-01 .. 2018-01");
        assert_eq!(bounds.narrow(None, None).unwrap(), bounds);
        assert_matches!(
            bounds.narrow(Some("2019-05".parse().unwrap()), Some("2019-01".parse().unwrap())),
            Err(KiraError::InvalidDateRange { .. })
        );
    }

    #[test]
    fn rgba_from_hex() {
        let color = Rgba::from_hex(0x1f77b4);
        assert_eq!(color.0, [31, 119, 180, 255]);
        assert_eq!(color.to_string(), "#1f77b4ff");
    }
}
