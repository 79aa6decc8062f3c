//! Financial-year calendar used by every report.
//!
//! A financial year runs from May to April and is labelled `"YYYY-YY"`
//! (`"2025-26"` covers May 2025 through April 2026). Months are ordered
//! May first; cumulative windows always start at May.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// A month named within the financial year, declared in financial-year order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "UPPERCASE")]
pub enum FinancialMonth {
    #[sea_orm(string_value = "MAY")]
    May,
    #[sea_orm(string_value = "JUNE")]
    June,
    #[sea_orm(string_value = "JULY")]
    July,
    #[sea_orm(string_value = "AUGUST")]
    August,
    #[sea_orm(string_value = "SEPTEMBER")]
    September,
    #[sea_orm(string_value = "OCTOBER")]
    October,
    #[sea_orm(string_value = "NOVEMBER")]
    November,
    #[sea_orm(string_value = "DECEMBER")]
    December,
    #[sea_orm(string_value = "JANUARY")]
    January,
    #[sea_orm(string_value = "FEBRUARY")]
    February,
    #[sea_orm(string_value = "MARCH")]
    March,
    #[sea_orm(string_value = "APRIL")]
    April,
}

impl FinancialMonth {
    /// All twelve months, May first.
    pub const ALL: [FinancialMonth; 12] = [
        FinancialMonth::May,
        FinancialMonth::June,
        FinancialMonth::July,
        FinancialMonth::August,
        FinancialMonth::September,
        FinancialMonth::October,
        FinancialMonth::November,
        FinancialMonth::December,
        FinancialMonth::January,
        FinancialMonth::February,
        FinancialMonth::March,
        FinancialMonth::April,
    ];

    /// Position within the financial year (May = 0, April = 11).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Calendar month number (January = 1).
    pub fn calendar_month(self) -> u32 {
        ((self.index() as u32 + 4) % 12) + 1
    }

    pub fn from_calendar_month(month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) {
            return None;
        }
        let index = (month + 12 - 5) % 12;
        Some(Self::ALL[index as usize])
    }

    pub fn of_date(date: &DateTime<Utc>) -> Self {
        // month() is always 1..=12
        Self::ALL[((date.month() + 12 - 5) % 12) as usize]
    }

    /// Upper-case enum label, e.g. `"JUNE"`.
    pub fn as_str(self) -> &'static str {
        match self {
            FinancialMonth::May => "MAY",
            FinancialMonth::June => "JUNE",
            FinancialMonth::July => "JULY",
            FinancialMonth::August => "AUGUST",
            FinancialMonth::September => "SEPTEMBER",
            FinancialMonth::October => "OCTOBER",
            FinancialMonth::November => "NOVEMBER",
            FinancialMonth::December => "DECEMBER",
            FinancialMonth::January => "JANUARY",
            FinancialMonth::February => "FEBRUARY",
            FinancialMonth::March => "MARCH",
            FinancialMonth::April => "APRIL",
        }
    }

    /// Display label, e.g. `"June"`.
    pub fn label(self) -> &'static str {
        match self {
            FinancialMonth::May => "May",
            FinancialMonth::June => "June",
            FinancialMonth::July => "July",
            FinancialMonth::August => "August",
            FinancialMonth::September => "September",
            FinancialMonth::October => "October",
            FinancialMonth::November => "November",
            FinancialMonth::December => "December",
            FinancialMonth::January => "January",
            FinancialMonth::February => "February",
            FinancialMonth::March => "March",
            FinancialMonth::April => "April",
        }
    }

    /// Months from May through `self`, inclusive.
    pub fn cumulative(self) -> &'static [FinancialMonth] {
        &FY_ORDER[..=self.index()]
    }

    pub fn quarter(self) -> Quarter {
        match self.index() / 3 {
            0 => Quarter::Q1,
            1 => Quarter::Q2,
            2 => Quarter::Q3,
            _ => Quarter::Q4,
        }
    }
}

static FY_ORDER: [FinancialMonth; 12] = FinancialMonth::ALL;

impl fmt::Display for FinancialMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FinancialMonth {
    type Err = FinancialYearError;

    /// Accepts enum labels, English month names and three-letter abbreviations,
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == wanted || (wanted.len() == 3 && m.as_str().starts_with(&wanted)))
            .ok_or_else(|| FinancialYearError::InvalidMonth(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FinancialYearError {
    #[error("Financial year must look like 2025-26, got '{0}'")]
    InvalidLabel(String),
    #[error("Unknown month '{0}'")]
    InvalidMonth(String),
}

/// A May-to-April financial year identified by its starting calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FinancialYear {
    start_year: i32,
}

impl FinancialYear {
    pub fn new(start_year: i32) -> Self {
        Self { start_year }
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    /// Parses `"YYYY-YY"`, requiring the second half to follow the first.
    pub fn parse(label: &str) -> Result<Self, FinancialYearError> {
        let invalid = || FinancialYearError::InvalidLabel(label.to_string());
        let (first, second) = label.trim().split_once('-').ok_or_else(invalid)?;
        let digits = |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());
        // A leading zero year would not print back as the same label
        if !digits(first, 4) || !digits(second, 2) || first.starts_with('0') {
            return Err(invalid());
        }
        let start: i32 = first.parse().map_err(|_| invalid())?;
        let end: i32 = second.parse().map_err(|_| invalid())?;
        if (start + 1) % 100 != end {
            return Err(invalid());
        }
        Ok(Self::new(start))
    }

    /// The financial year containing `date`; May starts a new year.
    pub fn containing(date: &DateTime<Utc>) -> Self {
        if date.month() >= 5 {
            Self::new(date.year())
        } else {
            Self::new(date.year() - 1)
        }
    }

    pub fn current() -> Self {
        Self::containing(&Utc::now())
    }

    /// The immediately preceding year; both halves of the label step back.
    pub fn previous(&self) -> Self {
        Self::new(self.start_year - 1)
    }

    pub fn label(&self) -> String {
        format!("{}-{:02}", self.start_year, (self.start_year + 1).rem_euclid(100))
    }

    /// Calendar year in which `month` falls for this financial year.
    pub fn calendar_year_of(&self, month: FinancialMonth) -> i32 {
        if month.calendar_month() >= 5 {
            self.start_year
        } else {
            self.start_year + 1
        }
    }

    /// Half-open `[start, end)` instant range covering `month`.
    pub fn month_range(&self, month: FinancialMonth) -> (DateTime<Utc>, DateTime<Utc>) {
        let year = self.calendar_year_of(month);
        let start = first_instant(year, month.calendar_month());
        let end = if month.calendar_month() == 12 {
            first_instant(year + 1, 1)
        } else {
            first_instant(year, month.calendar_month() + 1)
        };
        (start, end)
    }

    /// Half-open range covering May 1 through April 30.
    pub fn range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            first_instant(self.start_year, 5),
            first_instant(self.start_year + 1, 5),
        )
    }

    pub fn contains(&self, date: &DateTime<Utc>) -> bool {
        let (start, end) = self.range();
        *date >= start && *date < end
    }
}

fn first_instant(year: i32, month: u32) -> DateTime<Utc> {
    let date = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN);
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

impl fmt::Display for FinancialYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for FinancialYear {
    type Err = FinancialYearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Financial quarters: Q1 May-Jul, Q2 Aug-Oct, Q3 Nov-Jan, Q4 Feb-Apr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    pub fn label(self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Q4 => "Q4",
        }
    }
}

/// Fixed month-to-season table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
pub enum Season {
    Spring,
    Summer,
    Monsoon,
    Winter,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Monsoon, Season::Winter];

    /// Spring Mar-May, Summer Jun-Aug, Monsoon Sep-Nov, Winter Dec-Feb.
    pub fn of_calendar_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Monsoon,
            _ => Season::Winter,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Monsoon => "Monsoon",
            Season::Winter => "Winter",
        }
    }
}
