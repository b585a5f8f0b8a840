use crate::error::{RentRollError, Result};
use chrono::{Datelike, Local, NaiveDate};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MONTH_NAMES_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

pub const MONTH_ABBREVIATIONS_ES: [&str; 12] = [
    "ENE", "FEB", "MAR", "ABR", "MAY", "JUN", "JUL", "AGO", "SEP", "OCT", "NOV", "DIC",
];

const MIN_INDEX: i32 = 0;
const MAX_INDEX: i32 = 9999 * 12 + 11;

/// A calendar month, written `YYYY-MM`. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthId {
    year: i32,
    month: u32,
}

impl MonthId {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(RentRollError::InvalidMonthId(format!(
                "{:04}-{:02}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    /// The month of `date`, clamped to the `0000-01..=9999-12` range a
    /// `YYYY-MM` id can spell.
    pub fn from_date<D: Datelike>(date: &D) -> Self {
        Self::from_index(date.year() * 12 + date.month0() as i32)
    }

    fn from_index(index: i32) -> Self {
        let index = index.clamp(MIN_INDEX, MAX_INDEX);
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// The month of today's date on the local clock.
    pub fn current() -> Self {
        Self::from_date(&Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Moves `delta` months forward (or backward when negative), rolling the
    /// year. Stops at `0000-01` and `9999-12`.
    pub fn offset(&self, delta: i32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1);
        Self::from_index(index.saturating_add(delta))
    }

    pub fn previous(&self) -> Self {
        self.offset(-1)
    }

    pub fn next(&self) -> Self {
        self.offset(1)
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_between(&self, other: &MonthId) -> i32 {
        let year_diff = other.year - self.year;
        let month_diff = other.month as i32 - self.month as i32;
        year_diff * 12 + month_diff
    }

    /// `n` contiguous months ending at `self`, newest first.
    pub fn last_n(&self, n: usize) -> Vec<MonthId> {
        (0..n).map(|i| self.offset(-(i as i32))).collect()
    }

    /// Parses `raw`, or returns `fallback` when it is not a valid `YYYY-MM`.
    pub fn parse_or(raw: &str, fallback: MonthId) -> Self {
        raw.parse().unwrap_or(fallback)
    }

    /// Parses `raw`, falling back to the current month for malformed input.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.parse() {
            Ok(id) => id,
            Err(_) => {
                let current = Self::current();
                warn!(
                    "Malformed month id '{}', falling back to current month {}",
                    raw, current
                );
                current
            }
        }
    }

    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES_ES[(self.month - 1) as usize]
    }

    pub fn abbreviation(&self) -> &'static str {
        MONTH_ABBREVIATIONS_ES[(self.month - 1) as usize]
    }

    /// Human label such as `"Enero 2025"`.
    pub fn label(&self) -> String {
        format!("{} {}", capitalize(self.month_name()), self.year)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for MonthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthId {
    type Err = RentRollError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 7
            && bytes[4] == b'-'
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[5..].iter().all(u8::is_ascii_digit);
        if !well_formed {
            return Err(RentRollError::InvalidMonthId(s.to_string()));
        }

        let year: i32 = s[..4]
            .parse()
            .map_err(|_| RentRollError::InvalidMonthId(s.to_string()))?;
        let month: u32 = s[5..]
            .parse()
            .map_err(|_| RentRollError::InvalidMonthId(s.to_string()))?;

        Self::new(year, month).map_err(|_| RentRollError::InvalidMonthId(s.to_string()))
    }
}

impl TryFrom<String> for MonthId {
    type Error = RentRollError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MonthId> for String {
    fn from(id: MonthId) -> Self {
        id.to_string()
    }
}

/// An entry of the month selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthOption {
    pub id: MonthId,
    pub label: String,
}

/// Month selector entries around `anchor`, newest first: `future` months
/// after the anchor, the anchor itself, then `past` months before it.
pub fn month_options(anchor: MonthId, past: u32, future: u32) -> Vec<MonthOption> {
    (-(past as i32)..=future as i32)
        .rev()
        .map(|delta| {
            let id = anchor.offset(delta);
            MonthOption {
                id,
                label: id.label(),
            }
        })
        .collect()
}

pub fn month_id(date: NaiveDate) -> String {
    MonthId::from_date(&date).to_string()
}

pub fn previous_month_id(id: &str) -> String {
    MonthId::parse_lenient(id).previous().to_string()
}

pub fn last_n_month_ids(anchor: &str, n: usize) -> Vec<String> {
    MonthId::parse_lenient(anchor)
        .last_n(n)
        .into_iter()
        .map(|id| id.to_string())
        .collect()
}

pub fn month_label(id: &str) -> String {
    MonthId::parse_lenient(id).label()
}
