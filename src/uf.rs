//! Unidad de Fomento (UF) quotes, CLP/UF conversion and the es-CL number
//! formats the rent roll is typed and displayed in.

use crate::error::{RentRollError, Result};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The UF value in pesos on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UfQuote {
    pub value: f64,
    pub date: Option<NaiveDate>,
}

impl UfQuote {
    pub fn new(value: f64, date: Option<NaiveDate>) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(RentRollError::UfUnavailable(format!(
                "quote must be positive, got {}",
                value
            )));
        }
        Ok(Self { value, date })
    }

    /// Reads the newest quote of a mindicador.cl indicator response:
    /// `{"serie": [{"fecha": "...", "valor": 38384.38}, ...]}`.
    pub fn from_mindicador(body: &Value) -> Result<Self> {
        let latest = body
            .get("serie")
            .and_then(Value::as_array)
            .and_then(|serie| serie.first())
            .ok_or_else(|| RentRollError::UfUnavailable("response has no 'serie' entries".to_string()))?;

        let value = latest
            .get("valor")
            .and_then(Value::as_f64)
            .ok_or_else(|| RentRollError::UfUnavailable("latest entry has no 'valor'".to_string()))?;

        let date = latest
            .get("fecha")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.date_naive());

        Self::new(value, date)
    }

    pub fn clp_to_uf(&self, clp: f64) -> f64 {
        clp / self.value
    }

    pub fn uf_to_clp(&self, uf: f64) -> f64 {
        uf * self.value
    }
}

/// Pesos to UF, `None` when no usable quote is loaded.
pub fn clp_to_uf(clp: f64, quote: Option<&UfQuote>) -> Option<f64> {
    quote.filter(|q| q.value > 0.0).map(|q| q.clp_to_uf(clp))
}

/// UF to pesos, `None` when no usable quote is loaded.
pub fn uf_to_clp(uf: f64, quote: Option<&UfQuote>) -> Option<f64> {
    quote.filter(|q| q.value > 0.0).map(|q| q.uf_to_clp(uf))
}

/// Parses user input written with es-CL separators: dots group thousands
/// and a comma marks decimals. Currency signs and spaces are ignored.
pub fn parse_number_loose(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// [`parse_number_loose`], reading anything unparseable as zero.
pub fn parse_number_es(raw: &str) -> f64 {
    parse_number_loose(raw).unwrap_or(0.0)
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    grouped
}

/// Whole pesos with dot grouping: `$1.234.567`.
pub fn format_clp(amount: f64) -> String {
    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{}${}", sign, group_thousands(&format!("{:.0}", rounded.abs())))
}

/// UF with two decimals: `1.234,57`.
pub fn format_uf(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{},{}", sign, group_thousands(int_part), frac_part)
}
