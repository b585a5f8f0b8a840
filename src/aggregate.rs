use crate::months::MonthId;
use crate::normalize::pretty_label;
use crate::period::{KeySchema, PeriodRecord};
use crate::resolver::{find_key, find_nested_value, find_value, AsAmount};
use crate::structure::{Owner, OwnerStructure};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Anything that answers "how much did this property bring in".
pub trait AmountSource {
    fn amount_of(&self, owner: &str, property: &str) -> f64;
}

impl AmountSource for PeriodRecord {
    fn amount_of(&self, owner: &str, property: &str) -> f64 {
        self.amount(owner, property)
    }
}

/// Year totals per owner and property. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualAggregate {
    pub year: i32,
    pub totals: BTreeMap<String, BTreeMap<String, f64>>,
}

impl AmountSource for AnnualAggregate {
    fn amount_of(&self, owner: &str, property: &str) -> f64 {
        self.amount(owner, property)
    }
}

impl AnnualAggregate {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            totals: BTreeMap::new(),
        }
    }

    pub fn amount(&self, owner: &str, property: &str) -> f64 {
        find_nested_value(&self.totals, owner, property)
    }

    /// Sum of every property recorded for an owner, configured or not.
    pub fn owner_total(&self, owner: &str) -> f64 {
        find_value(&self.totals, owner)
            .map(|block| block.values().sum())
            .unwrap_or(0.0)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("Year,Owner,Property,Total\n");

        for (owner, block) in &self.totals {
            for (property, total) in block {
                output.push_str(&format!(
                    "{},{},{},{:.2}\n",
                    self.year,
                    csv_field(owner),
                    csv_field(property),
                    total
                ));
            }
        }

        output
    }
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

pub fn aggregate_year(records: &[PeriodRecord], year: i32) -> AnnualAggregate {
    aggregate_year_with(records, year, &KeySchema::default())
}

/// Sums every amount of the records that fall in `year`.
///
/// Note and flag keys never contribute, unparseable amounts count as zero.
/// Owners and properties are merged by label; the casing kept is the one
/// seen first in calendar order, so shuffling `records` does not change the
/// result.
pub fn aggregate_year_with(
    records: &[PeriodRecord],
    year: i32,
    schema: &KeySchema,
) -> AnnualAggregate {
    let mut in_year: Vec<&PeriodRecord> = records
        .iter()
        .filter(|r| r.month.year() == year)
        .collect();
    in_year.sort_by_key(|r| r.month);

    debug!(
        "Aggregating {} of {} period records for {}",
        in_year.len(),
        records.len(),
        year
    );

    let mut aggregate = AnnualAggregate::new(year);

    for record in in_year {
        for (owner, block) in &record.owners {
            let owner_key = find_key(&aggregate.totals, owner)
                .map(str::to_string)
                .unwrap_or_else(|| owner.clone());
            let totals = aggregate.totals.entry(owner_key).or_default();

            for (key, value) in block {
                if !schema.is_amount_key(key) {
                    continue;
                }
                let property_key = find_key(totals, key)
                    .map(str::to_string)
                    .unwrap_or_else(|| key.clone());
                *totals.entry(property_key).or_insert(0.0) += value.as_amount();
            }
        }
    }

    aggregate
}

/// Total over the configured owners and properties only; stale keys left by
/// deleted or renamed properties are not counted.
pub fn grand_total(structure: &OwnerStructure, source: &impl AmountSource) -> f64 {
    structure
        .owners
        .iter()
        .map(|owner| owner_total(owner, source))
        .sum()
}

pub fn owner_total(owner: &Owner, source: &impl AmountSource) -> f64 {
    owner
        .properties
        .iter()
        .map(|property| source.amount_of(&owner.name, property))
        .sum()
}

/// Month-over-month change in percent. `None` when there is no baseline to
/// compare against (previous is zero but current is not).
pub fn variation_pct(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 {
        return if current == 0.0 { Some(0.0) } else { None };
    }
    Some((current - previous) / previous.abs() * 100.0)
}

/// One line of an owner's monthly table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRow {
    /// The configured label, used as the key for writes.
    pub name: String,
    pub display_name: String,
    pub amount: f64,
    pub previous: f64,
    pub variation_pct: Option<f64>,
    pub observation: String,
    pub on_time: Option<bool>,
}

pub fn owner_rows(
    owner: &Owner,
    current: &PeriodRecord,
    previous: &PeriodRecord,
    schema: &KeySchema,
) -> Vec<PropertyRow> {
    owner
        .properties
        .iter()
        .map(|property| {
            let amount = current.amount(&owner.name, property);
            let prev = previous.amount(&owner.name, property);
            PropertyRow {
                name: property.clone(),
                display_name: pretty_label(property),
                amount,
                previous: prev,
                variation_pct: variation_pct(amount, prev),
                observation: current
                    .observation(&owner.name, property, schema)
                    .unwrap_or_default()
                    .to_string(),
                on_time: current.on_time(&owner.name, property, schema),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub month: MonthId,
    pub label: String,
    pub value: f64,
}

/// The last `n` months of one property ending at `anchor`, oldest first.
/// Months without a record read as zero.
pub fn property_history(
    records: &[PeriodRecord],
    owner: &str,
    property: &str,
    anchor: MonthId,
    n: usize,
) -> Vec<HistoryPoint> {
    let mut months = anchor.last_n(n);
    months.reverse();

    months
        .into_iter()
        .map(|month| {
            let value = records
                .iter()
                .find(|r| r.month == month)
                .map(|r| r.amount(owner, property))
                .unwrap_or(0.0);
            HistoryPoint {
                month,
                label: month.label(),
                value,
            }
        })
        .collect()
}
