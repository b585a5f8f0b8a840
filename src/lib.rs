//! # Rent Roll
//!
//! A library for reconciling monthly rent-roll data whose owner and property
//! labels were typed by hand, month after month, with drifting case and
//! accents.
//!
//! ## Core Concepts
//!
//! - **Structure**: The administrator-maintained list of owners and their properties
//! - **Period Record**: One month of data, `owner -> property -> amount`, plus note and on-time keys
//! - **Normalization**: Labels compare equal when they differ only in case, accents or outer whitespace
//! - **Annual Aggregate**: Year totals per owner and property, derived on demand and never stored
//! - **Contracts**: Lease metadata keyed by `<owner-slug>__<property-slug>`
//!
//! ## Example
//!
//! ```rust,ignore
//! use rent_roll::*;
//! use serde_json::json;
//!
//! let documents = vec![
//!     ("2025-01".to_string(), json!({ "Acme": { "Unit A": 500000, "Unit A__obs": "paid late" } })),
//!     ("2025-02".to_string(), json!({ "ACME": { "unit a": 300000 } })),
//! ];
//!
//! let records = load_period_records(documents.iter().map(|(id, doc)| (id.as_str(), doc)))?;
//! let annual = aggregate_year(&records, 2025);
//!
//! assert_eq!(annual.amount("acme", "UNIT A"), 800000.0);
//! println!("{}", annual.to_csv());
//! ```

pub mod aggregate;
pub mod config;
pub mod contract;
pub mod error;
pub mod messages;
pub mod months;
pub mod normalize;
pub mod period;
pub mod resolver;
pub mod state;
pub mod structure;
pub mod uf;

#[cfg(feature = "mindicador")]
pub mod mindicador;

pub use aggregate::{
    aggregate_year, aggregate_year_with, grand_total, owner_rows, owner_total, property_history,
    variation_pct, AmountSource, AnnualAggregate, HistoryPoint, PropertyRow,
};
pub use config::RentRollConfig;
pub use contract::{
    round_amount, AdjustmentDue, Contract, ContractBook, Currency, MissingContract, MissingStatus,
    Money, OwnerMissingContracts,
};
pub use error::{RentRollError, Result};
pub use messages::{can_delete, new_message, thread, Message, Role, UserDirectory, UserProfile};
pub use months::*;
pub use normalize::*;
pub use period::{CellValue, KeySchema, OwnerBlock, PeriodKey, PeriodRecord};
pub use resolver::*;
pub use state::{RentRollState, ViewMode};
pub use structure::{Owner, OwnerStructure, StructureEdit};
pub use uf::*;

#[cfg(feature = "mindicador")]
pub use mindicador::MindicadorClient;

use log::{debug, info};

/// Reads the `rents` collection, given as `(document id, document)` pairs,
/// into period records ordered by month. Documents whose id is not a
/// `YYYY-MM` month are skipped.
pub fn load_period_records<'a, I>(documents: I) -> Result<Vec<PeriodRecord>>
where
    I: IntoIterator<Item = (&'a str, &'a serde_json::Value)>,
{
    let mut records = Vec::new();

    for (id, document) in documents {
        let Ok(month) = id.parse::<MonthId>() else {
            debug!("Skipping rents document with non-month id '{}'", id);
            continue;
        };
        records.push(PeriodRecord::from_document(month, document)?);
    }

    records.sort_by_key(|r| r.month);
    info!("Loaded {} period records", records.len());
    Ok(records)
}

/// Loads the `rents` documents and aggregates `year` in one step.
pub fn annual_from_documents<'a, I>(documents: I, year: i32) -> Result<AnnualAggregate>
where
    I: IntoIterator<Item = (&'a str, &'a serde_json::Value)>,
{
    let records = load_period_records(documents)?;
    Ok(aggregate_year(&records, year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_end_to_end_processing() {
        let documents = vec![
            (
                "2025-01".to_string(),
                json!({ "Acme": { "Unit A": 500000, "Unit A__obs": "paid late" }, "updatedAt": 1 }),
            ),
            ("2025-02".to_string(), json!({ "data": { "ACME": { "unit a": 300000 } } })),
            ("2024-12".to_string(), json!({ "Acme": { "Unit A": 1 } })),
            ("settings".to_string(), json!({ "theme": "dark" })),
        ];

        let records =
            load_period_records(documents.iter().map(|(id, doc)| (id.as_str(), doc))).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].month.to_string(), "2024-12");

        let annual = aggregate_year(&records, 2025);
        assert_eq!(annual.amount("acme", "unit a"), 800000.0);
        assert_eq!(annual.totals.len(), 1);
    }

    #[test]
    fn test_malformed_rents_document_is_an_error() {
        let documents = vec![("2025-01".to_string(), json!([1, 2, 3]))];
        let result = annual_from_documents(documents.iter().map(|(id, doc)| (id.as_str(), doc)), 2025);
        assert!(matches!(result, Err(RentRollError::MalformedDocument(_))));
    }
}
