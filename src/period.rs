//! Per-month rent data as stored in the `rents/<YYYY-MM>` documents.
//!
//! A record maps owner labels to a block of sibling keys. A bare property
//! label holds the amount; the same label followed by a reserved suffix holds
//! the free-text note or the on-time flag for that property.

use crate::config::RentRollConfig;
use crate::error::{RentRollError, Result};
use crate::months::MonthId;
use crate::normalize::same_label;
use crate::resolver::{find_key, find_nested_value, find_value, parse_amount, AsAmount};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const METADATA_FIELD: &str = "updatedAt";
const WRAPPER_FIELD: &str = "data";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Flag(bool),
    Number(f64),
    Text(String),
    Null,
}

impl CellValue {
    /// Scalar JSON values only; arrays and objects have no meaning inside a block.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Flag(*b)),
            Value::Number(n) => Some(Self::Number(n.as_f64().unwrap_or(0.0))),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Null => Some(Self::Null),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Flag(b) => Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Text(s) => Value::String(s.clone()),
            Self::Null => Value::Null,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness of a stored flag; numbers are true when non-zero, text when non-empty.
    pub fn as_flag(&self) -> bool {
        match self {
            Self::Flag(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Text(s) => !s.is_empty(),
            Self::Null => false,
        }
    }
}

impl AsAmount for CellValue {
    fn as_amount(&self) -> f64 {
        match self {
            Self::Number(n) => n.as_amount(),
            Self::Text(s) => parse_amount(s),
            Self::Flag(_) | Self::Null => 0.0,
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

pub type OwnerBlock = BTreeMap<String, CellValue>;

/// What a key inside an owner block stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodKey<'a> {
    Amount(&'a str),
    Observation(&'a str),
    OnTime { label: &'a str, legacy: bool },
}

impl<'a> PeriodKey<'a> {
    pub fn label(&self) -> &'a str {
        match *self {
            Self::Amount(label) | Self::Observation(label) => label,
            Self::OnTime { label, .. } => label,
        }
    }
}

/// The reserved key suffixes of an owner block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    pub observation_suffix: String,
    pub on_time_suffix: String,
    pub legacy_on_time_suffixes: Vec<String>,
}

impl Default for KeySchema {
    fn default() -> Self {
        Self::from(&RentRollConfig::default())
    }
}

impl From<&RentRollConfig> for KeySchema {
    fn from(config: &RentRollConfig) -> Self {
        Self {
            observation_suffix: config.observation_suffix.clone(),
            on_time_suffix: config.on_time_suffix.clone(),
            legacy_on_time_suffixes: config.legacy_on_time_suffixes.clone(),
        }
    }
}

impl KeySchema {
    /// Suffixes match the way labels do, ignoring case and accents, so
    /// `"UNIT A__OBS"` is the note of `"UNIT A"`.
    pub fn classify<'a>(&self, key: &'a str) -> PeriodKey<'a> {
        if let Some(label) = strip_reserved_suffix(key, &self.observation_suffix) {
            return PeriodKey::Observation(label);
        }
        if let Some(label) = strip_reserved_suffix(key, &self.on_time_suffix) {
            return PeriodKey::OnTime {
                label,
                legacy: false,
            };
        }
        for suffix in &self.legacy_on_time_suffixes {
            if let Some(label) = strip_reserved_suffix(key, suffix) {
                return PeriodKey::OnTime {
                    label,
                    legacy: true,
                };
            }
        }
        PeriodKey::Amount(key)
    }

    pub fn is_amount_key(&self, key: &str) -> bool {
        matches!(self.classify(key), PeriodKey::Amount(_))
    }

    pub fn observation_key(&self, label: &str) -> String {
        format!("{}{}", label, self.observation_suffix)
    }

    pub fn on_time_key(&self, label: &str) -> String {
        format!("{}{}", label, self.on_time_suffix)
    }
}

fn strip_reserved_suffix<'a>(key: &'a str, suffix: &str) -> Option<&'a str> {
    let key = key.trim_end();
    let start = key.len().checked_sub(suffix.len())?;
    if suffix.is_empty() || !key.is_char_boundary(start) {
        return None;
    }
    same_label(&key[start..], suffix).then(|| &key[..start])
}

/// Financial data of every owner for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub month: MonthId,
    pub owners: BTreeMap<String, OwnerBlock>,
}

impl PeriodRecord {
    pub fn new(month: MonthId) -> Self {
        Self {
            month,
            owners: BTreeMap::new(),
        }
    }

    /// Reads a stored month document. A missing document (`null`) is an
    /// empty record; the `data` wrapper used by older writers is unwrapped
    /// and the `updatedAt` metadata field is dropped.
    pub fn from_document(month: MonthId, document: &Value) -> Result<Self> {
        let mut record = Self::new(month);
        let object = match document {
            Value::Null => return Ok(record),
            Value::Object(object) => unwrap_data(object),
            other => {
                return Err(RentRollError::MalformedDocument(format!(
                    "rent document {} is not an object: {}",
                    month, other
                )))
            }
        };

        for (owner, block) in object {
            if owner == METADATA_FIELD {
                continue;
            }
            let Some(block) = block.as_object() else {
                debug!("Skipping non-object owner entry '{}' in {}", owner, month);
                continue;
            };

            let mut parsed = OwnerBlock::new();
            for (key, value) in block {
                match CellValue::from_json(value) {
                    Some(cell) => {
                        parsed.insert(key.clone(), cell);
                    }
                    None => debug!("Skipping nested value at {}/{} in {}", owner, key, month),
                }
            }
            record.owners.insert(owner.clone(), parsed);
        }

        Ok(record)
    }

    /// The owner blocks as a JSON object, ready for a merge-write.
    pub fn to_document(&self) -> Value {
        let owners: Map<String, Value> = self
            .owners
            .iter()
            .map(|(owner, block)| {
                let block: Map<String, Value> = block
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                (owner.clone(), Value::Object(block))
            })
            .collect();
        Value::Object(owners)
    }

    pub fn is_empty(&self) -> bool {
        self.owners.values().all(BTreeMap::is_empty)
    }

    pub fn owner_block(&self, owner: &str) -> Option<&OwnerBlock> {
        find_value(&self.owners, owner)
    }

    pub fn amount(&self, owner: &str, property: &str) -> f64 {
        find_nested_value(&self.owners, owner, property)
    }

    pub fn observation(&self, owner: &str, property: &str, schema: &KeySchema) -> Option<&str> {
        let block = self.owner_block(owner)?;
        block.iter().find_map(|(key, value)| match schema.classify(key) {
            PeriodKey::Observation(label) if same_label(label, property) => value.as_text(),
            _ => None,
        })
    }

    /// The on-time flag of a property; the canonical suffix wins over legacy aliases.
    pub fn on_time(&self, owner: &str, property: &str, schema: &KeySchema) -> Option<bool> {
        let block = self.owner_block(owner)?;
        let mut legacy = None;
        for (key, value) in block {
            if let PeriodKey::OnTime { label, legacy: is_legacy } = schema.classify(key) {
                if !same_label(label, property) {
                    continue;
                }
                if !is_legacy {
                    return Some(value.as_flag());
                }
                if legacy.is_none() {
                    legacy = Some(value.as_flag());
                }
            }
        }
        legacy
    }

    pub fn set_amount(&mut self, owner: &str, property: &str, value: impl Into<CellValue>) {
        let block = self.owner_block_mut(owner);
        let key = find_key(block, property)
            .map(str::to_string)
            .unwrap_or_else(|| property.to_string());
        block.insert(key, value.into());
    }

    pub fn set_observation(&mut self, owner: &str, property: &str, note: &str, schema: &KeySchema) {
        let block = self.owner_block_mut(owner);
        let wanted = schema.observation_key(&stored_label(block, property, schema));
        let key = find_key(block, &wanted)
            .map(str::to_string)
            .unwrap_or(wanted);
        block.insert(key, CellValue::from(note));
    }

    /// Writes the flag under the canonical suffix and drops legacy spellings;
    /// `None` clears the flag entirely.
    pub fn set_on_time(
        &mut self,
        owner: &str,
        property: &str,
        on_time: Option<bool>,
        schema: &KeySchema,
    ) {
        let block = self.owner_block_mut(owner);
        let label = stored_label(block, property, schema);
        block.retain(|key, _| match schema.classify(key) {
            PeriodKey::OnTime { label, .. } => !same_label(label, property),
            _ => true,
        });
        if let Some(flag) = on_time {
            block.insert(schema.on_time_key(&label), CellValue::Flag(flag));
        }
    }

    /// Moves an owner's block to a new label, merging into an existing block
    /// of the same label. Returns whether anything was moved.
    pub fn rename_owner(&mut self, old: &str, new: &str) -> bool {
        let Some(old_key) = find_key(&self.owners, old).map(str::to_string) else {
            return false;
        };
        let Some(block) = self.owners.remove(&old_key) else {
            return false;
        };
        self.owner_block_mut(new).extend(block);
        true
    }

    /// Moves the amount, note and flag keys of a property to a new label.
    pub fn rename_property(
        &mut self,
        owner: &str,
        old: &str,
        new: &str,
        schema: &KeySchema,
    ) -> bool {
        let Some(owner_key) = find_key(&self.owners, owner).map(str::to_string) else {
            return false;
        };
        let Some(block) = self.owners.get_mut(&owner_key) else {
            return false;
        };

        let moved: Vec<String> = block
            .keys()
            .filter(|key| same_label(schema.classify(key).label(), old))
            .cloned()
            .collect();
        if moved.is_empty() {
            return false;
        }

        for key in moved {
            let Some(value) = block.remove(&key) else {
                continue;
            };
            let renamed = match schema.classify(&key) {
                PeriodKey::Amount(_) => new.to_string(),
                PeriodKey::Observation(_) => schema.observation_key(new),
                PeriodKey::OnTime { .. } => schema.on_time_key(new),
            };
            block.insert(renamed, value);
        }
        true
    }

    /// Document merge-write: keys present in `other` overwrite, everything
    /// else is kept.
    pub fn merge(&mut self, other: &PeriodRecord) {
        for (owner, block) in &other.owners {
            let target = self.owners.entry(owner.clone()).or_default();
            for (key, value) in block {
                target.insert(key.clone(), value.clone());
            }
        }
    }

    fn owner_block_mut(&mut self, owner: &str) -> &mut OwnerBlock {
        let key = find_key(&self.owners, owner)
            .map(str::to_string)
            .unwrap_or_else(|| owner.to_string());
        self.owners.entry(key).or_default()
    }
}

/// The spelling under which `property` already holds an amount in `block`,
/// so sibling keys follow it.
fn stored_label(block: &OwnerBlock, property: &str, schema: &KeySchema) -> String {
    block
        .keys()
        .find(|key| {
            matches!(schema.classify(key), PeriodKey::Amount(label) if same_label(label, property))
        })
        .cloned()
        .unwrap_or_else(|| property.to_string())
}

fn unwrap_data(object: &Map<String, Value>) -> &Map<String, Value> {
    let mut current = object;
    // older writers nested the payload up to twice under `data`
    for _ in 0..2 {
        match current.get(WRAPPER_FIELD).and_then(Value::as_object) {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn month(s: &str) -> MonthId {
        s.parse().unwrap()
    }

    fn sample() -> PeriodRecord {
        PeriodRecord::from_document(
            month("2025-01"),
            &json!({
                "Acme": {
                    "Unit A": 500000,
                    "Unit A__obs": "paid late",
                    "Unit B": "250000",
                    "Unit B__status": true,
                    "Unit C": "n/a"
                },
                "updatedAt": { "seconds": 1 }
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_from_document_drops_metadata() {
        let record = sample();
        assert_eq!(record.owners.len(), 1);
        assert!(record.owners.contains_key("Acme"));
    }

    #[test]
    fn test_from_document_unwraps_data() {
        let record = PeriodRecord::from_document(
            month("2025-02"),
            &json!({ "data": { "Acme": { "Unit A": 1 } }, "updatedAt": 0 }),
        )
        .unwrap();
        assert_eq!(record.amount("acme", "unit a"), 1.0);
    }

    #[test]
    fn test_missing_and_malformed_documents() {
        let empty = PeriodRecord::from_document(month("2025-02"), &Value::Null).unwrap();
        assert!(empty.is_empty());
        assert!(PeriodRecord::from_document(month("2025-02"), &json!([1, 2])).is_err());
    }

    #[test]
    fn test_reads_resolve_labels() {
        let record = sample();
        let schema = KeySchema::default();
        assert_eq!(record.amount("ACME", "unit a"), 500000.0);
        assert_eq!(record.amount("acme", "Unit B"), 250000.0);
        assert_eq!(record.amount("acme", "Unit C"), 0.0);
        assert_eq!(record.amount("acme", "Unit Z"), 0.0);
        assert_eq!(record.observation("acme", "UNIT A", &schema), Some("paid late"));
        assert_eq!(record.on_time("acme", "unit b", &schema), Some(true));
        assert_eq!(record.on_time("acme", "unit a", &schema), None);
    }

    #[test]
    fn test_classify_keys() {
        let schema = KeySchema::default();
        assert_eq!(schema.classify("Unit A"), PeriodKey::Amount("Unit A"));
        assert_eq!(schema.classify("Unit A__obs"), PeriodKey::Observation("Unit A"));
        assert_eq!(
            schema.classify("Unit A__ontime"),
            PeriodKey::OnTime {
                label: "Unit A",
                legacy: false
            }
        );
        assert_eq!(
            schema.classify("Unit A__status"),
            PeriodKey::OnTime {
                label: "Unit A",
                legacy: true
            }
        );
    }

    #[test]
    fn test_set_amount_keeps_existing_casing() {
        let mut record = sample();
        record.set_amount("ACME", "UNIT A", 600000.0);
        let block = record.owner_block("acme").unwrap();
        assert_eq!(block.get("Unit A"), Some(&CellValue::Number(600000.0)));
        assert!(!block.contains_key("UNIT A"));

        record.set_amount("New Owner", "Depto 1", 1.0);
        assert!(record.owners.contains_key("New Owner"));
    }

    #[test]
    fn test_set_observation_and_on_time() {
        let mut record = sample();
        let schema = KeySchema::default();

        record.set_observation("acme", "unit a", "on time now", &schema);
        assert_eq!(record.observation("acme", "Unit A", &schema), Some("on time now"));
        assert_eq!(record.owner_block("acme").unwrap().len(), 5);

        record.set_on_time("acme", "Unit B", Some(false), &schema);
        let block = record.owner_block("acme").unwrap();
        assert!(!block.contains_key("Unit B__status"));
        assert_eq!(block.get("Unit B__ontime"), Some(&CellValue::Flag(false)));
        assert_eq!(record.on_time("acme", "unit b", &schema), Some(false));

        record.set_on_time("acme", "Unit B", None, &schema);
        assert_eq!(record.on_time("acme", "unit b", &schema), None);
    }

    #[test]
    fn test_reserved_suffixes_ignore_case() {
        let schema = KeySchema::default();
        assert_eq!(schema.classify("UNIT A__OBS"), PeriodKey::Observation("UNIT A"));
        assert_eq!(
            schema.classify("Unit A__Status"),
            PeriodKey::OnTime {
                label: "Unit A",
                legacy: true
            }
        );
        assert!(!schema.is_amount_key("unit a__ONTIME "));

        let mut record = PeriodRecord::from_document(
            month("2025-04"),
            &json!({ "Acme": { "UNIT A": 5, "UNIT A__OBS": "old" } }),
        )
        .unwrap();
        assert_eq!(record.observation("acme", "unit a", &schema), Some("old"));

        record.set_observation("acme", "unit a", "new note", &schema);
        let block = record.owner_block("acme").unwrap();
        assert_eq!(block.len(), 2);
        assert_eq!(record.observation("acme", "Unit A", &schema), Some("new note"));
    }

    #[test]
    fn test_canonical_flag_wins_over_legacy() {
        let record = PeriodRecord::from_document(
            month("2025-03"),
            &json!({ "Acme": { "Unit A__status": false, "Unit A__ontime": true } }),
        )
        .unwrap();
        assert_eq!(record.on_time("acme", "unit a", &KeySchema::default()), Some(true));
    }

    #[test]
    fn test_rename_property_moves_sibling_keys() {
        let mut record = sample();
        let schema = KeySchema::default();
        assert!(record.rename_property("acme", "unit b", "Local 2", &schema));

        let block = record.owner_block("acme").unwrap();
        assert!(block.contains_key("Local 2"));
        assert!(block.contains_key("Local 2__ontime"));
        assert!(!block.contains_key("Unit B"));
        assert!(!block.contains_key("Unit B__status"));
        assert_eq!(record.amount("acme", "local 2"), 250000.0);

        assert!(!record.rename_property("acme", "missing", "x", &schema));
    }

    #[test]
    fn test_rename_owner() {
        let mut record = sample();
        assert!(record.rename_owner("ACME", "Acme SpA"));
        assert_eq!(record.amount("acme spa", "unit a"), 500000.0);
        assert!(!record.rename_owner("ghost", "x"));
    }

    #[test]
    fn test_merge_write() {
        let mut stored = sample();
        let mut edit = PeriodRecord::new(month("2025-01"));
        edit.set_amount("Acme", "Unit A", 1.0);
        edit.set_amount("Beta", "Casa", 2.0);

        stored.merge(&edit);
        assert_eq!(stored.amount("acme", "unit a"), 1.0);
        assert_eq!(stored.amount("acme", "unit b"), 250000.0);
        assert_eq!(stored.amount("beta", "casa"), 2.0);
    }

    #[test]
    fn test_to_document() {
        let record = sample();
        let doc = record.to_document();
        assert_eq!(doc["Acme"]["Unit A"], json!(500000.0));
        assert_eq!(doc["Acme"]["Unit A__obs"], json!("paid late"));
        assert!(doc.get("updatedAt").is_none());
    }
}
