//! Lease metadata stored in `contracts/<owner-slug>__<property-slug>`.
//!
//! Contract documents were written by several generations of the editing
//! screen, each with its own field names. Reads go through ordered alias
//! lists; writes emit the canonical fields plus the legacy ones older
//! readers still look at.

use crate::error::{RentRollError, Result};
use crate::normalize::{canonical_contract_id, legacy_contract_id};
use crate::resolver::{pick_alias, pick_alias_by};
use crate::structure::OwnerStructure;
use crate::uf::parse_number_loose;
use chrono::NaiveDate;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

const OWNER_FIELDS: &[&str] = &["owner"];
const PROPERTY_FIELDS: &[&str] = &["property"];
const ADDRESS_FIELDS: &[&str] = &["direccionPropiedad", "direccion", "direccionInmueble"];
const START_FIELDS: &[&str] = &["inicio", "inicioContrato", "fechaInicio"];
const END_FIELDS: &[&str] = &["vence", "vencimiento", "terminoContrato", "fechaTermino"];
const TENANT_FIELDS: &[&str] = &["arrendatario", "cliente", "tenant"];
const EMAIL_FIELDS: &[&str] = &["correo", "email", "mail"];
const PHONE_FIELDS: &[&str] = &["telefono", "telefonoArrendatario", "phone"];
const GUARANTOR_FIELDS: &[&str] = &["aval", "fiador"];
const GUARANTOR_EMAIL_FIELDS: &[&str] = &["correoAval", "emailAval"];
const GUARANTOR_PHONE_FIELDS: &[&str] = &["telefonoAval", "phoneAval"];
const DOCUMENT_URL_FIELDS: &[&str] = &["contratoPdfUrl", "contratoUrl", "pdfUrl", "contrato"];
const ADJUSTMENT_FIELDS: &[&str] = &["reajuste", "reajusteMeses", "mesesReajuste", "reajustes"];

const RENT_PREFIX: &str = "valorArriendo";
const FINE_PREFIX: &str = "multa";
const GUARANTEE_PREFIX: &str = "garantia";

const DATE_FORMAT: &str = "%d-%m-%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    #[schemars(description = "Chilean peso, whole units")]
    Clp,

    #[schemars(description = "Unidad de Fomento, the inflation-indexed unit, two decimals")]
    Uf,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clp => "CLP",
            Self::Uf => "UF",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "CLP" => Some(Self::Clp),
            "UF" => Some(Self::Uf),
            _ => None,
        }
    }
}

/// An amount together with the unit it was agreed in. Amounts are never
/// converted between units on storage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Money {
    pub amount: f64,
    pub unit: Currency,
}

impl Money {
    pub fn new(amount: f64, unit: Currency) -> Self {
        Self {
            amount: round_amount(amount, unit),
            unit,
        }
    }
}

/// CLP rounds to whole pesos, UF to two decimals.
pub fn round_amount(amount: f64, unit: Currency) -> f64 {
    match unit {
        Currency::Clp => amount.round(),
        Currency::Uf => (amount * 100.0).round() / 100.0,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Contract {
    pub owner: Option<String>,
    pub property: Option<String>,
    pub address: Option<String>,

    #[schemars(description = "Lease start, DD-MM-YYYY")]
    pub start: Option<String>,

    #[schemars(description = "Lease end, DD-MM-YYYY")]
    pub end: Option<String>,

    pub tenant: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub guarantor: Option<String>,
    pub guarantor_email: Option<String>,
    pub guarantor_phone: Option<String>,
    pub document_url: Option<String>,
    pub rent: Option<Money>,
    pub fine: Option<Money>,
    pub guarantee: Option<Money>,

    #[serde(default)]
    #[schemars(description = "Months (1 = January) in which the rent is readjusted")]
    pub adjustment_months: Vec<u32>,
}

impl Contract {
    /// Reads a stored contract, whatever generation of field names it uses.
    pub fn from_document(document: &Value) -> Result<Self> {
        let object = match document {
            Value::Object(object) => object,
            Value::Null => return Ok(Self::default()),
            other => {
                return Err(RentRollError::MalformedDocument(format!(
                    "contract is not an object: {}",
                    other
                )))
            }
        };

        Ok(Self {
            owner: text_field(object, OWNER_FIELDS),
            property: text_field(object, PROPERTY_FIELDS),
            address: text_field(object, ADDRESS_FIELDS),
            start: text_field(object, START_FIELDS),
            end: text_field(object, END_FIELDS),
            tenant: text_field(object, TENANT_FIELDS),
            email: text_field(object, EMAIL_FIELDS),
            phone: text_field(object, PHONE_FIELDS),
            guarantor: text_field(object, GUARANTOR_FIELDS),
            guarantor_email: text_field(object, GUARANTOR_EMAIL_FIELDS),
            guarantor_phone: text_field(object, GUARANTOR_PHONE_FIELDS),
            document_url: text_field(object, DOCUMENT_URL_FIELDS),
            rent: money_field(object, RENT_PREFIX),
            fine: money_field(object, FINE_PREFIX),
            guarantee: money_field(object, GUARANTEE_PREFIX),
            adjustment_months: adjustment_months(object),
        })
    }

    /// The document for a merge-write: canonical fields first, then the
    /// per-unit legacy fields (zero when the amount is in the other unit).
    pub fn to_document(&self) -> Value {
        let mut object = Map::new();
        let text = |v: &Option<String>| Value::String(v.clone().unwrap_or_default());

        object.insert("owner".into(), text(&self.owner));
        object.insert("property".into(), text(&self.property));
        object.insert("direccionPropiedad".into(), text(&self.address));
        object.insert("inicio".into(), text(&self.start));
        object.insert("vence".into(), text(&self.end));
        object.insert("arrendatario".into(), text(&self.tenant));
        object.insert("correo".into(), text(&self.email));
        object.insert("telefono".into(), text(&self.phone));
        object.insert("aval".into(), text(&self.guarantor));
        object.insert("correoAval".into(), text(&self.guarantor_email));
        object.insert("telefonoAval".into(), text(&self.guarantor_phone));
        object.insert("contratoPdfUrl".into(), text(&self.document_url));
        object.insert("reajuste".into(), json!(self.adjustment_months));

        write_money(&mut object, RENT_PREFIX, self.rent);
        write_money(&mut object, FINE_PREFIX, self.fine);
        write_money(&mut object, GUARANTEE_PREFIX, self.guarantee);

        Value::Object(object)
    }

    pub fn has_document(&self) -> bool {
        self.document_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    pub fn adjusts_in(&self, month: u32) -> bool {
        self.adjustment_months.contains(&month)
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start.as_deref().and_then(parse_contract_date)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end.as_deref().and_then(parse_contract_date)
    }

    /// Dates, when given, must be `DD-MM-YYYY`.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("start", &self.start), ("end", &self.end)] {
            let Some(value) = value.as_deref().filter(|v| !v.is_empty()) else {
                continue;
            };
            if parse_contract_date(value).is_none() {
                return Err(RentRollError::InvalidContractField {
                    field: field.to_string(),
                    details: format!("'{}' is not a DD-MM-YYYY date", value),
                });
            }
        }
        Ok(())
    }

    pub fn schema_as_json() -> Result<String> {
        let schema = schemars::schema_for!(Contract);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

fn parse_contract_date(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

/// The first alias holding actual text. Current writers leave blank
/// canonical fields next to filled legacy ones.
fn text_field(object: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    let filled = |v: &Value| match v {
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(_) => true,
        _ => false,
    };
    match pick_alias_by(object.iter(), aliases, filled)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn amount_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number_loose(s),
        _ => None,
    }
}

fn money_field(object: &Map<String, Value>, prefix: &str) -> Option<Money> {
    let unit_field = format!("{}Unit", prefix);
    let amount_field = format!("{}Amount", prefix);
    let uf_field = format!("{}UF", prefix);
    let clp_field = format!("{}CLP", prefix);

    let legacy_uf = pick_alias(object.iter(), &[uf_field.as_str()]).filter(|v| is_truthy(v));
    let unit = pick_alias(object.iter(), &[unit_field.as_str()])
        .and_then(Value::as_str)
        .and_then(Currency::parse)
        .unwrap_or(if legacy_uf.is_some() {
            Currency::Uf
        } else {
            Currency::Clp
        });

    let amount = pick_alias(object.iter(), &[amount_field.as_str()])
        .filter(|v| !v.is_null())
        .or_else(|| match unit {
            Currency::Uf => pick_alias(object.iter(), &[uf_field.as_str()]),
            Currency::Clp => pick_alias(object.iter(), &[clp_field.as_str(), prefix]),
        })
        .and_then(amount_of)?;

    Some(Money::new(amount, unit))
}

fn write_money(object: &mut Map<String, Value>, prefix: &str, money: Option<Money>) {
    let (amount, unit) = money
        .map(|m| (m.amount, m.unit))
        .unwrap_or((0.0, Currency::Clp));
    let clp = if unit == Currency::Clp { amount } else { 0.0 };
    let uf = if unit == Currency::Uf { amount } else { 0.0 };

    object.insert(format!("{}Amount", prefix), json!(amount));
    object.insert(format!("{}Unit", prefix), json!(unit.as_str()));
    object.insert(prefix.to_string(), json!(clp));
    object.insert(format!("{}CLP", prefix), json!(clp));
    object.insert(format!("{}UF", prefix), json!(uf));
}

fn adjustment_months(object: &Map<String, Value>) -> Vec<u32> {
    let listed = |v: &Value| v.as_array().is_some_and(|a| !a.is_empty());
    let Some(Value::Array(raw)) = pick_alias_by(object.iter(), ADJUSTMENT_FIELDS, listed) else {
        return Vec::new();
    };

    let mut months: Vec<u32> = raw
        .iter()
        .filter_map(|m| match m {
            Value::Number(n) => n.as_u64().map(|n| n as u32),
            Value::String(s) => s
                .chars()
                .filter(char::is_ascii_digit)
                .collect::<String>()
                .parse()
                .ok(),
            _ => None,
        })
        .filter(|m| (1..=12).contains(m))
        .collect();
    months.sort_unstable();
    months.dedup();
    months
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingStatus {
    /// No contract document exists for the property.
    NoRecord,
    /// A contract exists but has no signed document attached.
    NoDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingContract {
    pub property: String,
    pub status: MissingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerMissingContracts {
    pub owner: String,
    pub missing: Vec<MissingContract>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentDue {
    pub owner: String,
    pub property: String,
}

/// All contracts keyed by canonical id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractBook {
    contracts: BTreeMap<String, Contract>,
}

impl ContractBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the book from `(document id, document)` pairs. Unreadable
    /// documents are skipped.
    pub fn from_documents<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut book = Self::new();
        for (id, document) in documents {
            match Contract::from_document(document) {
                Ok(contract) => book.insert(id, contract),
                Err(e) => debug!("Skipping contract {}: {}", id, e),
            }
        }
        book
    }

    pub fn insert(&mut self, id: &str, contract: Contract) {
        self.contracts.insert(id.to_string(), contract);
    }

    /// Stores a contract under the id derived from the current labels and
    /// returns that id.
    pub fn upsert(&mut self, owner: &str, property: &str, contract: Contract) -> String {
        let id = canonical_contract_id(owner, property);
        self.contracts.insert(id.clone(), contract);
        id
    }

    pub fn get(&self, id: &str) -> Option<&Contract> {
        self.contracts.get(id)
    }

    /// Looks the pair up under its canonical id, then under the id older
    /// writers used for accented labels.
    pub fn resolve(&self, owner: &str, property: &str) -> Option<&Contract> {
        self.contracts
            .get(&canonical_contract_id(owner, property))
            .or_else(|| self.contracts.get(&legacy_contract_id(owner, property)))
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Configured properties without a usable contract, grouped per owner in
    /// structure order. Owners with nothing missing are left out.
    pub fn missing_contracts(&self, structure: &OwnerStructure) -> Vec<OwnerMissingContracts> {
        structure
            .owners
            .iter()
            .filter_map(|owner| {
                let missing: Vec<MissingContract> = owner
                    .properties
                    .iter()
                    .filter_map(|property| {
                        let status = match self.resolve(&owner.name, property) {
                            None => MissingStatus::NoRecord,
                            Some(c) if !c.has_document() => MissingStatus::NoDocument,
                            Some(_) => return None,
                        };
                        Some(MissingContract {
                            property: property.clone(),
                            status,
                        })
                    })
                    .collect();

                (!missing.is_empty()).then(|| OwnerMissingContracts {
                    owner: owner.name.clone(),
                    missing,
                })
            })
            .collect()
    }

    /// Properties whose rent is readjusted in `month` (1 = January).
    pub fn adjustments_for_month(&self, structure: &OwnerStructure, month: u32) -> Vec<AdjustmentDue> {
        structure
            .owners
            .iter()
            .flat_map(|owner| {
                owner.properties.iter().filter_map(move |property| {
                    self.resolve(&owner.name, property)
                        .filter(|c| c.adjusts_in(month))
                        .map(|_| AdjustmentDue {
                            owner: owner.name.clone(),
                            property: property.clone(),
                        })
                })
            })
            .collect()
    }
}
