use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OBSERVATION_SUFFIX: &str = "__obs";
pub const DEFAULT_ON_TIME_SUFFIX: &str = "__ontime";
pub const LEGACY_ON_TIME_SUFFIX: &str = "__status";
pub const DEFAULT_UF_ENDPOINT: &str = "https://mindicador.cl/api/uf";

/// Tunables for the rent-roll core. Every field has a default, so a partial
/// JSON document is enough to override a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RentRollConfig {
    /// Marks a free-text note sibling key, e.g. `"Unit A__obs"`.
    pub observation_suffix: String,

    /// Marks the on-time payment flag written by current code.
    pub on_time_suffix: String,

    /// Older spellings of the on-time suffix, consulted in order after the canonical one.
    pub legacy_on_time_suffixes: Vec<String>,

    /// How many months before the session anchor the month selector offers.
    pub months_past: u32,

    /// How many months after the session anchor the month selector offers.
    pub months_future: u32,

    /// Number of months shown in a property's history.
    pub history_months: usize,

    pub uf_endpoint: String,
    pub uf_timeout_secs: u64,
}

impl Default for RentRollConfig {
    fn default() -> Self {
        Self {
            observation_suffix: DEFAULT_OBSERVATION_SUFFIX.to_string(),
            on_time_suffix: DEFAULT_ON_TIME_SUFFIX.to_string(),
            legacy_on_time_suffixes: vec![LEGACY_ON_TIME_SUFFIX.to_string()],
            months_past: 11,
            months_future: 0,
            history_months: 6,
            uf_endpoint: DEFAULT_UF_ENDPOINT.to_string(),
            uf_timeout_secs: 12,
        }
    }
}

impl RentRollConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// All suffixes that turn a block key into metadata rather than an amount.
    pub fn reserved_suffixes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.observation_suffix.as_str())
            .chain(std::iter::once(self.on_time_suffix.as_str()))
            .chain(self.legacy_on_time_suffixes.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override() {
        let config = RentRollConfig::from_json(r#"{ "history_months": 12 }"#).unwrap();
        assert_eq!(config.history_months, 12);
        assert_eq!(config.observation_suffix, "__obs");
        assert_eq!(config.legacy_on_time_suffixes, vec!["__status".to_string()]);
    }

    #[test]
    fn test_reserved_suffixes_order() {
        let config = RentRollConfig::default();
        let suffixes: Vec<&str> = config.reserved_suffixes().collect();
        assert_eq!(suffixes, vec!["__obs", "__ontime", "__status"]);
    }
}
