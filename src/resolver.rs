//! Key lookups that tolerate the casing and accent drift of stored labels.
//!
//! Absence is a normal outcome everywhere in this module: a property with no
//! recorded amount yet simply resolves to `None` or to zero.

use crate::normalize::normalize;
use std::collections::BTreeMap;

/// Values that can be read as a monetary amount. Anything that is not a
/// finite number reads as zero.
pub trait AsAmount {
    fn as_amount(&self) -> f64;
}

impl AsAmount for f64 {
    fn as_amount(&self) -> f64 {
        if self.is_finite() {
            *self
        } else {
            0.0
        }
    }
}

impl AsAmount for serde_json::Value {
    fn as_amount(&self) -> f64 {
        match self {
            serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0).as_amount(),
            serde_json::Value::String(s) => parse_amount(s),
            _ => 0.0,
        }
    }
}

/// Parses a stored amount string. Blank or unparseable text is zero.
pub fn parse_amount(raw: &str) -> f64 {
    raw.trim().parse::<f64>().map(|n| n.as_amount()).unwrap_or(0.0)
}

/// Returns the first key, in iteration order, that is the same label as
/// `target`. When two keys normalize identically the first one wins.
pub fn find_key_in<'a, I>(keys: I, target: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    let want = normalize(target);
    keys.into_iter()
        .find(|k| normalize(k) == want)
        .map(String::as_str)
}

/// [`find_key_in`] over the keys of a map.
pub fn find_key<'a, V>(map: &'a BTreeMap<String, V>, target: &str) -> Option<&'a str> {
    find_key_in(map.keys(), target)
}

/// [`find_key`] for a map that may itself be missing.
pub fn find_key_opt<'a, V>(
    map: Option<&'a BTreeMap<String, V>>,
    target: &str,
) -> Option<&'a str> {
    map.and_then(|m| find_key(m, target))
}

pub fn find_value<'a, V>(map: &'a BTreeMap<String, V>, target: &str) -> Option<&'a V> {
    find_key(map, target).and_then(|k| map.get(k))
}

/// Two-level lookup `map[outer][inner]` with both levels resolved by label,
/// defaulting to zero when either level is missing.
pub fn find_nested_value<V: AsAmount>(
    map: &BTreeMap<String, BTreeMap<String, V>>,
    outer: &str,
    inner: &str,
) -> f64 {
    find_value(map, outer)
        .and_then(|block| find_value(block, inner))
        .map(AsAmount::as_amount)
        .unwrap_or(0.0)
}

/// Picks the value of the first alias present in `entries`, trying aliases
/// in priority order. Used for records whose field names changed over time.
pub fn pick_alias<'a, V, I>(entries: I, aliases: &[&str]) -> Option<&'a V>
where
    V: 'a,
    I: IntoIterator<Item = (&'a String, &'a V)>,
{
    pick_alias_by(entries, aliases, |_| true)
}

/// [`pick_alias`], skipping values `accept` rejects (e.g. blank text left
/// behind by a newer writer next to a filled legacy field).
pub fn pick_alias_by<'a, V, I, P>(entries: I, aliases: &[&str], mut accept: P) -> Option<&'a V>
where
    V: 'a,
    I: IntoIterator<Item = (&'a String, &'a V)>,
    P: FnMut(&V) -> bool,
{
    let entries: Vec<(String, &'a V)> = entries
        .into_iter()
        .map(|(k, v)| (normalize(k), v))
        .collect();

    aliases.iter().find_map(|alias| {
        let want = normalize(alias);
        entries
            .iter()
            .find(|(k, v)| *k == want && accept(v))
            .map(|(_, v)| *v)
    })
}
