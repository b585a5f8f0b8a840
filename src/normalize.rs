//! Canonical forms for human-entered owner and property labels.
//!
//! Labels in stored documents were typed by hand over several years, so the
//! same property shows up as `"Local 108"`, `"LOCAL 108"` or `"lócal 108 "`.
//! Every lookup in this crate compares [`normalize`]d forms; storage ids are
//! built with [`slugify`].

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercases, strips diacritics and trims surrounding whitespace.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// [`normalize`] with a missing label treated as empty.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}

/// Two labels are the same label iff their normalized forms are identical.
pub fn same_label(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Storage-safe identifier: normalized, runs of anything outside `[a-z0-9]`
/// collapsed to a single `-`, no leading or trailing `-`.
pub fn slugify(text: &str) -> String {
    hyphenate(normalize(text).chars())
}

/// The identifier older writers produced: the accents were decomposed but
/// not dropped, so each combining mark became a hyphen (`"Société"` gave
/// `"socie-te"`). Only used to find documents stored under that form.
pub fn legacy_slugify(text: &str) -> String {
    hyphenate(text.to_lowercase().nfd())
}

fn hyphenate(chars: impl Iterator<Item = char>) -> String {
    let mut slug = String::new();
    let mut pending_separator = false;

    for c in chars {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// Id of the contract document for an owner/property pair.
///
/// The id depends on the current labels, so renaming either side detaches
/// previously stored contract data.
pub fn canonical_contract_id(owner: &str, property: &str) -> String {
    format!("{}__{}", slugify(owner), slugify(property))
}

/// [`canonical_contract_id`] as older writers built it; equal to the
/// canonical id for labels without accents.
pub fn legacy_contract_id(owner: &str, property: &str) -> String {
    format!("{}__{}", legacy_slugify(owner), legacy_slugify(property))
}

/// Display form for labels typed entirely in upper case:
/// `"LOCAL 108"` becomes `"Local 108"`. Mixed-case labels are returned
/// trimmed but otherwise untouched. Never use the result as a key.
pub fn pretty_label(text: &str) -> String {
    let trimmed = text.trim();
    let letters: String = trimmed.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() || letters != letters.to_uppercase() {
        return trimmed.to_string();
    }

    trimmed
        .split(' ')
        .map(|word| {
            word.split('-')
                .map(title_token)
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_token(token: &str) -> String {
    if token.is_empty() || token.chars().all(|c| c.is_ascii_digit()) {
        return token.to_string();
    }
    // short acronyms ("RM", "LA") keep their casing
    if token.len() <= 3 && token.chars().all(|c| c.is_ascii_uppercase()) {
        return token.to_string();
    }

    let lower = token.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_case_accents_and_whitespace() {
        assert_eq!(normalize("  Société Générale "), "societe generale");
        assert_eq!(normalize("ÑUÑOA"), "nunoa");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for s in ["Casa Ñandú", "  LOCAL 108", "école", "Ünïcödé  ", "plain"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_case_and_accent_variants_are_same_label() {
        assert!(same_label("Société", "SOCIETE"));
        assert!(same_label("lote 1", "Lóte 1 "));
        assert!(!same_label("Lote 1", "Lote 2"));
    }

    #[test]
    fn test_normalize_opt_missing_is_empty() {
        assert_eq!(normalize_opt(None), "");
        assert_eq!(normalize_opt(Some(" Á ")), "a");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Société Générale"), "societe-generale");
        assert_eq!(slugify("  Local #108 / Piso 2 "), "local-108-piso-2");
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify("Depto. 3-B"), "depto-3-b");
    }

    #[test]
    fn test_canonical_contract_id() {
        assert_eq!(
            canonical_contract_id("Inversiones Peñalolén", "Local 108"),
            "inversiones-penalolen__local-108"
        );
        assert_eq!(
            canonical_contract_id("INVERSIONES PEÑALOLÉN", "local 108"),
            canonical_contract_id("Inversiones Penalolen", "LOCAL 108")
        );
    }

    #[test]
    fn test_legacy_contract_id() {
        assert_eq!(legacy_slugify("Société"), "socie-te");
        assert_eq!(legacy_contract_id("Société", "Lote Ñ"), "socie-te__lote-n");
        assert_eq!(
            legacy_contract_id("Acme", "Local 108"),
            canonical_contract_id("Acme", "Local 108")
        );
    }

    #[test]
    fn test_pretty_label() {
        assert_eq!(pretty_label("LOCAL 108"), "Local 108");
        assert_eq!(pretty_label("CASA LA PLAYA"), "Casa LA Playa");
        assert_eq!(pretty_label("BODEGA-NORTE"), "Bodega-Norte");
        assert_eq!(pretty_label("Local 108"), "Local 108");
        assert_eq!(pretty_label("108"), "108");
    }
}
