//! Cleanup of the place names before they are sent to a geocoder.

use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::config::Strictness;

/// Administrative boilerplate found in front of municipality names.
/// The longer phrases come first.
const BOILERPLATE: [&str; 6] = [
    "PREFEITURA MUNICIPAL DE ",
    "PREFEITURA DE ",
    "MUNICÍPIO DE ",
    "MUNICIPIO DE ",
    "GOVERNO DE ",
    "PM DE ",
];

/// Tokens that describe a rural or sub-municipal location. Only removed in strict mode.
const NOISE: [&str; 4] = ["DISTRITO DE ", "GLEBA ", "LOTE ", "VILA "];

/// Upper-cases a raw place name and removes the administrative boilerplate.
///
/// The tokens are removed wherever they appear, not only at the start of the string.
/// The result may be empty, which means that no municipality was given.
///
/// Normalizing a normalized name returns it unchanged.
pub fn normalize_name(raw: &str, strictness: Strictness) -> String {
    // Not trimmed yet: a trailing blank may complete a token ("PREFEITURA DE ").
    let mut current = raw.to_uppercase();
    loop {
        let next = normalize_once(&current, strictness);
        if next == current {
            break;
        }
        current = next;
    }
    debug!("normalize_name: {:?} -> {:?}", raw, current);
    current
}

fn normalize_once(name: &str, strictness: Strictness) -> String {
    let mut s = name.to_string();
    for token in BOILERPLATE.iter() {
        s = s.replace(token, "");
    }
    if strictness == Strictness::Strict {
        s = remove_parenthesized(&s);
        for token in NOISE.iter() {
            s = s.replace(token, "");
        }
        s = s.split_whitespace().collect::<Vec<&str>>().join(" ");
    }
    s.trim().to_string()
}

// Drops the parenthesized notes, the parentheses included.
// An unclosed parenthesis is left as it is.
fn remove_parenthesized(s: &str) -> String {
    static PARENTHESIZED: OnceLock<Option<Regex>> = OnceLock::new();
    match PARENTHESIZED.get_or_init(|| Regex::new(r"\([^)]*\)").ok()) {
        Some(re) => re.replace_all(s, "").to_string(),
        None => s.to_string(),
    }
}
