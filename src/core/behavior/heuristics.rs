// src/core/behavior/heuristics.rs
use std::collections::BTreeSet;

use regex::Regex;

use crate::core::injection::normalize_name;
use crate::error::Result;

/// Leading verb -> readable verb
const VERB_PREFIXES: [(&str, &str); 12] = [
    ("get", "fetch"),
    ("find", "fetch"),
    ("fetch", "fetch"),
    ("retrieve", "fetch"),
    ("save", "save"),
    ("persist", "save"),
    ("load", "load"),
    ("add", "add"),
    ("create", "create"),
    ("update", "update"),
    ("delete", "remove"),
    ("list", "list"),
];

const FALLBACK_VERB: &str = "execute";

/// Readable label for a called method: `findById` -> `fetch ById`
pub fn humanize_method(method: &str) -> String {
    let method = method.trim();
    if method.is_empty() {
        return FALLBACK_VERB.to_string();
    }

    for (prefix, verb) in VERB_PREFIXES {
        let Some(head) = method.get(..prefix.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(prefix) {
            continue;
        }

        let rest = &method[prefix.len()..];
        match rest.chars().next() {
            None => return verb.to_string(),
            Some(c) if c.is_uppercase() || c.is_ascii_digit() => return format!("{} {}", verb, rest),
            Some(_) => {}
        }
    }

    // Three-letter verbs nobody listed: `runReport` -> `execute Report`
    match method.char_indices().nth(3) {
        Some((i, c)) if c.is_uppercase() => format!("{} {}", FALLBACK_VERB, &method[i..]),
        _ => method.to_string(),
    }
}

/// Call names that never become edges
pub struct IgnoreList {
    patterns: Vec<Regex>,
}

impl IgnoreList {
    /// Each pattern must match the whole name, ignoring case
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i)^(?:{})$", p)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_ignored(&self, method: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(method))
    }
}

/// Known class a receiver name most likely refers to. Equal normalized names
/// win over containment, so a bare `service` receiver lands on the first
/// class in name order.
pub fn resolve_target(receiver: &str, classes: &BTreeSet<String>) -> Option<String> {
    let wanted = normalize_name(receiver);
    let candidates: Vec<(&String, String)> = classes.iter().map(|c| (c, normalize_name(c))).collect();

    candidates
        .iter()
        .find(|(_, n)| *n == wanted)
        .or_else(|| candidates.iter().find(|(_, n)| n.contains(&wanted) || wanted.contains(n.as_str())))
        .map(|(c, _)| (*c).clone())
}
