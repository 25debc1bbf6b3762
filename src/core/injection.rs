// src/core/injection.rs
use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use tracing::debug;

use crate::error::Result;
use super::model::InjectionMap;

/// Suffix markers removed before names are compared
const NAME_NOISE: [&str; 4] = ["impl", "repository", "dao", "service"];

/// Lowercase and strip the usual layer suffixes: `OrderServiceImpl` -> `order`
pub fn normalize_name(name: &str) -> String {
    let mut normalized = name.to_lowercase();
    for noise in NAME_NOISE {
        normalized = normalized.replace(noise, "");
    }
    normalized
}

/// `java.util.List<Foo>` -> `List`
fn simple_type(declared: &str) -> &str {
    let raw = declared.split('<').next().unwrap_or(declared).trim();
    raw.rsplit('.').next().unwrap_or(raw)
}

/// Known class a declared type refers to: exact name, then equal normalized
/// names, then one normalized name containing the other. A name that
/// normalizes to nothing contains every candidate.
pub fn resolve_type(declared: &str, known: &BTreeSet<String>) -> Option<String> {
    let simple = simple_type(declared);
    if known.contains(simple) {
        return Some(simple.to_string());
    }

    let wanted = normalize_name(simple);
    let candidates: Vec<(&String, String)> = known.iter().map(|k| (k, normalize_name(k))).collect();

    candidates
        .iter()
        .find(|(_, n)| *n == wanted)
        .or_else(|| candidates.iter().find(|(_, n)| n.contains(&wanted) || wanted.contains(n.as_str())))
        .map(|(k, _)| (*k).clone())
}

/// Maps field and variable names of one source file to the known classes they hold
pub struct InjectionResolver {
    annotated_field: Regex,
    assignment: Regex,
    plain_field: Regex,
    parameter_annotation: Regex,
    generics: Regex,
}

impl InjectionResolver {
    pub fn new() -> Result<Self> {
        Ok(Self {
            annotated_field: Regex::new(
                r"@(?:Autowired|Inject|EJB|Resource|PersistenceContext)(?:\s*\([^)]*\))?\s+(?:@\w+(?:\s*\([^)]*\))?\s+)*(?:(?:private|protected|public|final|static|transient)\s+)*([\w.]+(?:<[^;=]*?>)?)\s+(\w+)\s*;",
            )?,
            assignment: Regex::new(r"\bthis\.(\w+)\s*=\s*(\w+)\s*;")?,
            plain_field: Regex::new(r"\b(?:private|protected)\s+(?:final\s+)?([\w.]+(?:<[^;=]*?>)?)\s+(\w+)\s*;")?,
            parameter_annotation: Regex::new(r"@\w+(?:\s*\([^)]*\))?")?,
            generics: Regex::new(r"<[^<>]*>")?,
        })
    }

    /// Resolve injections in normalized source text of class `class_name`.
    /// Earlier passes win: annotated fields, constructor assignments, plain fields.
    pub fn resolve(&self, normalized: &str, class_name: Option<&str>, known: &BTreeSet<String>) -> InjectionMap {
        let mut map = InjectionMap::new();

        for caps in self.annotated_field.captures_iter(normalized) {
            self.record(&mut map, &caps[2], &caps[1], known);
        }

        if let Some(class_name) = class_name {
            for (field, declared) in self.constructor_assignments(normalized, class_name) {
                self.record(&mut map, &field, &declared, known);
            }
        }

        for caps in self.plain_field.captures_iter(normalized) {
            self.record(&mut map, &caps[2], &caps[1], known);
        }

        debug!("Resolved {} injections", map.len());
        map
    }

    fn record(&self, map: &mut InjectionMap, name: &str, declared: &str, known: &BTreeSet<String>) {
        if map.contains_key(name) {
            return;
        }
        if let Some(target) = resolve_type(declared, known) {
            map.insert(name.to_string(), target);
        }
    }

    /// `(field, declared type)` for each `this.field = param;` where `param` is a
    /// constructor parameter
    fn constructor_assignments(&self, normalized: &str, class_name: &str) -> Vec<(String, String)> {
        let pattern = format!(
            r"(?:\b(?:public|protected|private)\s+)?\b{}\s*\(([^)]*)\)\s*(?:throws\s+[\w.,\s]+)?\{{",
            regex::escape(class_name)
        );
        let Ok(constructor) = Regex::new(&pattern) else {
            return Vec::new();
        };

        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        for caps in constructor.captures_iter(normalized) {
            let params = self.parameter_annotation.replace_all(&caps[1], "");
            let mut params = params.into_owned();
            // Collapse nested generics so commas inside them do not split parameters
            while self.generics.is_match(&params) {
                params = self.generics.replace_all(&params, "").into_owned();
            }

            for param in params.split(',') {
                let tokens: Vec<&str> = param
                    .split_whitespace()
                    .filter(|t| *t != "final")
                    .collect();
                if let [.., declared, name] = tokens.as_slice() {
                    parameters.entry(name.to_string()).or_insert_with(|| declared.to_string());
                }
            }
        }

        if parameters.is_empty() {
            return Vec::new();
        }

        self.assignment
            .captures_iter(normalized)
            .filter_map(|caps| {
                parameters
                    .get(&caps[2])
                    .map(|declared| (caps[1].to_string(), declared.clone()))
            })
            .collect()
    }
}
