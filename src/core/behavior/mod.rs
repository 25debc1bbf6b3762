// src/core/behavior/mod.rs
//! Call sequences from entry points, through components, into data access.
//!
//! Tracing is lexical: method bodies are isolated by delimiter counting and
//! `receiver.method(` patterns are matched inside them. Receivers resolve
//! through the file's injection map first, then by approximate name matching.
//! Chains stop after two hops.

mod body;
mod endpoints;
mod heuristics;

pub use heuristics::humanize_method;

use body::SourceIndex;
use endpoints::EndpointScanner;
use heuristics::{resolve_target, IgnoreList};

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::SequenceConfig;
use crate::error::{Result, StrataError};
use super::injection::{normalize_name, InjectionResolver};
use super::model::{CallEdge, CallSequence, InjectionMap, Role, RoleAssignment, Terminal};
use super::roles::is_active;
use super::source::SourceReader;

/// Receivers that point back at the class itself
const SELF_RECEIVERS: [&str; 2] = ["this", "super"];

/// Role lookups shared by every trace in one module
struct ModuleView<'a> {
    roles: &'a RoleAssignment,
    components: BTreeSet<String>,
    data_access: BTreeSet<String>,
    /// Components and data access: what an entry point may call
    reachable: BTreeSet<String>,
}

impl<'a> ModuleView<'a> {
    fn new(roles: &'a RoleAssignment) -> Self {
        let components = roles.classes_with(Role::Component);
        let data_access = roles.classes_with(Role::DataAccess);
        let reachable = components.union(&data_access).cloned().collect();
        Self {
            roles,
            components,
            data_access,
            reachable,
        }
    }
}

/// Edges of one operation, deduplicated on (caller, callee, method)
#[derive(Default)]
struct EdgeSet {
    edges: Vec<CallEdge>,
    seen: HashSet<(String, String, String)>,
}

impl EdgeSet {
    fn push(&mut self, edge: CallEdge) -> bool {
        let (caller, callee, method) = edge.key();
        if !self.seen.insert((caller.to_string(), callee.to_string(), method.to_string())) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    fn into_sequence_parts(self) -> (Vec<CallEdge>, Terminal) {
        let terminal = match self.edges.last() {
            Some(edge) if edge.callee_role == Role::DataAccess => Terminal::DataAccess,
            _ => Terminal::DeadEnd,
        };
        (self.edges, terminal)
    }
}

pub struct BehavioralExtractor {
    reader: SourceReader,
    injection: InjectionResolver,
    endpoints: EndpointScanner,
    ignore: IgnoreList,
    call_regex: Regex,
}

impl BehavioralExtractor {
    pub fn new(config: &SequenceConfig) -> Result<Self> {
        Ok(Self {
            reader: SourceReader::new()?,
            injection: InjectionResolver::new()?,
            endpoints: EndpointScanner::new()?,
            ignore: IgnoreList::new(&config.ignore_patterns)?,
            call_regex: Regex::new(r"\b(\w+)\s*\.\s*(\w+)\s*\(")?,
        })
    }

    /// Sequences for every entry point of a module, keyed by entry-point class.
    /// An entry point whose source cannot be read is skipped.
    pub fn trace_module(&self, roles: &RoleAssignment, source_dir: &Path) -> BTreeMap<String, Vec<CallSequence>> {
        let mut traced = BTreeMap::new();

        for entry_point in roles.classes_with(Role::EntryPoint) {
            match self.trace_operations(&entry_point, roles, source_dir) {
                Ok(sequences) => {
                    traced.insert(entry_point, sequences);
                }
                Err(e) => warn!("⚠️ Skipping entry point {}: {}", entry_point, e),
            }
        }

        let edges: usize = traced.values().flatten().map(CallSequence::len).sum();
        info!("🔗 Traced {} entry points, {} call edges", traced.len(), edges);
        traced
    }

    /// One sequence per operation of `entry_point`
    pub fn trace_operations(&self, entry_point: &str, roles: &RoleAssignment, source_dir: &Path) -> Result<Vec<CallSequence>> {
        let entry = roles
            .get(entry_point)
            .filter(|e| e.role == Role::EntryPoint)
            .ok_or_else(|| StrataError::ResourceNotFound(source_dir.join(format!("{}.java", entry_point))))?;

        let view = ModuleView::new(roles);
        let normalized = self.reader.read(&entry.path)?;
        let index = SourceIndex::new(&normalized);
        let methods = index.methods();
        let injections = self.injection.resolve(&normalized, Some(entry_point), &view.reachable);
        let operations = self.endpoints.operations(entry_point, &methods, source_dir, &self.reader);

        if operations.is_empty() {
            debug!("No operations found in {}", entry_point);
        }

        let sequences = operations
            .into_iter()
            .map(|operation| {
                let mut edges = EdgeSet::default();
                let body = methods
                    .iter()
                    .filter(|m| m.name == operation.name)
                    .find_map(|m| m.body);

                if let Some(body) = body {
                    self.trace_entry_body(&view, entry_point, body, &injections, &mut edges);
                }

                let (edges, terminal) = edges.into_sequence_parts();
                CallSequence {
                    operation,
                    edges,
                    terminal,
                }
            })
            .collect();

        Ok(sequences)
    }

    /// First hop: entry point into components and data access
    fn trace_entry_body(
        &self,
        view: &ModuleView,
        entry_point: &str,
        body: &str,
        injections: &InjectionMap,
        edges: &mut EdgeSet,
    ) {
        for (receiver, method) in self.calls(body) {
            let target = injections
                .get(receiver)
                .cloned()
                .or_else(|| resolve_target(receiver, &view.components))
                .or_else(|| resolve_target(receiver, &view.data_access));
            let Some(target) = target else {
                continue;
            };

            let role = view.roles.role_of(&target);
            if !is_active(role) {
                continue;
            }
            let added = edges.push(CallEdge::new(entry_point, target.as_str(), method, role));

            if added && role == Role::Component {
                self.trace_component(view, &target, method, edges);
            }
        }
    }

    /// Second hop: the called component method into data access. The component
    /// stays the caller even when the body comes from an implementation class.
    fn trace_component(&self, view: &ModuleView, component: &str, method: &str, edges: &mut EdgeSet) {
        for candidate in self.implementations(view, component) {
            let Some(entry) = view.roles.get(&candidate) else {
                continue;
            };
            let normalized = match self.reader.read(&entry.path) {
                Ok(text) => text,
                Err(e) => {
                    warn!("⚠️ Skipping {}", e);
                    continue;
                }
            };

            let index = SourceIndex::new(&normalized);
            let Some(body) = index.method_body(method) else {
                continue;
            };

            let injections = self.injection.resolve(&normalized, Some(candidate.as_str()), &view.data_access);
            for (receiver, called) in self.calls(body) {
                let target = injections
                    .get(receiver)
                    .cloned()
                    .or_else(|| resolve_target(receiver, &view.data_access));
                if let Some(target) = target {
                    edges.push(CallEdge::new(component, target, called, Role::DataAccess));
                }
            }
            return;
        }

        debug!("No body for {}.{}", component, method);
    }

    /// `component` itself, then components that implement it or share its normalized name
    fn implementations(&self, view: &ModuleView, component: &str) -> Vec<String> {
        let wanted = normalize_name(component);
        let mut candidates = vec![component.to_string()];

        for other in view.components.iter().filter(|c| c.as_str() != component) {
            let same_name = !wanted.is_empty() && normalize_name(other) == wanted;
            let implements = || {
                view.roles
                    .get(other)
                    .and_then(|e| self.reader.read(&e.path).ok())
                    .map(|text| declares_implements(&text, component))
                    .unwrap_or(false)
            };
            if same_name || implements() {
                candidates.push(other.clone());
            }
        }

        candidates
    }

    /// `(receiver, method)` pairs in call order, minus self calls and ignored names
    fn calls<'b>(&self, body: &'b str) -> Vec<(&'b str, &'b str)> {
        self.call_regex
            .captures_iter(body)
            .filter_map(|caps| {
                let receiver = caps.get(1)?.as_str();
                let method = caps.get(2)?.as_str();
                if SELF_RECEIVERS.contains(&receiver) || self.ignore.is_ignored(method) {
                    return None;
                }
                Some((receiver, method))
            })
            .collect()
    }
}

fn declares_implements(normalized: &str, interface: &str) -> bool {
    normalized.split("implements").skip(1).any(|tail| {
        let clause = tail.split('{').next().unwrap_or("");
        clause
            .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .any(|token| token.rsplit('.').next() == Some(interface))
    })
}
