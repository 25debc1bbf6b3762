// src/core/model.rs
//! Data handed from the engine to the renderers.
//!
//! Everything here is produced by a single module scan and never mutated
//! once built.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::behavior::humanize_method;

/// Which build description the tech stack was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectType {
    Maven,
    Gradle,
    Jar,
    Unknown,
    /// The project root does not exist
    NotFound,
    /// The build description exists but could not be read
    Error,
}

/// Flat inventory of the project's technology stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechStackSummary {
    pub project_type: ProjectType,
    /// Java language level
    pub language_version: Option<String>,
    /// Spring framework version, or the Boot version when no explicit one is declared
    pub framework_version: Option<String>,
    /// Spring Boot / container runtime version
    pub runtime_version: Option<String>,
    pub architecture: Option<String>,
    /// `group:artifact` coordinate -> resolved version
    pub dependencies: BTreeMap<String, String>,
}

impl TechStackSummary {
    pub fn empty(project_type: ProjectType) -> Self {
        Self {
            project_type,
            language_version: None,
            framework_version: None,
            runtime_version: None,
            architecture: None,
            dependencies: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNode {
    pub name: String,
    pub superclass: Option<String>,
    pub interfaces: BTreeSet<String>,
}

/// Class graph of one module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassGraph {
    /// Nodes in scan order
    pub classes: Vec<ClassNode>,
    /// Package filter the scan was restricted to
    pub packages: BTreeSet<String>,
    /// Set when more eligible classes existed than the cap allowed
    pub truncated: bool,
}

impl ClassGraph {
    /// `(child, parent)` inheritance edges
    pub fn inheritance_edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.classes
            .iter()
            .filter_map(|c| c.superclass.as_deref().map(|s| (c.name.as_str(), s)))
    }

    /// `(class, interface)` implementation edges
    pub fn implementation_edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.classes.iter().flat_map(|c| {
            c.interfaces
                .iter()
                .map(move |i| (c.name.as_str(), i.as_str()))
        })
    }
}

/// Architectural role of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    EntryPoint,
    Component,
    DataAccess,
    Unclassified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub role: Role,
    pub path: PathBuf,
}

/// Class identifier -> role, one entry per class
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleAssignment {
    entries: BTreeMap<String, RoleEntry>,
}

impl RoleAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a class. The first classification of a name wins.
    pub fn insert(&mut self, class: String, entry: RoleEntry) -> bool {
        if self.entries.contains_key(&class) {
            return false;
        }
        self.entries.insert(class, entry);
        true
    }

    pub fn get(&self, class: &str) -> Option<&RoleEntry> {
        self.entries.get(class)
    }

    pub fn role_of(&self, class: &str) -> Role {
        self.entries
            .get(class)
            .map(|e| e.role)
            .unwrap_or(Role::Unclassified)
    }

    /// Class names holding `role`, sorted
    pub fn classes_with(&self, role: Role) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|(_, e)| e.role == role)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn counts(&self) -> RoleCounts {
        let mut counts = RoleCounts::default();
        for entry in self.entries.values() {
            match entry.role {
                Role::EntryPoint => counts.entry_points += 1,
                Role::Component => counts.components += 1,
                Role::DataAccess => counts.data_access += 1,
                Role::Unclassified => counts.unclassified += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
    pub entry_points: usize,
    pub components: usize,
    pub data_access: usize,
    pub unclassified: usize,
}

/// Variable/field name -> known class it refers to, for one source file
pub type InjectionMap = BTreeMap<String, String>;

/// Externally reachable operation of an entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub request_type: Option<String>,
    /// `name: Type` pairs of the request payload
    pub request_fields: Vec<String>,
    pub response_type: Option<String>,
    pub response_status: Option<String>,
}

impl Operation {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request_type: None,
            request_fields: Vec::new(),
            response_type: None,
            response_status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller: String,
    pub callee: String,
    pub method: String,
    /// Readable arrow label, e.g. `fetch ById`
    pub label: String,
    /// Role of the callee, for the renderer's participant kind
    pub callee_role: Role,
}

impl CallEdge {
    pub fn new(caller: impl Into<String>, callee: impl Into<String>, method: impl Into<String>, callee_role: Role) -> Self {
        let method = method.into();
        Self {
            caller: caller.into(),
            callee: callee.into(),
            label: humanize_method(&method),
            method,
            callee_role,
        }
    }

    /// Deduplication key
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.caller, &self.callee, &self.method)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminal {
    DataAccess,
    DeadEnd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSequence {
    pub operation: Operation,
    pub edges: Vec<CallEdge>,
    pub terminal: Terminal,
}

impl CallSequence {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn involves(&self, class: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.caller == class || e.callee == class)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleReport {
    pub name: String,
    pub root: PathBuf,
    pub status: ModuleStatus,
    pub class_graph: Option<ClassGraph>,
    /// Name of the compile strategy that produced the classes
    pub compiled_with: Option<String>,
    /// Why the class graph is missing or empty, when structural extraction failed
    pub structure_error: Option<String>,
    pub roles: RoleCounts,
    /// Entry-point class -> one sequence per operation
    pub sequences: BTreeMap<String, Vec<CallSequence>>,
    pub problems: Vec<String>,
}

impl ModuleReport {
    pub fn failed(name: String, root: PathBuf, problem: String) -> Self {
        Self {
            name,
            root,
            status: ModuleStatus::Failed,
            class_graph: None,
            compiled_with: None,
            structure_error: None,
            roles: RoleCounts::default(),
            sequences: BTreeMap::new(),
            problems: vec![problem],
        }
    }
}

/// Aggregate result of one engine run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub root: PathBuf,
    pub tech_stack: TechStackSummary,
    pub modules: Vec<ModuleReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn module(&self, name: &str) -> Option<&ModuleReport> {
        self.modules.iter().find(|m| m.name == name)
    }
}
