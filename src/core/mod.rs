// src/core/mod.rs
mod engine;
pub(crate) mod tuning;

// Project metadata and partitioning
mod metadata;
mod modules;

// Structural extraction: compile, then read class files
mod compile;
mod structure;

// Behavioral extraction: classify sources, then trace calls
mod behavior;
mod injection;
mod roles;
mod source;

pub mod model;

pub use engine::{AnalyzeOptions, Engine};
