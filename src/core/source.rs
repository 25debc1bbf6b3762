// src/core/source.rs
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, StrataError};

/// Conventional source roots, most specific first
pub const SOURCE_ROOT_CANDIDATES: [&str; 4] = ["src/main/java", "src", "app", "code"];

/// Lexer position while stripping comments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    InString,
    InChar,
    TextBlock,
    LineComment,
    BlockComment,
}

/// Reads Java sources and normalizes them for lexical analysis
pub struct SourceReader {
    whitespace_regex: Regex,
    type_name_regex: Regex,
}

impl SourceReader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            whitespace_regex: Regex::new(r"\s+")?,
            type_name_regex: Regex::new(r"\b(?:class|interface|enum)\s+(\w+)")?,
        })
    }

    /// Read a file, repairing the encoding, and return normalized text
    pub fn read(&self, path: &Path) -> Result<String> {
        let raw = self.read_raw(path)?;
        Ok(self.normalize(&raw))
    }

    /// Read a file as text: UTF-8 first, Latin-1 when the bytes are not valid UTF-8
    pub fn read_raw(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path).map_err(|e| StrataError::SourceReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(err) => {
                debug!("{} is not UTF-8, decoding as Latin-1", path.display());
                Ok(err.into_bytes().iter().map(|&b| b as char).collect())
            }
        }
    }

    /// Strip comments and collapse whitespace to single spaces
    pub fn normalize(&self, code: &str) -> String {
        let without_comments = strip_comments(code);
        self.whitespace_regex
            .replace_all(&without_comments, " ")
            .trim()
            .to_string()
    }

    /// First declared class, interface or enum name
    pub fn type_name(&self, normalized: &str) -> Option<String> {
        self.type_name_regex
            .captures(normalized)
            .map(|caps| caps[1].to_string())
    }
}

/// Remove `//` and `/* */` comments outside string, char and text-block
/// literals. Each comment leaves a single space behind.
fn strip_comments(code: &str) -> String {
    let bytes = code.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut state = Scan::Code;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        match state {
            Scan::Code => {
                if b == b'/' && next == Some(b'/') {
                    state = Scan::LineComment;
                    out.push(b' ');
                    i += 2;
                    continue;
                }
                if b == b'/' && next == Some(b'*') {
                    state = Scan::BlockComment;
                    out.push(b' ');
                    i += 2;
                    continue;
                }
                if bytes[i..].starts_with(b"\"\"\"") {
                    state = Scan::TextBlock;
                    out.extend_from_slice(b"\"\"\"");
                    i += 3;
                    continue;
                }
                match b {
                    b'"' => state = Scan::InString,
                    b'\'' => state = Scan::InChar,
                    _ => {}
                }
                out.push(b);
            }
            Scan::InString | Scan::InChar | Scan::TextBlock => {
                if b == b'\\' {
                    out.push(b);
                    if let Some(escaped) = next {
                        out.push(escaped);
                    }
                    i += 2;
                    continue;
                }
                if state == Scan::TextBlock && bytes[i..].starts_with(b"\"\"\"") {
                    state = Scan::Code;
                    out.extend_from_slice(b"\"\"\"");
                    i += 3;
                    continue;
                }

                out.push(b);
                // Plain literals cannot span lines; recover at the line end
                match (state, b) {
                    (Scan::InString, b'"') | (Scan::InChar, b'\'') => state = Scan::Code,
                    (Scan::InString | Scan::InChar, b'\n') => state = Scan::Code,
                    _ => {}
                }
            }
            Scan::LineComment => {
                if b == b'\n' {
                    out.push(b);
                    state = Scan::Code;
                }
            }
            Scan::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = Scan::Code;
                    i += 2;
                    continue;
                }
            }
        }
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Locate the Java source root of a module
pub fn find_source_dir(root: &Path) -> Option<PathBuf> {
    for candidate in SOURCE_ROOT_CANDIDATES {
        let path = root.join(candidate);
        if path.is_dir() {
            return Some(path);
        }
    }

    WalkDir::new(root)
        .max_depth(4)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_dir() && e.file_name().eq_ignore_ascii_case("java"))
        .map(|e| e.into_path())
}

/// All `.java` files below `dir`, in a stable order
pub fn java_files(dir: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(dir)
        .hidden(false)
        .git_ignore(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    walker
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().map(|ext| ext == "java").unwrap_or(false))
        .collect()
}
