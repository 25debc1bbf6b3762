// src/core/behavior/body.rs
//! Method isolation by delimiter counting.
//!
//! A small state machine blanks out string and character literals so that
//! delimiters inside them never count; method headers, parameter lists and
//! bodies are then located by plain depth counting over the blanked copy.
//! Nothing here parses statements, so sources that do not compile still work.

/// Words that look like `name (` but never start a method declaration
const NOT_METHOD_NAMES: [&str; 12] = [
    "if", "for", "while", "switch", "catch", "synchronized", "try", "return", "new", "else", "do", "throw",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    InString,
    InChar,
}

/// A method declaration found in source text; slices borrow the original text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl<'a> {
    pub name: &'a str,
    /// Annotations, modifiers and return type before the name
    pub header: &'a str,
    /// Text between the parameter parentheses
    pub params: &'a str,
    /// `{ ... }` including the braces; `None` for abstract and interface methods
    pub body: Option<&'a str>,
}

impl MethodDecl<'_> {
    pub fn is_public(&self) -> bool {
        has_word(self.header, "public")
    }

    pub fn is_static(&self) -> bool {
        has_word(self.header, "static")
    }
}

fn has_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric() && c != '_').any(|w| w == word)
}

/// Source text plus a copy with literal contents blanked, same byte layout
pub struct SourceIndex<'a> {
    source: &'a str,
    masked: Vec<u8>,
}

impl<'a> SourceIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            masked: mask_literals(source),
        }
    }

    /// Every method declaration outside other method bodies, in source order
    pub fn methods(&self) -> Vec<MethodDecl<'a>> {
        let mut found = Vec::new();
        let mut i = 0;

        while i < self.masked.len() {
            if self.masked[i] == b'(' {
                if let Some((decl, end)) = self.declaration_at(i) {
                    found.push(decl);
                    i = end + 1;
                    continue;
                }
            }
            i += 1;
        }

        found
    }

    /// Body of the first declaration of `name` that has one
    pub fn method_body(&self, name: &str) -> Option<&'a str> {
        self.methods()
            .into_iter()
            .filter(|m| m.name == name)
            .find_map(|m| m.body)
    }

    /// Parse a declaration whose parameter list opens at `paren`.
    /// Returns the declaration and the index of its last byte.
    fn declaration_at(&self, paren: usize) -> Option<(MethodDecl<'a>, usize)> {
        let (name_start, name_end) = self.identifier_before(paren)?;
        let name = &self.source[name_start..name_end];
        if NOT_METHOD_NAMES.contains(&name) {
            return None;
        }

        // A declaration's name follows a type, never an operator or a dot
        let before = self.skip_space_back(name_start)?;
        let prev = self.masked[before];
        if !(prev.is_ascii_alphanumeric() || prev == b'_' || prev == b'>' || prev == b']' || prev >= 0x80) {
            return None;
        }
        if self.word_ending_at(before) == Some("new") {
            return None;
        }

        let close = find_matching(&self.masked, paren, b'(', b')')?;
        let header_start = self.header_start(name_start);
        let header = self.source[header_start..name_start].trim();
        let params = &self.source[paren + 1..close];

        // Only a `throws` clause may sit between `)` and the body
        let mut j = close + 1;
        while j < self.masked.len() {
            let b = self.masked[j];
            match b {
                b'{' => {
                    let end = find_matching(&self.masked, j, b'{', b'}')?;
                    let decl = MethodDecl {
                        name,
                        header,
                        params,
                        body: Some(&self.source[j..=end]),
                    };
                    return Some((decl, end));
                }
                b';' => {
                    let decl = MethodDecl {
                        name,
                        header,
                        params,
                        body: None,
                    };
                    return Some((decl, j));
                }
                _ if b.is_ascii_whitespace() || b.is_ascii_alphanumeric() || b"_.,<>".contains(&b) || b >= 0x80 => {
                    j += 1;
                }
                _ => return None,
            }
        }

        None
    }

    fn identifier_before(&self, paren: usize) -> Option<(usize, usize)> {
        let end = self.skip_space_back(paren)? + 1;
        let mut start = end;
        while start > 0 && is_ident_byte(self.masked[start - 1]) {
            start -= 1;
        }

        let first = self.masked.get(start)?;
        if start == end || first.is_ascii_digit() || (start > 0 && self.masked[start - 1] == b'@') {
            return None;
        }
        Some((start, end))
    }

    /// Index of the last non-space byte before `at`
    fn skip_space_back(&self, at: usize) -> Option<usize> {
        let mut i = at;
        while i > 0 {
            i -= 1;
            if !self.masked[i].is_ascii_whitespace() {
                return Some(i);
            }
        }
        None
    }

    fn word_ending_at(&self, end: usize) -> Option<&'a str> {
        let mut start = end + 1;
        while start > 0 && is_ident_byte(self.masked[start - 1]) {
            start -= 1;
        }
        (start <= end).then(|| &self.source[start..=end])
    }

    /// Start of the header: just past the previous `;`, `{` or `}` that is not
    /// inside annotation parentheses
    fn header_start(&self, name_start: usize) -> usize {
        let mut depth = 0usize;
        let mut i = name_start;
        while i > 0 {
            i -= 1;
            match self.masked[i] {
                b')' => depth += 1,
                b'(' => depth = depth.saturating_sub(1),
                b';' | b'{' | b'}' if depth == 0 => return i + 1,
                _ => {}
            }
        }
        0
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// Replace the contents of string and char literals with spaces. Delimiting
/// quotes stay; every byte keeps its position.
fn mask_literals(source: &str) -> Vec<u8> {
    let mut masked = source.as_bytes().to_vec();
    let mut state = State::Code;
    let mut escaped = false;

    for b in masked.iter_mut() {
        match state {
            State::Code => match *b {
                b'"' => state = State::InString,
                b'\'' => state = State::InChar,
                _ => {}
            },
            State::InString | State::InChar => {
                let closing = if state == State::InString { b'"' } else { b'\'' };
                if escaped {
                    escaped = false;
                    *b = b' ';
                } else if *b == b'\\' {
                    escaped = true;
                    *b = b' ';
                } else if *b == closing {
                    state = State::Code;
                } else {
                    *b = b' ';
                }
            }
        }
    }

    masked
}

/// Index of the delimiter closing the one at `open_at`
fn find_matching(masked: &[u8], open_at: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in masked.iter().enumerate().skip(open_at) {
        if b == open {
            depth += 1;
        } else if b == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}
