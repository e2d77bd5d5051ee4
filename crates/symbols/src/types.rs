use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of a declared program entity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Enum,
    TypeAlias,
    Variable,
}

impl SymbolKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::TypeAlias => "type_alias",
            Self::Variable => "variable",
        }
    }
}

/// Source region of a declaration.
///
/// Lines are 1-indexed, characters are 0-indexed byte columns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Span {
    pub start_line: usize,
    pub start_char: usize,
    pub end_line: usize,
    pub end_char: usize,
}

impl Span {
    #[must_use]
    pub const fn new(start_line: usize, start_char: usize, end_line: usize, end_char: usize) -> Self {
        Self {
            start_line,
            start_char,
            end_line,
            end_char,
        }
    }

    /// Character bounds only apply on the first and last line of the span.
    #[must_use]
    pub const fn contains(&self, line: usize, ch: usize) -> bool {
        if line < self.start_line || line > self.end_line {
            return false;
        }
        if line == self.start_line && ch < self.start_char {
            return false;
        }
        if line == self.end_line && ch > self.end_char {
            return false;
        }
        true
    }

    #[must_use]
    pub const fn is_inverted(&self) -> bool {
        self.end_line < self.start_line
            || (self.end_line == self.start_line && self.end_char < self.start_char)
    }

    /// Size used to rank enclosing spans: line delta first, then char delta.
    ///
    /// The char delta is `end_char - start_char` even for multi-line spans,
    /// so it can be negative; two spans covering the same number of lines
    /// rank by that column difference alone.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn extent(&self) -> (usize, i64) {
        (
            self.end_line.saturating_sub(self.start_line),
            self.end_char as i64 - self.start_char as i64,
        )
    }

    /// Start position as a comparable `(line, char)` pair
    #[must_use]
    pub const fn start(&self) -> (usize, usize) {
        (self.start_line, self.start_char)
    }
}

/// One declared program entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    /// Workspace-relative path with `/` separators
    pub file_path: String,
    pub span: Span,
}

impl SymbolInfo {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        file_path: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            file_path: file_path.into(),
            span,
        }
    }
}

/// Symbols and import specifiers found in one file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Extraction {
    /// Declaration order (pre-order over the syntax tree)
    pub symbols: Vec<SymbolInfo>,
    pub imports: BTreeSet<String>,
}

impl Extraction {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.imports.is_empty()
    }
}
