//! # Context Symbols
//!
//! Syntax-tree symbol extraction for the workspace index.
//!
//! ## Architecture
//!
//! ```text
//! (path, text)
//!     │
//!     ├──> Language Detection (from extension)
//!     │
//!     ├──> Tree-sitter Parsing → AST
//!     │      └─> error nodes ⇒ empty extraction
//!     │
//!     └──> Pre-order Walk
//!          ├─> Declarations → SymbolInfo { name, kind, span }
//!          └─> Import specifiers → BTreeSet<String>
//! ```
//!
//! ## Example
//!
//! ```rust
//! use context_symbols::{extract, SymbolKind};
//!
//! let code = r#"
//! import { readFile } from "fs";
//!
//! function add(a, b) {
//!     return a + b;
//! }
//! "#;
//!
//! let extraction = extract("util.ts", code);
//! assert_eq!(extraction.symbols[0].name, "add");
//! assert_eq!(extraction.symbols[0].kind, SymbolKind::Function);
//! assert!(extraction.imports.contains("fs"));
//! ```

mod ast_analyzer;
mod error;
mod extractor;
mod language;
mod types;

pub use ast_analyzer::AstAnalyzer;
pub use error::{Result, SymbolsError};
pub use extractor::{extract, try_extract};
pub use language::Language;
pub use types::{Extraction, Span, SymbolInfo, SymbolKind};
