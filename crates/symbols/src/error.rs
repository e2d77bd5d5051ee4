use thiserror::Error;

/// Result type for symbol extraction
pub type Result<T> = std::result::Result<T, SymbolsError>;

/// Errors raised while turning source text into symbols.
///
/// These never escape [`crate::extract`]; they are logged and the file is
/// recorded with empty symbol data.
#[derive(Error, Debug)]
pub enum SymbolsError {
    /// The parser could not produce a clean syntax tree
    #[error("Parse error: {0}")]
    ParseError(String),

    /// No grammar is bundled for the file's language
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Tree-sitter rejected the grammar
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),
}

impl SymbolsError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }
}
