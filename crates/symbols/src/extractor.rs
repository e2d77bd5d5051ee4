use crate::ast_analyzer::AstAnalyzer;
use crate::error::Result;
use crate::language::Language;
use crate::types::Extraction;

/// Extract symbols and import specifiers from one file.
///
/// Never fails: files in unsupported languages and files with syntax errors
/// yield an empty [`Extraction`] so the caller can still index them.
pub fn extract(path: &str, text: &str) -> Extraction {
    match try_extract(path, text) {
        Ok(extraction) => extraction,
        Err(err) => {
            log::debug!("Symbol extraction skipped for {path}: {err}");
            Extraction::default()
        }
    }
}

/// Like [`extract`] but reports parse failures. Files without a bundled
/// grammar are not a failure and yield an empty extraction.
pub fn try_extract(path: &str, text: &str) -> Result<Extraction> {
    let language = Language::from_path(path);
    if !language.supports_ast() {
        return Ok(Extraction::default());
    }
    let mut analyzer = AstAnalyzer::new(language)?;
    analyzer.analyze(text, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SymbolKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn malformed_source_yields_empty_extraction() {
        let extraction = extract("src/broken.ts", "export class {{{ = ;");
        assert!(extraction.is_empty());
    }

    #[test]
    fn try_extract_reports_syntax_errors() {
        assert!(try_extract("src/broken.py", "def broken(:\n    pass\n").is_err());
        assert!(try_extract("notes.txt", "anything").unwrap().is_empty());
    }

    #[test]
    fn unknown_language_yields_empty_extraction() {
        let extraction = extract("README.md", "# Title\n\nfunction add() {}\n");
        assert!(extraction.is_empty());
    }

    #[test]
    fn tsx_components_are_extracted() {
        let code = "export function App() {\n  return <div>hi</div>;\n}\n";
        let extraction = extract("web/App.tsx", code);
        assert_eq!(extraction.symbols.len(), 1);
        assert_eq!(extraction.symbols[0].name, "App");
        assert_eq!(extraction.symbols[0].kind, SymbolKind::Function);
        assert_eq!(extraction.symbols[0].file_path, "web/App.tsx");
    }
}
