use crate::error::{Result, SymbolsError};
use crate::language::Language;
use crate::types::{Extraction, Span, SymbolInfo, SymbolKind};
use tree_sitter::{Node, Parser};

/// Walks a syntax tree and records declarations and import specifiers
pub struct AstAnalyzer {
    parser: Parser,
    language: Language,
}

impl AstAnalyzer {
    /// Create new AST analyzer for a language
    pub fn new(language: Language) -> Result<Self> {
        if !language.supports_ast() {
            return Err(SymbolsError::unsupported_language(language.as_str()));
        }

        let ts_language = language.tree_sitter_language()?;
        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| SymbolsError::tree_sitter(format!("Failed to set language: {e}")))?;

        Ok(Self { parser, language })
    }

    /// Parse `content` and collect symbols in declaration order.
    ///
    /// A tree containing error nodes is rejected as a whole.
    pub fn analyze(&mut self, content: &str, file_path: &str) -> Result<Extraction> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| SymbolsError::parse("Failed to parse source code"))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(SymbolsError::parse(format!(
                "syntax errors in {file_path} ({} language)",
                self.language.as_str()
            )));
        }

        let mut extraction = Extraction::default();
        let mut cursor = root.walk();
        // Pre-order: visit, descend, then move to the next sibling or climb back up.
        loop {
            self.visit(content, file_path, cursor.node(), &mut extraction);
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return Ok(extraction);
                }
            }
        }
    }

    fn visit(&self, content: &str, file_path: &str, node: Node, out: &mut Extraction) {
        let found = match self.language {
            Language::Rust => self.visit_rust(content, node, out),
            Language::Python => self.visit_python(content, node, out),
            lang if lang.is_ecmascript() => self.visit_ecmascript(content, node, out),
            _ => None,
        };

        if let Some((name, kind, span)) = found {
            if !name.is_empty() && !span.is_inverted() {
                out.symbols
                    .push(SymbolInfo::new(name, kind, file_path, span));
            }
        }
    }

    fn visit_ecmascript(
        &self,
        content: &str,
        node: Node,
        out: &mut Extraction,
    ) -> Option<(String, SymbolKind, Span)> {
        let kind = match node.kind() {
            "function_declaration" | "generator_function_declaration" => SymbolKind::Function,
            "class_declaration" | "abstract_class_declaration" => SymbolKind::Class,
            "interface_declaration" => SymbolKind::Interface,
            "enum_declaration" => SymbolKind::Enum,
            "type_alias_declaration" => SymbolKind::TypeAlias,
            "method_definition" | "method_signature" | "abstract_method_signature" => {
                SymbolKind::Method
            }
            "variable_declarator" => return Self::variable(content, node, "name", "identifier"),
            "import_statement" => {
                let source = node.child_by_field_name("source").or_else(|| {
                    let mut cursor = node.walk();
                    let clause = node
                        .named_children(&mut cursor)
                        .find(|child| child.kind() == "import_require_clause");
                    clause.and_then(|c| c.child_by_field_name("source"))
                });
                Self::record_import(content, source, out);
                return None;
            }
            "export_statement" => {
                Self::record_import(content, node.child_by_field_name("source"), out);
                return None;
            }
            "call_expression" => {
                let callee = node.child_by_field_name("function")?;
                let is_loader = match callee.kind() {
                    "import" => true,
                    "identifier" => node_text(content, callee) == Some("require"),
                    _ => false,
                };
                if is_loader {
                    let args = node.child_by_field_name("arguments")?;
                    let mut cursor = args.walk();
                    let first = args.named_children(&mut cursor).next();
                    if first.is_some_and(|arg| arg.kind() == "string") {
                        Self::record_import(content, first, out);
                    }
                }
                return None;
            }
            _ => return None,
        };

        let name = node_text(content, node.child_by_field_name("name")?)?;
        Some((name.to_string(), kind, node_span(node)))
    }

    fn visit_python(
        &self,
        content: &str,
        node: Node,
        out: &mut Extraction,
    ) -> Option<(String, SymbolKind, Span)> {
        let kind = match node.kind() {
            "function_definition" if python_in_class_body(node) => SymbolKind::Method,
            "function_definition" => SymbolKind::Function,
            "class_definition" => SymbolKind::Class,
            "assignment" => {
                let statement = node.parent()?;
                let scope = statement.parent()?;
                let top_level = statement.kind() == "expression_statement"
                    && (scope.kind() == "module"
                        || (scope.kind() == "block"
                            && scope.parent().is_some_and(|p| p.kind() == "class_definition")));
                if !top_level {
                    return None;
                }
                return Self::variable(content, node, "left", "identifier");
            }
            "import_statement" => {
                let mut cursor = node.walk();
                for name in node.children_by_field_name("name", &mut cursor) {
                    let module = if name.kind() == "aliased_import" {
                        name.child_by_field_name("name")
                    } else {
                        Some(name)
                    };
                    if let Some(text) = module.and_then(|m| node_text(content, m)) {
                        out.imports.insert(text.to_string());
                    }
                }
                return None;
            }
            "import_from_statement" => {
                let module = node.child_by_field_name("module_name")?;
                if let Some(text) = node_text(content, module) {
                    out.imports.insert(text.to_string());
                }
                return None;
            }
            _ => return None,
        };

        let name = node_text(content, node.child_by_field_name("name")?)?;
        Some((name.to_string(), kind, node_span(node)))
    }

    fn visit_rust(
        &self,
        content: &str,
        node: Node,
        out: &mut Extraction,
    ) -> Option<(String, SymbolKind, Span)> {
        let kind = match node.kind() {
            "function_item" if rust_in_impl_or_trait(node) => SymbolKind::Method,
            "function_item" => SymbolKind::Function,
            "function_signature_item" => SymbolKind::Method,
            "struct_item" | "union_item" => SymbolKind::Class,
            "trait_item" => SymbolKind::Interface,
            "enum_item" => SymbolKind::Enum,
            "type_item" => SymbolKind::TypeAlias,
            "const_item" | "static_item" => SymbolKind::Variable,
            "let_declaration" => return Self::variable(content, node, "pattern", "identifier"),
            "use_declaration" => {
                let argument = node.child_by_field_name("argument")?;
                if let Some(text) = node_text(content, argument) {
                    out.imports.insert(text.to_string());
                }
                return None;
            }
            "extern_crate_declaration" => {
                let crate_name = node.child_by_field_name("name")?;
                if let Some(text) = node_text(content, crate_name) {
                    out.imports.insert(text.to_string());
                }
                return None;
            }
            _ => return None,
        };

        let name = node_text(content, node.child_by_field_name("name")?)?;
        Some((name.to_string(), kind, node_span(node)))
    }

    /// Variable declarations span from the declarator start to the end of the
    /// name, so `const x = longExpression` stays tight. Patterns are skipped.
    fn variable(
        content: &str,
        node: Node,
        field: &str,
        identifier_kind: &str,
    ) -> Option<(String, SymbolKind, Span)> {
        let name_node = node.child_by_field_name(field)?;
        if name_node.kind() != identifier_kind {
            return None;
        }
        let name = node_text(content, name_node)?;
        let start = node.start_position();
        let end = name_node.end_position();
        let span = Span::new(start.row + 1, start.column, end.row + 1, end.column);
        Some((name.to_string(), SymbolKind::Variable, span))
    }

    fn record_import(content: &str, source: Option<Node>, out: &mut Extraction) {
        let Some(text) = source.and_then(|node| node_text(content, node)) else {
            return;
        };
        let specifier = text.trim_matches(|c| c == '"' || c == '\'' || c == '`');
        if !specifier.is_empty() {
            out.imports.insert(specifier.to_string());
        }
    }
}

fn node_text<'a>(content: &'a str, node: Node) -> Option<&'a str> {
    node.utf8_text(content.as_bytes()).ok()
}

fn node_span(node: Node) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span::new(start.row + 1, start.column, end.row + 1, end.column)
}

fn python_in_class_body(node: Node) -> bool {
    let mut parent = node.parent();
    if parent.is_some_and(|p| p.kind() == "decorated_definition") {
        parent = parent.and_then(|p| p.parent());
    }
    parent.is_some_and(|block| {
        block.kind() == "block"
            && block
                .parent()
                .is_some_and(|owner| owner.kind() == "class_definition")
    })
}

fn rust_in_impl_or_trait(node: Node) -> bool {
    node.parent().is_some_and(|list| {
        list.kind() == "declaration_list"
            && list
                .parent()
                .is_some_and(|owner| matches!(owner.kind(), "impl_item" | "trait_item"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn analyze(language: Language, code: &str) -> Extraction {
        let mut analyzer = AstAnalyzer::new(language).unwrap();
        analyzer.analyze(code, "test").unwrap()
    }

    fn names(extraction: &Extraction) -> Vec<(&str, SymbolKind)> {
        extraction
            .symbols
            .iter()
            .map(|s| (s.name.as_str(), s.kind))
            .collect()
    }

    #[test]
    fn test_rust_symbols() {
        let code = r#"
use std::collections::HashMap;

const LIMIT: usize = 4;

struct Point {
    x: i32,
}

trait Shape {
    fn area(&self) -> f64;
}

impl Point {
    fn norm(&self) -> i32 {
        let (a, b) = (self.x, 0);
        let total = a + b;
        total
    }
}

fn main() {
    println!("Hello");
}
"#;

        let extraction = analyze(Language::Rust, code);
        assert_eq!(
            names(&extraction),
            vec![
                ("LIMIT", SymbolKind::Variable),
                ("Point", SymbolKind::Class),
                ("Shape", SymbolKind::Interface),
                ("area", SymbolKind::Method),
                ("norm", SymbolKind::Method),
                ("total", SymbolKind::Variable),
                ("main", SymbolKind::Function),
            ]
        );
        assert!(extraction.imports.contains("std::collections::HashMap"));
    }

    #[test]
    fn test_python_methods_and_imports() {
        let code = r#"
import os.path
from collections import OrderedDict
import numpy as np

RETRIES = 3

def hello():
    local = 1
    print("Hello")

class MyClass:
    label = "x"

    @staticmethod
    def build():
        pass

    def method(self):
        pass
"#;

        let extraction = analyze(Language::Python, code);
        assert_eq!(
            names(&extraction),
            vec![
                ("RETRIES", SymbolKind::Variable),
                ("hello", SymbolKind::Function),
                ("MyClass", SymbolKind::Class),
                ("label", SymbolKind::Variable),
                ("build", SymbolKind::Method),
                ("method", SymbolKind::Method),
            ]
        );
        let imports: Vec<_> = extraction.imports.iter().map(String::as_str).collect();
        assert_eq!(imports, vec!["collections", "numpy", "os.path"]);
    }

    #[test]
    fn test_javascript_require_and_classes() {
        let code = r#"
const fs = require('fs');
const { join } = require("path");

class Store {
  load() {
    return fs.readFileSync(join('a', 'b'));
  }
}
"#;

        let extraction = analyze(Language::JavaScript, code);
        assert_eq!(
            names(&extraction),
            vec![
                ("fs", SymbolKind::Variable),
                ("Store", SymbolKind::Class),
                ("load", SymbolKind::Method),
            ]
        );
        let imports: Vec<_> = extraction.imports.iter().map(String::as_str).collect();
        assert_eq!(imports, vec!["fs", "path"]);
    }

    #[test]
    fn test_unsupported_language() {
        assert!(AstAnalyzer::new(Language::Unknown).is_err());
    }

    #[test]
    fn test_syntax_errors_are_rejected() {
        let mut analyzer = AstAnalyzer::new(Language::TypeScript).unwrap();
        let result = analyzer.analyze("function broken( {\n  return ;\n", "broken.ts");
        assert!(result.is_err());
    }
}
