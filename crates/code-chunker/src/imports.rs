//! File-wide pool of import/require declarations.

use crate::parser::ParsedSource;
use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

static IMPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:import\b[^(]|(?:const|let|var)\s+[^=]+=\s*(?:await\s+)?require\s*\(|require\s*\()")
        .expect("valid import regex")
});

/// One import or require declaration, verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Local names the declaration binds
    pub identifiers: Vec<String>,
}

impl ImportEntry {
    /// Whether any bound identifier appears as a whole word in `content`
    pub fn is_referenced_by(&self, content: &str) -> bool {
        self.identifiers
            .iter()
            .any(|ident| contains_word(content, ident))
    }
}

/// Whether `content` already carries an import or require line
pub fn has_import_line(content: &str) -> bool {
    IMPORT_LINE.is_match(content)
}

fn contains_word(haystack: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    let is_ident = |ch: char| ch.is_alphanumeric() || ch == '_' || ch == '$';
    haystack.match_indices(word).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + word.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

/// Collect every import statement and require declaration in the file.
pub fn collect_imports(parsed: &ParsedSource<'_>) -> Vec<ImportEntry> {
    let mut entries = Vec::new();
    let mut stack = vec![parsed.root()];

    while let Some(node) = stack.pop() {
        match node.kind() {
            "import_statement" => entries.push(entry(parsed, node, import_bindings(parsed, node))),
            "lexical_declaration" | "variable_declaration" if declares_require(parsed, node) => {
                let mut identifiers = Vec::new();
                let mut cursor = node.walk();
                for declarator in node.named_children(&mut cursor) {
                    if let Some(name) = declarator.child_by_field_name("name") {
                        binding_identifiers(parsed, name, &mut identifiers);
                    }
                }
                entries.push(entry(parsed, node, identifiers));
            }
            _ => {
                let mut cursor = node.walk();
                let children: Vec<_> = node.named_children(&mut cursor).collect();
                stack.extend(children.into_iter().rev());
            }
        }
    }

    entries.sort_by_key(|entry| entry.start_line);
    entries
}

fn entry(parsed: &ParsedSource<'_>, node: Node<'_>, identifiers: Vec<String>) -> ImportEntry {
    ImportEntry {
        text: parsed.text(node).to_string(),
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        identifiers,
    }
}

fn import_bindings(parsed: &ParsedSource<'_>, node: Node<'_>) -> Vec<String> {
    let mut identifiers = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "import_clause" | "import_require_clause" => {
                collect_clause(parsed, child, &mut identifiers);
            }
            _ => {}
        }
    }
    identifiers
}

fn collect_clause(parsed: &ParsedSource<'_>, node: Node<'_>, out: &mut Vec<String>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "identifier" => out.push(parsed.text(child).to_string()),
            "import_specifier" => {
                let bound = child
                    .child_by_field_name("alias")
                    .or_else(|| child.child_by_field_name("name"));
                if let Some(bound) = bound {
                    out.push(parsed.text(bound).to_string());
                }
            }
            "namespace_import" | "named_imports" => collect_clause(parsed, child, out),
            _ => {}
        }
    }
}

fn declares_require(parsed: &ParsedSource<'_>, node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let declarators: Vec<_> = node.named_children(&mut cursor).collect();
    declarators.into_iter().any(|declarator| {
        declarator
            .child_by_field_name("value")
            .is_some_and(|value| is_require_value(parsed, value))
    })
}

/// `require(...)`, `require(...).member` or `await require(...)`
fn is_require_value(parsed: &ParsedSource<'_>, node: Node<'_>) -> bool {
    match node.kind() {
        "call_expression" => node.child_by_field_name("function").is_some_and(|callee| {
            if callee.kind() == "identifier" {
                parsed.text(callee) == "require"
            } else {
                is_require_value(parsed, callee)
            }
        }),
        "member_expression" => node
            .child_by_field_name("object")
            .is_some_and(|object| is_require_value(parsed, object)),
        "await_expression" | "parenthesized_expression" => node
            .named_child(0)
            .is_some_and(|inner| is_require_value(parsed, inner)),
        _ => false,
    }
}

fn binding_identifiers(parsed: &ParsedSource<'_>, node: Node<'_>, out: &mut Vec<String>) {
    match node.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => {
            out.push(parsed.text(node).to_string());
        }
        "pair_pattern" => {
            if let Some(value) = node.child_by_field_name("value") {
                binding_identifiers(parsed, value, out);
            }
        }
        _ => {
            let mut cursor = node.walk();
            let children: Vec<_> = node.named_children(&mut cursor).collect();
            for child in children {
                binding_identifiers(parsed, child, out);
            }
        }
    }
}
