use crate::error::{ChunkerError, Result};
use crate::language::Language;
use tree_sitter::{Node, Parser, Tree};

/// Produces syntax trees with line/column spans for every node.
///
/// A tree-sitter `Parser` is built per call, so one `CodeParser` can serve
/// concurrent splits.
#[derive(Debug, Clone, Copy)]
pub struct CodeParser {
    language: Language,
}

/// Source text together with its tree
pub struct ParsedSource<'a> {
    source: &'a str,
    tree: Tree,
}

impl CodeParser {
    pub const fn new(language: Language) -> Self {
        Self { language }
    }

    pub const fn language(&self) -> Language {
        self.language
    }

    /// Parse `source`, rejecting trees that needed error recovery
    pub fn parse<'a>(&self, source: &'a str) -> Result<ParsedSource<'a>> {
        let tree = self.build_tree(source)?;

        let root = tree.root_node();
        if root.has_error() {
            let (line, message) = first_error(root).map_or_else(
                || (1, "syntax error".to_string()),
                |node| {
                    let what = if node.is_missing() {
                        format!("missing `{}`", node.kind())
                    } else {
                        "unexpected syntax".to_string()
                    };
                    (node.start_position().row + 1, what)
                },
            );
            return Err(ChunkerError::parse(line, message));
        }

        Ok(ParsedSource { source, tree })
    }

    /// Parse `source`, keeping whatever tree error recovery produced.
    ///
    /// Used on fragments (halves of a class, partial bodies) where statement
    /// positions are still useful even though the text does not parse cleanly.
    pub fn parse_lenient<'a>(&self, source: &'a str) -> Result<ParsedSource<'a>> {
        let tree = self.build_tree(source)?;
        Ok(ParsedSource { source, tree })
    }

    fn build_tree(&self, source: &str) -> Result<Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language.tree_sitter_language())
            .map_err(|e| ChunkerError::tree_sitter(format!("Failed to set language: {e}")))?;

        parser
            .parse(source, None)
            .ok_or_else(|| ChunkerError::parse(1, "parser returned no tree"))
    }
}

impl<'a> ParsedSource<'a> {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub const fn source(&self) -> &'a str {
        self.source
    }

    /// Verbatim text of a node
    pub fn text(&self, node: Node<'_>) -> &'a str {
        &self.source[node.start_byte()..node.end_byte()]
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typed_module() {
        let parser = CodeParser::new(Language::TypeScript);
        let parsed = parser
            .parse("import { a } from './a';\nexport function f(x: number): number { return a(x); }\n")
            .unwrap();
        assert_eq!(parsed.root().kind(), "program");
        assert_eq!(parsed.root().named_child_count(), 2);
    }

    #[test]
    fn reports_line_of_syntax_error() {
        let parser = CodeParser::new(Language::JavaScript);
        let err = parser
            .parse("const ok = 1;\n\nfunction broken( { if (x > ] return\n")
            .err()
            .unwrap();
        match err {
            ChunkerError::Parse { line, .. } => assert!(line >= 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lenient_parse_keeps_partial_tree() {
        let parser = CodeParser::new(Language::JavaScript);
        let parsed = parser.parse_lenient("class A {\n  a() {}\n  b() {}\n").unwrap();
        assert!(parsed.root().has_error());
        assert!(parsed.root().named_child_count() >= 1);
    }

    #[test]
    fn node_text_is_verbatim() {
        let source = "let a = 1;\nfunction g() {}\n";
        let parser = CodeParser::new(Language::JavaScript);
        let parsed = parser.parse(source).unwrap();
        let root = parsed.root();
        let func = root.named_child(1).unwrap();
        assert_eq!(parsed.text(func), "function g() {}");
    }
}
