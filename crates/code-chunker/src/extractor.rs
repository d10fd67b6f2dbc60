//! Semantic-unit extraction over a parsed syntax tree.

use crate::framework::FrameworkPatternMatcher;
use crate::imports::{collect_imports, ImportEntry};
use crate::parser::ParsedSource;
use crate::text::LineIndex;
use crate::token_counter::TokenCounter;
use crate::types::{SemanticUnit, UnitKind};
use tree_sitter::Node;

/// Visitor selected for a top-level statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Class,
    Function,
    VariableFunction,
    Export,
    Call,
}

/// Node kind → visitor
const DISPATCH: &[(&str, Visit)] = &[
    ("class_declaration", Visit::Class),
    ("abstract_class_declaration", Visit::Class),
    ("function_declaration", Visit::Function),
    ("generator_function_declaration", Visit::Function),
    ("lexical_declaration", Visit::VariableFunction),
    ("variable_declaration", Visit::VariableFunction),
    ("export_statement", Visit::Export),
    ("expression_statement", Visit::Call),
];

const FUNCTION_VALUE_KINDS: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration", "class"];

fn visitor_for(kind: &str) -> Option<Visit> {
    DISPATCH
        .iter()
        .find(|(node_kind, _)| *node_kind == kind)
        .map(|(_, visit)| *visit)
}

/// Units plus the import pool of one parse
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Ordered by position in the source
    pub units: Vec<SemanticUnit>,
    pub imports: Vec<ImportEntry>,
}

/// Walks top-level statements and emits semantic units
pub struct SemanticUnitExtractor<'a> {
    matcher: &'a FrameworkPatternMatcher,
    counter: &'a TokenCounter,
}

struct Walk<'p, 's> {
    parsed: &'p ParsedSource<'s>,
    lines: LineIndex<'s>,
    units: Vec<SemanticUnit>,
}

impl<'a> SemanticUnitExtractor<'a> {
    pub const fn new(matcher: &'a FrameworkPatternMatcher, counter: &'a TokenCounter) -> Self {
        Self { matcher, counter }
    }

    /// Extract units and imports from a parsed source
    pub fn extract(&self, parsed: &ParsedSource<'_>) -> Extraction {
        let mut walk = Walk {
            parsed,
            lines: LineIndex::new(parsed.source()),
            units: Vec::new(),
        };

        for statement in top_level_statements(parsed) {
            if let Some(visit) = visitor_for(statement.kind()) {
                self.visit(&mut walk, visit, statement);
            }
        }

        let mut units = walk.units;
        units.sort_by(|a, b| {
            a.byte_range
                .start
                .cmp(&b.byte_range.start)
                .then_with(|| b.byte_range.end.cmp(&a.byte_range.end))
        });

        Extraction {
            units,
            imports: collect_imports(parsed),
        }
    }

    fn visit(&self, walk: &mut Walk<'_, '_>, visit: Visit, node: Node<'_>) {
        match visit {
            Visit::Class => self.visit_class(walk, node, UnitKind::Class, node),
            Visit::Function => {
                let name = field_text(walk.parsed, node, "name").unwrap_or("anonymous");
                let unit = make_unit(walk, UnitKind::Function, name, node);
                walk.units.push(unit);
            }
            Visit::VariableFunction => {
                if let Some(name) = function_declarator_name(walk.parsed, node) {
                    let unit = make_unit(walk, UnitKind::VariableFunction, &name, node);
                    walk.units.push(unit);
                }
            }
            Visit::Export => self.visit_export(walk, node),
            Visit::Call => self.visit_call(walk, node),
        }
    }

    /// Emit `kind` for `outer`; split members out when `class_node` is oversized.
    fn visit_class(&self, walk: &mut Walk<'_, '_>, outer: Node<'_>, kind: UnitKind, class_node: Node<'_>) {
        let class_name = field_text(walk.parsed, class_node, "name")
            .unwrap_or("default")
            .to_string();
        let unit = make_unit(walk, kind, &class_name, outer);
        let oversized = self.counter.count(&unit.content) > self.counter.max_tokens();
        walk.units.push(unit);

        if !oversized {
            return;
        }

        let Some(body) = class_node.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        let members: Vec<_> = body
            .named_children(&mut cursor)
            .filter(|member| member.kind() != "comment")
            .collect();

        for member in members {
            let name = field_text(walk.parsed, member, "name")
                .or_else(|| field_text(walk.parsed, member, "property"))
                .unwrap_or_else(|| member.kind())
                .to_string();
            let mut method = make_unit(walk, UnitKind::Method, &name, member);
            method.parent = Some(class_name.clone());
            walk.units.push(method);
        }
    }

    fn visit_export(&self, walk: &mut Walk<'_, '_>, node: Node<'_>) {
        let inner = node
            .child_by_field_name("declaration")
            .or_else(|| node.child_by_field_name("value"));

        if let Some(inner) = inner.filter(|inner| CLASS_KINDS.contains(&inner.kind())) {
            self.visit_class(walk, node, UnitKind::Export, inner);
            return;
        }

        let name = inner
            .and_then(|inner| {
                field_text(walk.parsed, inner, "name")
                    .map(ToString::to_string)
                    .or_else(|| first_declarator_name(walk.parsed, inner))
            })
            .or_else(|| export_clause_names(walk.parsed, node))
            .unwrap_or_else(|| "default".to_string());

        let unit = make_unit(walk, UnitKind::Export, &name, node);
        walk.units.push(unit);
    }

    fn visit_call(&self, walk: &mut Walk<'_, '_>, node: Node<'_>) {
        if self.matcher.is_empty() {
            return;
        }
        let Some(mut expr) = node.named_child(0) else {
            return;
        };
        if expr.kind() == "await_expression" {
            match expr.named_child(0) {
                Some(inner) => expr = inner,
                None => return,
            }
        }
        if expr.kind() != "call_expression" {
            return;
        }

        let Some(callee) = expr.child_by_field_name("function") else {
            return;
        };
        let callee_text = walk.parsed.text(callee);
        let args = expr.child_by_field_name("arguments");
        let arg_count = args.map_or(0, |args| {
            let mut cursor = args.walk();
            let count = args
                .named_children(&mut cursor)
                .filter(|arg| arg.kind() != "comment")
                .count();
            count
        });

        let Some(hit) = self.matcher.classify(callee_text, arg_count) else {
            return;
        };

        let first_literal = args
            .and_then(|args| args.named_child(0))
            .filter(|arg| arg.kind() == "string" || arg.kind() == "template_string")
            .map(|arg| walk.parsed.text(arg));
        let compact: String = callee_text.split_whitespace().collect();
        let name = match first_literal {
            Some(literal) => format!("{compact} {literal}"),
            None => compact,
        };

        let mut unit = make_unit(walk, UnitKind::CallExpressionMatch, &name, node);
        unit.is_atomic = hit.is_atomic;
        unit.call_type = Some(hit.call_type);
        unit.node_kind = "call_expression".to_string();
        walk.units.push(unit);
    }
}

/// Program children plus the body of a factory assigned to `module.exports`.
fn top_level_statements<'t>(parsed: &'t ParsedSource<'_>) -> Vec<Node<'t>> {
    let root = parsed.root();
    let mut cursor = root.walk();
    let mut out = Vec::new();

    for statement in root.named_children(&mut cursor) {
        out.push(statement);
        if let Some(body) = exported_factory_body(parsed, statement) {
            let mut body_cursor = body.walk();
            out.extend(body.named_children(&mut body_cursor));
        }
    }

    out
}

fn exported_factory_body<'t>(parsed: &ParsedSource<'_>, statement: Node<'t>) -> Option<Node<'t>> {
    if statement.kind() != "expression_statement" {
        return None;
    }
    let assignment = statement.named_child(0)?;
    if assignment.kind() != "assignment_expression" {
        return None;
    }
    let left = assignment.child_by_field_name("left")?;
    let target: String = parsed.text(left).split_whitespace().collect();
    if target != "module.exports" {
        return None;
    }
    let right = assignment.child_by_field_name("right")?;
    if !FUNCTION_VALUE_KINDS.contains(&right.kind()) {
        return None;
    }
    right
        .child_by_field_name("body")
        .filter(|body| body.kind() == "statement_block")
}

fn make_unit(walk: &Walk<'_, '_>, kind: UnitKind, name: &str, node: Node<'_>) -> SemanticUnit {
    let (start_byte, start_line) = leading_run_start(walk, node);
    let end_byte = node.end_byte();

    SemanticUnit {
        kind,
        name: name.to_string(),
        start_line,
        end_line: node.end_position().row + 1,
        content: walk.parsed.source()[start_byte..end_byte].to_string(),
        is_atomic: false,
        node_kind: node.kind().to_string(),
        parent: None,
        call_type: None,
        byte_range: start_byte..end_byte,
    }
}

/// Start of the blank/comment run directly above `node`.
///
/// When other code shares the node's first line the unit starts at the node.
fn leading_run_start(walk: &Walk<'_, '_>, node: Node<'_>) -> (usize, usize) {
    let row = node.start_position().row;
    let line_start = walk.lines.start(row);
    let indent = &walk.parsed.source()[line_start..node.start_byte()];
    if !indent.trim().is_empty() {
        return (node.start_byte(), row + 1);
    }

    let first = walk.lines.leading_run(row);
    (walk.lines.start(first), first + 1)
}

fn field_text<'s>(parsed: &ParsedSource<'s>, node: Node<'_>, field: &str) -> Option<&'s str> {
    node.child_by_field_name(field).map(|child| parsed.text(child))
}

fn declarators<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let found: Vec<_> = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "variable_declarator")
        .collect();
    found
}

/// Name of the first declarator initialised with a function or arrow expression
fn function_declarator_name(parsed: &ParsedSource<'_>, node: Node<'_>) -> Option<String> {
    declarators(node).into_iter().find_map(|declarator| {
        let value = declarator.child_by_field_name("value")?;
        if !FUNCTION_VALUE_KINDS.contains(&value.kind()) {
            return None;
        }
        field_text(parsed, declarator, "name").map(ToString::to_string)
    })
}

fn first_declarator_name(parsed: &ParsedSource<'_>, node: Node<'_>) -> Option<String> {
    declarators(node)
        .into_iter()
        .find_map(|declarator| field_text(parsed, declarator, "name").map(ToString::to_string))
}

/// `export { a, b as c }` → `"a, c"`
fn export_clause_names(parsed: &ParsedSource<'_>, node: Node<'_>) -> Option<String> {
    let mut cursor = node.walk();
    let clause = node
        .named_children(&mut cursor)
        .find(|child| child.kind() == "export_clause")?;

    let mut clause_cursor = clause.walk();
    let names: Vec<&str> = clause
        .named_children(&mut clause_cursor)
        .filter_map(|spec| {
            spec.child_by_field_name("alias")
                .or_else(|| spec.child_by_field_name("name"))
                .map(|ident| parsed.text(ident))
        })
        .collect();

    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}
