//! Structural extent extraction.
//!
//! Parses one Go source file and emits, for every function-like construct
//! (declared function, method, func literal), its extent plus the ordered
//! list of minimal statement extents inside its body. The decomposition
//! mirrors how the coverage instrumenter partitions code into blocks, so the
//! extents produced here can be reconciled against profile blocks.
//!
//! All positions are 1-based line/column (the cover profile's coordinate
//! system); offsets are byte offsets into the file.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::error::{CovError, Result};

/// A contiguous source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub start_offset: usize,
    pub start_line: usize,
    pub start_col: usize,
    pub end_offset: usize,
    pub end_line: usize,
    pub end_col: usize,
}

/// A minimal executable unit inside a function body.
pub type StmtExtent = Extent;

/// A function's extent plus the statement extents of its body.
#[derive(Debug, Clone)]
pub struct FuncExtent {
    pub extent: Extent,
    /// Declared name, `Receiver.Name` for methods, `@line:col` for literals.
    pub name: String,
    pub stmts: Vec<StmtExtent>,
}

/// The AST does not record the position of the `else` keyword; back up from
/// the alternative by `len("else ")` to make the recorded span start there.
const BACKUP_TO_ELSE: usize = 5;

/// Parse the file and return one `FuncExtent` per function-like construct,
/// in document order.
pub fn find_funcs(file: &Path) -> Result<Vec<FuncExtent>> {
    let source = std::fs::read_to_string(file)?;
    find_funcs_in_source(file, &source)
}

/// As [`find_funcs`], but over already-loaded source text.
pub fn find_funcs_in_source(file: &Path, source: &str) -> Result<Vec<FuncExtent>> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_go::language())
        .expect("load Go grammar");

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| CovError::ParseSource {
            file: file.to_path_buf(),
            message: "parser produced no tree".to_string(),
        })?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(CovError::ParseSource {
            file: file.to_path_buf(),
            message: "syntax error".to_string(),
        });
    }

    let mut funcs = Vec::new();
    collect_funcs(root, source, &mut funcs)?;
    Ok(funcs)
}

/// Pre-order walk collecting function-like nodes. Nested func literals are
/// discovered after their enclosing function and become independent entries;
/// they do not inherit the enclosing function's statement list.
fn collect_funcs(node: Node, source: &str, funcs: &mut Vec<FuncExtent>) -> Result<()> {
    let body = match node.kind() {
        "function_declaration" | "method_declaration" | "func_literal" => {
            node.child_by_field_name("body")
        }
        _ => None,
    };

    if let Some(body) = body {
        let extent = extent_of(node);
        let name = match node.kind() {
            "function_declaration" => named_function_name(node, source),
            "method_declaration" => method_name(node, source),
            _ => String::new(),
        };
        let name = if name.is_empty() {
            format!("@{}:{}", extent.start_line, extent.start_col)
        } else {
            name
        };

        let mut stmts = Vec::new();
        visit_stmt(body, &mut stmts)?;
        funcs.push(FuncExtent {
            extent,
            name,
            stmts,
        });
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children {
        collect_funcs(child, source, funcs)?;
    }
    Ok(())
}

fn extent_of(node: Node) -> Extent {
    let start = node.start_position();
    let end = node.end_position();
    Extent {
        start_offset: node.start_byte(),
        start_line: start.row + 1,
        start_col: start.column + 1,
        end_offset: node.end_byte(),
        end_line: end.row + 1,
        end_col: end.column + 1,
    }
}

fn named_function_name(node: Node, source: &str) -> String {
    node.child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default()
}

/// Method name prepended with "T." where T is the receiver type,
/// dereferenced if it is a pointer.
fn method_name(node: Node, source: &str) -> String {
    let name = named_function_name(node, source);
    let receiver = node
        .child_by_field_name("receiver")
        .and_then(|list| {
            let mut cursor = list.walk();
            let param = list
                .named_children(&mut cursor)
                .find(|c| c.kind() == "parameter_declaration");
            param
        })
        .and_then(|param| param.child_by_field_name("type"))
        .map(|ty| type_name(ty, source))
        .unwrap_or_default();

    if receiver.is_empty() {
        name
    } else {
        format!("{receiver}.{name}")
    }
}

/// Closed match over the receiver type shapes Go allows; anything outside
/// the set yields an empty name.
fn type_name(node: Node, source: &str) -> String {
    match node.kind() {
        "pointer_type" => node
            .named_child(0)
            .map(|inner| type_name(inner, source))
            .unwrap_or_default(),
        "generic_type" => {
            let base = node
                .child_by_field_name("type")
                .map(|t| type_name(t, source))
                .unwrap_or_default();
            let args = node
                .child_by_field_name("type_arguments")
                .map(|a| node_text(a, source))
                .unwrap_or_default();
            format!("{base}{args}")
        }
        "type_identifier" => node_text(node, source).to_string(),
        _ => String::new(),
    }
}

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// How a node participates in statement decomposition.
enum StmtClass {
    /// Recorded as a statement extent of its own.
    Recorded,
    /// Contributes only its children (compound and control constructs).
    Compound,
    /// Not part of the executable decomposition (comments, stray tokens).
    Skipped,
}

fn classify(kind: &str) -> StmtClass {
    match kind {
        "const_declaration"
        | "var_declaration"
        | "type_declaration"
        | "short_var_declaration"
        | "assignment_statement"
        | "expression_statement"
        | "send_statement"
        | "inc_statement"
        | "dec_statement"
        | "return_statement"
        | "go_statement"
        | "defer_statement"
        | "break_statement"
        | "continue_statement"
        | "goto_statement"
        | "fallthrough_statement"
        | "labeled_statement"
        | "empty_statement" => StmtClass::Recorded,
        "block"
        | "if_statement"
        | "for_statement"
        | "expression_switch_statement"
        | "type_switch_statement"
        | "select_statement"
        | "expression_case"
        | "default_case"
        | "type_case"
        | "communication_case" => StmtClass::Compound,
        _ => StmtClass::Skipped,
    }
}

/// Record `node` as a statement extent if it is a recordable kind, then
/// descend into it. Compound constructs contribute only their children.
fn record_and_visit(node: Node, stmts: &mut Vec<StmtExtent>) -> Result<()> {
    match classify(node.kind()) {
        StmtClass::Recorded => {
            stmts.push(extent_of(node));
            visit_stmt(node, stmts)
        }
        StmtClass::Compound => visit_stmt(node, stmts),
        StmtClass::Skipped => Ok(()),
    }
}

/// Recursive statement decomposition, in document order. Mirrors the set of
/// compound shapes the Go grammar allows in an executable position.
fn visit_stmt(node: Node, stmts: &mut Vec<StmtExtent>) -> Result<()> {
    match node.kind() {
        "block" => {
            let mut cursor = node.walk();
            let children: Vec<Node> = node.named_children(&mut cursor).collect();
            for child in children {
                record_and_visit(child, stmts)?;
            }
        }
        "expression_case" | "default_case" | "type_case" | "communication_case" => {
            // The case's own value/type/communication clause is not part of
            // the body; only unfielded children are statements.
            for child in unfielded_named_children(node) {
                record_and_visit(child, stmts)?;
            }
        }
        "for_statement" => {
            let mut cursor = node.walk();
            let clause = node
                .named_children(&mut cursor)
                .find(|c| c.kind() == "for_clause");
            if let Some(clause) = clause {
                if let Some(init) = clause.child_by_field_name("initializer") {
                    record_and_visit(init, stmts)?;
                }
                if let Some(update) = clause.child_by_field_name("update") {
                    record_and_visit(update, stmts)?;
                }
            }
            if let Some(body) = node.child_by_field_name("body") {
                visit_stmt(body, stmts)?;
            }
        }
        "if_statement" => {
            if let Some(init) = node.child_by_field_name("initializer") {
                record_and_visit(init, stmts)?;
            }
            if let Some(consequence) = node.child_by_field_name("consequence") {
                visit_stmt(consequence, stmts)?;
            }
            if let Some(alt) = node.child_by_field_name("alternative") {
                visit_else(alt, stmts)?;
            }
        }
        "expression_switch_statement" | "type_switch_statement" | "select_statement" => {
            if let Some(init) = node.child_by_field_name("initializer") {
                record_and_visit(init, stmts)?;
            }
            let mut cursor = node.walk();
            let cases: Vec<Node> = node
                .named_children(&mut cursor)
                .filter(|c| c.kind().ends_with("_case"))
                .collect();
            for case in cases {
                visit_stmt(case, stmts)?;
            }
        }
        "labeled_statement" => {
            // The labeled span itself was recorded by the enclosing block;
            // descend into the inner statement without recording it again.
            let mut cursor = node.walk();
            let inner = node
                .named_children(&mut cursor)
                .find(|c| !matches!(classify(c.kind()), StmtClass::Skipped));
            if let Some(inner) = inner {
                visit_stmt(inner, stmts)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Named children that are not attached to a grammar field.
fn unfielded_named_children(node: Node) -> Vec<Node> {
    let mut children = Vec::new();
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            if child.is_named() && cursor.field_name().is_none() {
                children.push(child);
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    children
}

/// Handle the alternative branch of an `if`. For an `else if` chain the
/// recorded span is backed up to where the (unrecorded) `else` keyword sits,
/// so extents stay visually aligned with the source.
fn visit_else(alt: Node, stmts: &mut Vec<StmtExtent>) -> Result<()> {
    match alt.kind() {
        "if_statement" => {
            let mut extent = extent_of(alt);
            extent.start_offset = extent.start_offset.saturating_sub(BACKUP_TO_ELSE);
            extent.start_col = extent.start_col.saturating_sub(BACKUP_TO_ELSE).max(1);
            stmts.push(extent);
            visit_stmt(alt, stmts)
        }
        "block" => visit_stmt(alt, stmts),
        other => Err(CovError::StructuralInvariant(format!(
            "if alternative is a {other}"
        ))),
    }
}
