//! Native tree-sitter parser wrapper for Python source.
//!
//! # Design decisions
//!
//! - **No stored state.** `CodeParser` carries no fields. Tree-sitter's
//!   `Parser` is `!Sync`, so a fresh parser is created on every call. This is
//!   cheap: `Parser::new()` is a single allocation and `set_language` is a
//!   pointer swap.
//!
//! - **Strict validity on top of an error-tolerant grammar.** tree-sitter
//!   always produces a tree, inserting `ERROR` and `MISSING` nodes where the
//!   input does not fit the grammar. [`CodeParser::parse`] rejects any tree
//!   carrying such nodes and reports the first one as a syntax diagnostic.
//!
//! - **The grammar is looser than CPython.** It still accepts Python 2
//!   `print`/`exec` statements and a few orderings and targets the
//!   interpreter rejects. [`first_invalid_construct`] checks those on the
//!   error-free tree.

use tree_sitter::{Node, Tree};

use crate::error::{AnalyzerError, Result};

/// Thin wrapper around native tree-sitter parsing for Python.
///
/// The grammar is statically linked at build time. The struct is `Send`,
/// `Sync`, and zero-sized; share it freely.
pub struct CodeParser;

impl CodeParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse `content` and return the syntax tree, or a
    /// [`AnalyzerError::Parse`] describing the first syntax error.
    pub fn parse(&self, content: &str) -> Result<Tree> {
        let tree = self.parse_lenient(content)?;
        let root = tree.root_node();
        if root.has_error() {
            let diagnostic = first_syntax_error(root, content.as_bytes())
                .map(|d| d.to_string())
                .unwrap_or_else(|| "syntax error: source could not be parsed".to_string());
            return Err(AnalyzerError::Parse(diagnostic));
        }
        if let Some(diagnostic) = first_invalid_construct(root, content.as_bytes()) {
            return Err(AnalyzerError::Parse(diagnostic.to_string()));
        }
        Ok(tree)
    }

    /// Parse without the validity check. The tree may contain `ERROR` nodes.
    pub fn parse_lenient(&self, content: &str) -> Result<Tree> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&Self::ts_language())
            .map_err(|e| AnalyzerError::Internal(format!("Language version mismatch: {e}")))?;

        parser.parse(content, None).ok_or_else(|| {
            AnalyzerError::Internal("tree-sitter returned None (timeout or cancellation)".into())
        })
    }

    /// The native `tree_sitter::Language` for Python.
    #[must_use]
    pub fn ts_language() -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }
}

impl Default for CodeParser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Syntax diagnostics
// ---------------------------------------------------------------------------

/// Location and description of a syntax error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxDiagnostic {
    /// 1-based line.
    pub line: usize,
    /// 1-based column (in bytes).
    pub column: usize,
    pub detail: String,
}

impl std::fmt::Display for SyntaxDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "syntax error at line {}, column {}: {}",
            self.line, self.column, self.detail
        )
    }
}

/// Longest snippet of offending text quoted in a diagnostic.
const MAX_SNIPPET_CHARS: usize = 40;

/// Find the first `ERROR` or `MISSING` node in document order.
pub fn first_syntax_error(root: Node<'_>, source: &[u8]) -> Option<SyntaxDiagnostic> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_missing() {
            return Some(diagnostic_at(node, format!("missing `{}`", node.kind())));
        }
        if node.is_error() {
            let text = node.utf8_text(source).unwrap_or_default();
            let snippet = first_line_snippet(text);
            let detail = if snippet.is_empty() {
                "invalid syntax".to_string()
            } else {
                format!("unexpected `{snippet}`")
            };
            return Some(diagnostic_at(node, detail));
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

// ---------------------------------------------------------------------------
// Constructs the grammar accepts but Python 3 does not
// ---------------------------------------------------------------------------

/// Find the first construct, in document order, that parses cleanly but is
/// not valid Python 3.
pub fn first_invalid_construct(root: Node<'_>, source: &[u8]) -> Option<SyntaxDiagnostic> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let problem = match node.kind() {
            "print_statement" => Some((node, "missing parentheses in call to `print`".to_string())),
            "exec_statement" => Some((node, "missing parentheses in call to `exec`".to_string())),
            "parameters" | "lambda_parameters" => misordered_parameter(node),
            "argument_list" => misordered_argument(node),
            "delete_statement" => node
                .named_children(&mut node.walk())
                .find_map(invalid_delete_target)
                .map(|bad| {
                    let text = first_line_snippet(bad.utf8_text(source).unwrap_or_default());
                    (bad, format!("cannot delete `{text}`"))
                }),
            "augmented_assignment" => node
                .child_by_field_name("left")
                .filter(|left| !matches!(left.kind(), "identifier" | "attribute" | "subscript"))
                .map(|left| (left, "illegal target for augmented assignment".to_string())),
            _ => None,
        };
        if let Some((at, detail)) = problem {
            return Some(diagnostic_at(at, detail));
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

/// A plain positional parameter after a defaulted one, before any `*`.
fn misordered_parameter(params: Node<'_>) -> Option<(Node<'_>, String)> {
    let mut seen_default = false;
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            "default_parameter" | "typed_default_parameter" => seen_default = true,
            "identifier" | "tuple_pattern" => {
                if seen_default {
                    return Some((param, "non-default parameter follows default parameter".into()));
                }
            }
            "typed_parameter" => match param.named_child(0) {
                Some(inner) if inner.kind() == "identifier" => {
                    if seen_default {
                        return Some((
                            param,
                            "non-default parameter follows default parameter".into(),
                        ));
                    }
                }
                // `*args: T` / `**kw: T`
                _ => return None,
            },
            "keyword_separator" | "list_splat_pattern" | "dictionary_splat_pattern" => return None,
            _ => {}
        }
    }
    None
}

/// Call arguments out of order: positional after keyword, or `*x` / positional
/// after `**x`.
fn misordered_argument(args: Node<'_>) -> Option<(Node<'_>, String)> {
    let mut seen_keyword = false;
    let mut seen_dict_splat = false;
    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        let detail = match arg.kind() {
            "keyword_argument" => {
                seen_keyword = true;
                None
            }
            "dictionary_splat" => {
                seen_dict_splat = true;
                None
            }
            "comment" => None,
            "list_splat" if seen_dict_splat => {
                Some("iterable argument unpacking follows keyword argument unpacking")
            }
            "list_splat" => None,
            _ if seen_dict_splat => Some("positional argument follows keyword argument unpacking"),
            _ if seen_keyword => Some("positional argument follows keyword argument"),
            _ => None,
        };
        if let Some(detail) = detail {
            return Some((arg, detail.to_string()));
        }
    }
    None
}

/// First sub-target of a `del` that is not a name, attribute, or subscript.
fn invalid_delete_target(target: Node<'_>) -> Option<Node<'_>> {
    match target.kind() {
        "identifier" | "attribute" | "subscript" | "comment" => None,
        "tuple" | "list" | "expression_list" | "parenthesized_expression" => {
            let mut cursor = target.walk();
            let children: Vec<Node<'_>> = target.named_children(&mut cursor).collect();
            children.into_iter().find_map(invalid_delete_target)
        }
        _ => Some(target),
    }
}

fn diagnostic_at(node: Node<'_>, detail: String) -> SyntaxDiagnostic {
    let pos = node.start_position();
    SyntaxDiagnostic {
        line: pos.row + 1,
        column: pos.column + 1,
        detail,
    }
}

fn first_line_snippet(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() > MAX_SNIPPET_CHARS {
        let truncated: String = line.chars().take(MAX_SNIPPET_CHARS).collect();
        format!("{truncated}...")
    } else {
        line.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn parse_python_returns_valid_tree() {
        let parser = CodeParser::new();
        let source = r#"
import os

class Greeter:
    def __init__(self, name):
        self.name = name

def greet(name):
    return f"Hello, {name}!"
"#;
        let tree = parser.parse(source).unwrap();
        let root = tree.root_node();
        assert_eq!(root.kind(), "module");
        assert!(!root.has_error());
        assert!(root.child_count() > 0);
    }

    #[test]
    fn parse_empty_source_returns_tree() {
        let parser = CodeParser::new();
        let tree = parser.parse("").unwrap();
        assert_eq!(tree.root_node().kind(), "module");
    }

    #[test]
    fn parse_rejects_unclosed_parameter_list() {
        let parser = CodeParser::new();
        let err = parser.parse("def broken(:\n    pass\n").unwrap_err();
        match err {
            AnalyzerError::Parse(msg) => {
                assert!(msg.starts_with("syntax error at line 1"), "got: {msg}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test_case("print \"hello\"\n", "missing parentheses in call to `print`" ; "py2 print")]
    #[test_case("exec \"x = 1\"\n", "missing parentheses in call to `exec`" ; "py2 exec")]
    #[test_case("def f(a=1, b):\n    pass\n", "non-default parameter follows default parameter" ; "default before plain")]
    #[test_case("def f(a=1, b: int):\n    pass\n", "non-default parameter follows default parameter" ; "default before typed")]
    #[test_case("g = lambda a=1, b: a\n", "non-default parameter follows default parameter" ; "lambda")]
    #[test_case("f(**a, *b)\n", "iterable argument unpacking follows keyword argument unpacking" ; "star after double star")]
    #[test_case("f(**a, b)\n", "positional argument follows keyword argument unpacking" ; "positional after double star")]
    #[test_case("f(a=1, b)\n", "positional argument follows keyword argument" ; "positional after keyword")]
    #[test_case("del f()\n", "cannot delete `f()`" ; "delete call")]
    #[test_case("del a, (b, g())\n", "cannot delete `g()`" ; "delete nested call")]
    #[test_case("(a, b) += 1\n", "illegal target for augmented assignment" ; "tuple augmented target")]
    fn parse_rejects_python3_invalid_constructs(source: &str, detail: &str) {
        let err = CodeParser::new().parse(source).unwrap_err();
        match err {
            AnalyzerError::Parse(msg) => {
                assert!(msg.starts_with("syntax error at line 1"), "got: {msg}");
                assert!(msg.ends_with(detail), "got: {msg}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test_case("print(\"hello\")\n" ; "print call")]
    #[test_case("exec(\"x = 1\")\n" ; "exec call")]
    #[test_case("def f(a, b=1, *args, c, d=2, **kw):\n    pass\n" ; "keyword only without default")]
    #[test_case("def f(a, /, b=1, *, c):\n    pass\n" ; "separators")]
    #[test_case("f(a, *b, c=1, *d, **e)\n" ; "star after keyword")]
    #[test_case("f(**a, b=1)\n" ; "keyword after double star")]
    #[test_case("class A(Base, metaclass=Meta):\n    pass\n" ; "class keywords")]
    #[test_case("del a, b.c, d[0], (e, f)\n" ; "delete targets")]
    #[test_case("x += 1\nobj.attr -= 2\nitems[0] *= 3\n" ; "augmented targets")]
    fn parse_accepts_valid_python3(source: &str) {
        assert!(CodeParser::new().parse(source).is_ok(), "rejected: {source:?}");
    }

    #[test]
    fn diagnostic_reports_later_line() {
        let parser = CodeParser::new();
        let source = "x = 1\ny = 2\ndef f(:\n    pass\n";
        let err = parser.parse(source).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 3"), "got: {msg}");
    }

    #[test]
    fn lenient_parse_keeps_error_nodes() {
        let parser = CodeParser::new();
        let tree = parser.parse_lenient("def broken(:\n").unwrap();
        assert!(tree.root_node().has_error());
    }

    #[test]
    fn first_syntax_error_none_for_valid_tree() {
        let parser = CodeParser::new();
        let source = "def ok():\n    return 1\n";
        let tree = parser.parse_lenient(source).unwrap();
        assert!(first_syntax_error(tree.root_node(), source.as_bytes()).is_none());
    }

    #[test]
    fn diagnostic_display_format() {
        let d = SyntaxDiagnostic {
            line: 4,
            column: 2,
            detail: "unexpected `)`".into(),
        };
        assert_eq!(d.to_string(), "syntax error at line 4, column 2: unexpected `)`");
    }

    #[test]
    fn long_snippets_are_truncated() {
        let long = "x".repeat(100);
        let snippet = first_line_snippet(&long);
        assert_eq!(snippet.chars().count(), MAX_SNIPPET_CHARS + 3);
        assert!(snippet.ends_with("..."));
    }
}
