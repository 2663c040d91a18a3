//! Structure extraction: walk a Python syntax tree into [`StructuralFacts`].
//!
//! The walk is a single pre-order pass over an explicit stack. Each entry
//! carries a [`Placement`] computed from its parent, so whether a definition
//! sits directly in the module is known without touching the tree and
//! without recursion depth limits on deeply nested sources.
//!
//! Policy:
//! - functions are recorded only at module level (a decorator wrapper does not
//!   count as nesting);
//! - classes are recorded at any depth, with the functions declared directly
//!   in their body as methods;
//! - imports are recorded at any depth, one fact per imported name.

use tree_sitter::Node;

use super::parser::CodeParser;
use crate::error::Result;
use crate::types::{ClassFact, FunctionFact, ImportFact, StructuralFacts};

/// Where a node sits relative to the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Direct child of the module (possibly through a decorator wrapper).
    TopLevel,
    Nested,
}

/// Extracts [`StructuralFacts`] from Python source.
pub struct StructureExtractor<'a> {
    source: &'a [u8],
}

impl<'a> StructureExtractor<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
        }
    }

    /// Walk an already-parsed module.
    pub fn extract(&self, root: Node<'_>) -> StructuralFacts {
        let mut facts = StructuralFacts::default();

        let mut stack: Vec<(Node<'_>, Placement)> = Vec::new();
        push_children(&mut stack, root, Placement::TopLevel);

        while let Some((node, placement)) = stack.pop() {
            match node.kind() {
                "decorated_definition" => {
                    // Decorators wrap a definition without nesting it.
                    push_children(&mut stack, node, placement);
                    continue;
                }
                "function_definition" => {
                    if placement == Placement::TopLevel {
                        if let Some(func) = self.function_fact(node) {
                            facts.functions.push(func);
                        }
                    }
                }
                "class_definition" => {
                    if let Some(class) = self.class_fact(node) {
                        facts.classes.push(class);
                    }
                }
                "import_statement" | "future_import_statement" => {
                    let module = (node.kind() == "future_import_statement").then_some("__future__");
                    self.collect_imports(node, module, &mut facts.imports);
                    continue;
                }
                "import_from_statement" => {
                    let module = node
                        .child_by_field_name("module_name")
                        .map(|m| self.text(m));
                    self.collect_from_imports(node, module.as_deref(), &mut facts.imports);
                    continue;
                }
                _ => {}
            }
            push_children(&mut stack, node, Placement::Nested);
        }

        facts
    }

    // -- Functions and classes ----------------------------------------------

    fn function_fact(&self, node: Node<'_>) -> Option<FunctionFact> {
        let name = self.text(node.child_by_field_name("name")?);
        let args = node
            .child_by_field_name("parameters")
            .map(|p| self.positional_params(p))
            .unwrap_or_default();
        Some(FunctionFact {
            name,
            args,
            line: line_of(node),
        })
    }

    fn class_fact(&self, node: Node<'_>) -> Option<ClassFact> {
        let name = self.text(node.child_by_field_name("name")?);
        let mut methods = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for stmt in body.named_children(&mut cursor) {
                let def = match stmt.kind() {
                    "function_definition" => Some(stmt),
                    "decorated_definition" => stmt
                        .child_by_field_name("definition")
                        .filter(|d| d.kind() == "function_definition"),
                    _ => None,
                };
                if let Some(method) = def.and_then(|d| self.function_fact(d)) {
                    methods.push(method);
                }
            }
        }
        Some(ClassFact {
            name,
            methods,
            line: line_of(node),
        })
    }

    /// Positional parameter names: everything before `*`, `*args`, or
    /// `**kwargs`, including positional-only ones before `/`.
    fn positional_params(&self, params: Node<'_>) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let name = match param.kind() {
                "identifier" => Some(param),
                "default_parameter" | "typed_default_parameter" => param
                    .child_by_field_name("name")
                    .filter(|n| n.kind() == "identifier"),
                "typed_parameter" => match param.named_child(0) {
                    Some(inner) if inner.kind() == "identifier" => Some(inner),
                    // `*args: T` / `**kw: T`
                    _ => break,
                },
                "positional_separator" | "comment" => None,
                "keyword_separator" | "list_splat_pattern" | "dictionary_splat_pattern" => break,
                _ => None,
            };
            if let Some(n) = name {
                names.push(self.text(n));
            }
        }
        names
    }

    // -- Imports ------------------------------------------------------------

    fn collect_imports(&self, node: Node<'_>, module: Option<&str>, out: &mut Vec<ImportFact>) {
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let imported = self.imported_name(name);
            out.push(match module {
                Some(m) => qualify(m, &imported),
                None => imported,
            });
        }
    }

    fn collect_from_imports(
        &self,
        node: Node<'_>,
        module: Option<&str>,
        out: &mut Vec<ImportFact>,
    ) {
        let module = module.unwrap_or_default();
        let mut cursor = node.walk();
        let wildcard = node
            .named_children(&mut cursor)
            .any(|c| c.kind() == "wildcard_import");
        if wildcard {
            out.push(qualify(module, "*"));
            return;
        }
        self.collect_imports(node, Some(module), out);
    }

    /// `a.b as c` → `a.b`.
    fn imported_name(&self, node: Node<'_>) -> String {
        match node.kind() {
            "aliased_import" => node
                .child_by_field_name("name")
                .map(|n| self.text(n))
                .unwrap_or_default(),
            _ => self.text(node),
        }
    }

    fn text(&self, node: Node<'_>) -> String {
        node.utf8_text(self.source).unwrap_or_default().to_string()
    }
}

/// Parse `source` and extract its structure.
pub fn extract_structure(source: &str) -> Result<StructuralFacts> {
    let tree = CodeParser::new().parse(source)?;
    Ok(StructureExtractor::new(source).extract(tree.root_node()))
}

/// Push `node`'s children so they pop in source order.
fn push_children<'t>(stack: &mut Vec<(Node<'t>, Placement)>, node: Node<'t>, placement: Placement) {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    stack.extend(children.into_iter().rev().map(|c| (c, placement)));
}

fn line_of(node: Node<'_>) -> u32 {
    u32::try_from(node.start_position().row + 1).unwrap_or(u32::MAX)
}

/// Join a module path and an imported symbol. Relative prefixes made only of
/// dots (`from . import x`) join without an extra separator.
fn qualify(module: &str, symbol: &str) -> String {
    if module.is_empty() || module.ends_with('.') {
        format!("{module}{symbol}")
    } else {
        format!("{module}.{symbol}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
