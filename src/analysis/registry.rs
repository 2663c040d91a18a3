//! Capability registry: maps each [`AnalysisKind`] to the handler that runs it.
//!
//! Only `structure` has a real implementation. The other kinds resolve to
//! [`NotImplementedHandler`], which fails every job with a typed
//! [`AnalyzerError::NotImplemented`] so the client gets a normal error message
//! over the stream instead of a crashed worker.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AnalyzerError, Result};
use crate::indexer::extract_structure;
use crate::types::{AnalysisKind, StructuralFacts};

/// Something that can analyze one source text.
///
/// Handlers run on the blocking thread pool, so they may be CPU-heavy but
/// must not assume an async context.
pub trait AnalysisHandler: Send + Sync {
    fn analyze(&self, source: &str) -> Result<StructuralFacts>;
}

/// Tree-sitter backed structure analysis.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructureHandler;

impl AnalysisHandler for StructureHandler {
    fn analyze(&self, source: &str) -> Result<StructuralFacts> {
        extract_structure(source)
    }
}

/// Placeholder for analyses that are recognised but not built yet.
#[derive(Debug, Clone, Copy)]
pub struct NotImplementedHandler {
    kind: AnalysisKind,
}

impl NotImplementedHandler {
    pub fn new(kind: AnalysisKind) -> Self {
        Self { kind }
    }
}

impl AnalysisHandler for NotImplementedHandler {
    fn analyze(&self, _source: &str) -> Result<StructuralFacts> {
        Err(AnalyzerError::NotImplemented(self.kind))
    }
}

/// Kind → handler table.
#[derive(Clone)]
pub struct CapabilityRegistry {
    handlers: HashMap<AnalysisKind, Arc<dyn AnalysisHandler>>,
}

impl CapabilityRegistry {
    /// Registry with the built-in bindings: structure analysis plus stubs.
    pub fn with_defaults() -> Self {
        let mut handlers: HashMap<AnalysisKind, Arc<dyn AnalysisHandler>> = HashMap::new();
        for kind in AnalysisKind::ALL {
            let handler: Arc<dyn AnalysisHandler> = match kind {
                AnalysisKind::Structure => Arc::new(StructureHandler),
                other => Arc::new(NotImplementedHandler::new(other)),
            };
            handlers.insert(kind, handler);
        }
        Self { handlers }
    }

    /// Replace the handler bound to `kind`.
    pub fn register(&mut self, kind: AnalysisKind, handler: Arc<dyn AnalysisHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Handler for `kind`. Every kind has a binding, so this never fails.
    pub fn resolve(&self, kind: AnalysisKind) -> Arc<dyn AnalysisHandler> {
        self.handlers
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Arc::new(NotImplementedHandler::new(kind)))
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.handlers.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("CapabilityRegistry")
            .field("kinds", &kinds)
            .finish()
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
    fn structure_resolves_to_parser() {
        let registry = CapabilityRegistry::with_defaults();
        let facts = registry
            .resolve(AnalysisKind::Structure)
            .analyze("import os\n\ndef main(argv):\n    pass\n")
            .unwrap();
        assert_eq!(facts.imports, vec!["os"]);
        assert_eq!(facts.functions[0].name, "main");
    }

    #[test_case(AnalysisKind::Complexity, "Complexity analysis not implemented" ; "complexity")]
    #[test_case(AnalysisKind::Dependencies, "Dependency analysis not implemented" ; "dependencies")]
    fn placeholder_kinds_fail_with_not_implemented(kind: AnalysisKind, message: &str) {
        let registry = CapabilityRegistry::with_defaults();
        let err = registry.resolve(kind).analyze("x = 1").unwrap_err();
        assert!(matches!(err, AnalyzerError::NotImplemented(k) if k == kind));
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn register_replaces_binding() {
        struct Fixed;
        impl AnalysisHandler for Fixed {
            fn analyze(&self, _source: &str) -> Result<StructuralFacts> {
                Ok(StructuralFacts {
                    imports: vec!["fixed".into()],
                    ..Default::default()
                })
            }
        }

        let mut registry = CapabilityRegistry::with_defaults();
        registry.register(AnalysisKind::Complexity, Arc::new(Fixed));
        let facts = registry
            .resolve(AnalysisKind::Complexity)
            .analyze("")
            .unwrap();
        assert_eq!(facts.imports, vec!["fixed"]);
    }

    #[test]
    fn debug_lists_bound_kinds() {
        let dbg = format!("{:?}", CapabilityRegistry::default());
        assert!(dbg.contains("complexity"));
        assert!(dbg.contains("dependencies"));
        assert!(dbg.contains("structure"));
    }
}
