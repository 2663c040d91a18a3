//! Source parsing: build a Python syntax tree and extract structural facts.

pub mod extractor;
pub mod parser;

pub use extractor::{extract_structure, StructureExtractor};
pub use parser::{CodeParser, SyntaxDiagnostic};
