//! Analysis capabilities and the registry that resolves them by kind.

pub mod registry;

pub use registry::{AnalysisHandler, CapabilityRegistry, NotImplementedHandler, StructureHandler};
