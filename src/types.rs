//! Core domain types for codescope.
//!
//! The JSON shapes here are the wire format: submission bodies are decoded
//! into [`AnalysisRequest`], and every job ends with exactly one
//! [`JobMessage`] pushed to the stream.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AnalysisKind
// ---------------------------------------------------------------------------

/// Analyses a client can request via the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    /// Functions, classes with their methods, and imports.
    Structure,
    /// Placeholder, no handler yet.
    Complexity,
    /// Placeholder, no handler yet.
    Dependencies,
}

impl AnalysisKind {
    /// All kinds, in wire order.
    pub const ALL: [AnalysisKind; 3] = [Self::Structure, Self::Complexity, Self::Dependencies];

    /// Exact wire tag. Submission validation only accepts these spellings.
    pub fn from_wire(tag: &str) -> Option<Self> {
        match tag {
            "structure" => Some(Self::Structure),
            "complexity" => Some(Self::Complexity),
            "dependencies" => Some(Self::Dependencies),
            _ => None,
        }
    }

    /// Parse from a loose string (case-insensitive, singular accepted).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "structure" | "struct" => Some(Self::Structure),
            "complexity" => Some(Self::Complexity),
            "dependencies" | "dependency" | "deps" => Some(Self::Dependencies),
            _ => None,
        }
    }

    /// Canonical wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Complexity => "complexity",
            Self::Dependencies => "dependencies",
        }
    }

    /// Human-facing name used in messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Structure => "Structure",
            Self::Complexity => "Complexity",
            Self::Dependencies => "Dependency",
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AnalysisRequest
// ---------------------------------------------------------------------------

/// A validated submission.
///
/// The source text is owned and never mutated once the request exists; the
/// worker hands out `&str` borrows of it to the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub source_text: String,
    pub kind: AnalysisKind,
}

// ---------------------------------------------------------------------------
// Structural facts
// ---------------------------------------------------------------------------

/// A function (or method) definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionFact {
    pub name: String,
    /// Positional parameter names in declaration order.
    pub args: Vec<String>,
    /// 1-based line of the `def` (or `async`) keyword.
    pub line: u32,
}

/// A class definition with the methods declared directly in its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFact {
    pub name: String,
    pub methods: Vec<FunctionFact>,
    pub line: u32,
}

/// A qualified import name: `module` or `module.symbol`, aliases dropped.
pub type ImportFact = String;

/// Everything the structure analysis extracts from one source text, each list
/// in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralFacts {
    pub functions: Vec<FunctionFact>,
    pub classes: Vec<ClassFact>,
    pub imports: Vec<ImportFact>,
}

// ---------------------------------------------------------------------------
// JobMessage
// ---------------------------------------------------------------------------

/// The terminal message of a job. Exactly one is produced per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum JobMessage {
    Result(StructuralFacts),
    Error(String),
}

impl JobMessage {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Serialize to the JSON carried in a push frame.
    pub fn to_json(&self) -> String {
        // Serializing plain strings and vectors cannot fail; fall back to a
        // hand-built error frame rather than unwrapping.
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({ "type": "error", "data": format!("serialization failed: {e}") })
                .to_string()
        })
    }
}

// ---------------------------------------------------------------------------
// Job identity and lifecycle
// ---------------------------------------------------------------------------

/// Opaque job token handed back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// `Created → Running → {Completed | Failed}`. No retries, no cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Created,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("structure", Some(AnalysisKind::Structure) ; "structure")]
    #[test_case("complexity", Some(AnalysisKind::Complexity) ; "complexity")]
    #[test_case("dependencies", Some(AnalysisKind::Dependencies) ; "dependencies")]
    #[test_case("Structure", None ; "wire tags are case sensitive")]
    #[test_case("deps", None ; "no aliases on the wire")]
    #[test_case("", None ; "empty")]
    fn from_wire_is_exact(tag: &str, expected: Option<AnalysisKind>) {
        assert_eq!(AnalysisKind::from_wire(tag), expected);
    }

    #[test_case("  STRUCTURE ", AnalysisKind::Structure ; "padded uppercase")]
    #[test_case("deps", AnalysisKind::Dependencies ; "deps alias")]
    #[test_case("dependency", AnalysisKind::Dependencies ; "singular")]
    fn from_str_loose_accepts_aliases(input: &str, expected: AnalysisKind) {
        assert_eq!(AnalysisKind::from_str_loose(input), Some(expected));
    }

    #[test]
    fn kind_as_str_roundtrips_through_wire() {
        for kind in AnalysisKind::ALL {
            assert_eq!(AnalysisKind::from_wire(kind.as_str()), Some(kind));
            assert_eq!(format!("{kind}"), kind.as_str());
        }
    }

    #[test]
    fn result_message_shape() {
        let msg = JobMessage::Result(StructuralFacts {
            functions: vec![FunctionFact {
                name: "greet".into(),
                args: vec!["name".into()],
                line: 1,
            }],
            classes: vec![],
            imports: vec!["os".into()],
        });
        let value: serde_json::Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(value["type"], "result");
        assert_eq!(value["data"]["functions"][0]["name"], "greet");
        assert_eq!(value["data"]["functions"][0]["args"][0], "name");
        assert_eq!(value["data"]["functions"][0]["line"], 1);
        assert_eq!(value["data"]["imports"][0], "os");
        assert!(value["data"]["classes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn error_message_shape() {
        let msg = JobMessage::Error("syntax error at line 1, column 9: unexpected `:`".into());
        assert!(msg.is_error());
        let value: serde_json::Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(
            value["data"],
            "syntax error at line 1, column 9: unexpected `:`"
        );
    }

    #[test]
    fn job_ids_are_unique() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn job_id_serializes_as_plain_string() {
        let id = JobId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }

    #[test]
    fn terminal_states() {
        assert!(!JobState::Created.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }
}
