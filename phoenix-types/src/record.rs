//! Application records as Phoenix sees them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An application-level entity — a student, a settings bundle, a category
/// list. Phoenix treats the payload as schemaless JSON; only the type tag
/// and the identifying fields matter to replication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Logical type tag ("student", "settings", ...).
    pub record_type: String,
    /// Stable id, when the caller has one. The mapper synthesizes a
    /// surrogate when absent.
    pub id: Option<String>,
    /// The full entity payload.
    pub data: Value,
}

impl Record {
    pub fn new(record_type: impl Into<String>, id: Option<String>, data: Value) -> Self {
        Self {
            record_type: record_type.into(),
            id,
            data,
        }
    }

    /// Natural email-like key, when the payload carries one.
    pub fn email(&self) -> Option<&str> {
        self.data.get("email").and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// Domain-specific number (admission number for students).
    pub fn admission_no(&self) -> Option<String> {
        match self.data.get("admissionNo") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}
