// src/model/document.rs

use serde::Deserialize;
use serde_json::Value;

use crate::errors::Result;

/// Raw shape of a project document as stored in the change feed.
///
/// Only the fields the dispatcher needs are named; everything else stays in
/// the raw [`Value`] handed to handlers.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawProjectDocument {
    #[serde(default)]
    project_id: Option<String>,

    #[serde(default)]
    project_name: Option<String>,

    #[serde(default)]
    details: RawDetails,

    #[serde(default)]
    auto_submit: Option<bool>,

    #[serde(default)]
    flowcell_ready: Option<bool>,

    #[serde(default)]
    delivery_ready: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawDetails {
    #[serde(default)]
    library_construction_method: Option<String>,
}

/// Typed view of a project document with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDocument {
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    /// Declared task type; used as the branch key.
    pub library_construction_method: Option<String>,
    /// Defaults to `true` when the document does not say otherwise.
    pub auto_submit: bool,
    pub flowcell_ready: bool,
    pub delivery_ready: bool,
    /// The full document as received.
    pub raw: Value,
}

impl ProjectDocument {
    /// Parse a raw JSON document. Missing optional fields take their
    /// defaults here so downstream code never re-checks for absence.
    pub fn parse(raw: Value) -> Result<Self> {
        let parsed: RawProjectDocument = serde_json::from_value(raw.clone())?;

        Ok(Self {
            project_id: parsed.project_id,
            project_name: parsed.project_name,
            library_construction_method: parsed
                .details
                .library_construction_method
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            auto_submit: parsed.auto_submit.unwrap_or(true),
            flowcell_ready: parsed.flowcell_ready.unwrap_or(false),
            delivery_ready: parsed.delivery_ready.unwrap_or(false),
            raw,
        })
    }

    /// Identifier used in logs; falls back to `<unknown>`.
    pub fn display_id(&self) -> &str {
        self.project_id.as_deref().unwrap_or("<unknown>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn applies_defaults_for_missing_fields() {
        let doc = ProjectDocument::parse(json!({ "project_id": "P1" })).unwrap();
        assert_eq!(doc.project_id.as_deref(), Some("P1"));
        assert!(doc.auto_submit);
        assert!(!doc.flowcell_ready);
        assert!(!doc.delivery_ready);
        assert_eq!(doc.library_construction_method, None);
    }

    #[test]
    fn reads_branch_key_and_markers() {
        let doc = ProjectDocument::parse(json!({
            "project_id": "P2",
            "details": { "library_construction_method": " SmartSeq 3 " },
            "auto_submit": false,
            "flowcell_ready": true,
            "extra": { "kept": 1 }
        }))
        .unwrap();

        assert_eq!(doc.library_construction_method.as_deref(), Some("SmartSeq 3"));
        assert!(!doc.auto_submit);
        assert!(doc.flowcell_ready);
        assert_eq!(doc.raw["extra"]["kept"], 1);
    }

    #[test]
    fn blank_method_is_treated_as_absent() {
        let doc = ProjectDocument::parse(json!({
            "details": { "library_construction_method": "   " }
        }))
        .unwrap();
        assert_eq!(doc.library_construction_method, None);
        assert_eq!(doc.display_id(), "<unknown>");
    }

    #[test]
    fn wrongly_typed_field_is_a_parse_error() {
        let res = ProjectDocument::parse(json!({ "auto_submit": "yes" }));
        assert!(res.is_err());
    }
}
