// src/dispatch/classify.rs

use crate::errors::{Result, YggError};
use crate::model::ProjectDocument;
use crate::types::EventType;

/// Result of mapping a document state onto [`EventType`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Single(EventType),
    /// More than one trigger applies at once.
    Ambiguous(Vec<EventType>),
}

impl Classification {
    /// The single trigger, or `ClassificationAmbiguous` naming every match.
    pub fn event_type(self, doc_id: &str) -> Result<EventType> {
        match self {
            Classification::Single(t) => Ok(t),
            Classification::Ambiguous(types) => {
                let names: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
                Err(YggError::ClassificationAmbiguous {
                    doc_id: doc_id.to_string(),
                    reason: format!("document matches {}", names.join(" and ")),
                })
            }
        }
    }
}

/// Classify a document by its readiness markers.
///
/// No marker means a plain project change. Exactly one marker selects its
/// trigger. Both markers at once cannot be told apart and are ambiguous.
pub fn classify(doc: &ProjectDocument) -> Classification {
    let mut matched = Vec::with_capacity(2);
    if doc.flowcell_ready {
        matched.push(EventType::FlowcellReady);
    }
    if doc.delivery_ready {
        matched.push(EventType::DeliveryReady);
    }

    match matched.as_slice() {
        [] => Classification::Single(EventType::ProjectChange),
        [only] => Classification::Single(*only),
        _ => Classification::Ambiguous(matched),
    }
}
