// src/model/technology.rs

use serde_json::{Map, Value};

/// Sequencing technology of a sample. Closed set.
#[derive(Debug, Clone, PartialEq)]
pub enum Technology {
    /// SmartSeq 3.
    Ss3 { barcode_set: String },
    /// 10x Chromium gene expression.
    GeneExpression { metadata: Map<String, Value> },
    /// 10x Chromium V(D)J.
    Vdj {
        metadata: Map<String, Value>,
        enrichment_types: Vec<String>,
    },
    /// 10x Chromium single-cell multiome.
    Multiome { metadata: Map<String, Value> },
}

impl Technology {
    pub fn is_chromium(&self) -> bool {
        !matches!(self, Technology::Ss3 { .. })
    }

    pub fn is_multiome(&self) -> bool {
        matches!(self, Technology::Multiome { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Technology::Ss3 { .. } => "SS3",
            Technology::GeneExpression { .. } => "GeneExpression",
            Technology::Vdj { .. } => "VDJ",
            Technology::Multiome { .. } => "Multiome",
        }
    }
}
