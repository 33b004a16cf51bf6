// src/policy.rs

//! HPC submission policy.
//!
//! Decides, per task, whether downstream compute jobs are submitted
//! automatically or left for a human. The decision is a pure function of
//! three signals and is recomputed on every call.

use crate::model::ProjectDocument;
use crate::types::ManualSubmit;

/// Aggregates the user, document and realm signals for one decision point.
///
/// Precedence:
/// 1. `user_manual_submit == Manual` forces manual.
/// 2. `doc_auto_submit == false` forces manual.
/// 3. `realm_supports_auto == false` forces manual.
/// 4. Otherwise submission is automatic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpcSubmissionPolicy {
    user_manual_submit: ManualSubmit,
    doc_auto_submit: bool,
    realm_supports_auto: bool,
}

impl Default for HpcSubmissionPolicy {
    fn default() -> Self {
        Self {
            user_manual_submit: ManualSubmit::Unset,
            doc_auto_submit: true,
            realm_supports_auto: false,
        }
    }
}

impl HpcSubmissionPolicy {
    pub fn new(
        user_manual_submit: ManualSubmit,
        doc_auto_submit: bool,
        realm_supports_auto: bool,
    ) -> Self {
        Self {
            user_manual_submit,
            doc_auto_submit,
            realm_supports_auto,
        }
    }

    /// Build a policy from a parsed document plus the session and realm
    /// signals. The document's `auto_submit` default has already been applied.
    pub fn for_document(
        doc: &ProjectDocument,
        user_manual_submit: ManualSubmit,
        realm_supports_auto: bool,
    ) -> Self {
        Self::new(user_manual_submit, doc.auto_submit, realm_supports_auto)
    }

    pub fn user_manual_submit(&self) -> ManualSubmit {
        self.user_manual_submit
    }

    pub fn set_user_manual_submit(&mut self, value: ManualSubmit) {
        self.user_manual_submit = value;
    }

    pub fn doc_auto_submit(&self) -> bool {
        self.doc_auto_submit
    }

    pub fn set_doc_auto_submit(&mut self, value: bool) {
        self.doc_auto_submit = value;
    }

    pub fn realm_supports_auto(&self) -> bool {
        self.realm_supports_auto
    }

    pub fn set_realm_supports_auto(&mut self, value: bool) {
        self.realm_supports_auto = value;
    }

    /// `true` when jobs may be submitted automatically, `false` for manual.
    pub fn should_auto_submit(&self) -> bool {
        if self.user_manual_submit == ManualSubmit::Manual {
            return false;
        }
        if !self.doc_auto_submit {
            return false;
        }
        if !self.realm_supports_auto {
            return false;
        }
        true
    }
}
