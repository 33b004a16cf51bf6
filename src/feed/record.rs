// src/feed/record.rs

use serde::Deserialize;
use serde_json::Value;

use super::{ChangeEvent, FeedItem, SeqToken};

/// Wire shape of one change record: `{seq, id, doc, deleted}`.
///
/// `sequence` / `document` are accepted as aliases.
#[derive(Debug, Deserialize)]
struct RawChangeRecord {
    #[serde(alias = "sequence")]
    seq: String,

    id: String,

    #[serde(default, alias = "document")]
    doc: Option<Value>,

    #[serde(default)]
    deleted: bool,
}

/// Decode one record. Failures become [`FeedItem::Malformed`], carrying the
/// sequence token when it can still be recovered.
pub fn parse_record(line: &str) -> FeedItem {
    match serde_json::from_str::<RawChangeRecord>(line) {
        Ok(raw) if raw.seq.is_empty() => FeedItem::Malformed {
            sequence: None,
            reason: "record has an empty sequence token".to_string(),
        },
        Ok(raw) => FeedItem::Change(ChangeEvent {
            sequence: SeqToken::new(raw.seq),
            document_id: raw.id,
            document: raw.doc.unwrap_or(Value::Null),
            deleted: raw.deleted,
        }),
        Err(err) => FeedItem::Malformed {
            sequence: recover_sequence(line),
            reason: err.to_string(),
        },
    }
}

fn recover_sequence(line: &str) -> Option<SeqToken> {
    let value: Value = serde_json::from_str(line).ok()?;
    let seq = value.get("seq").or_else(|| value.get("sequence"))?.as_str()?;
    (!seq.is_empty()).then(|| SeqToken::new(seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_record() {
        let item = parse_record(r#"{"seq":"0001","id":"P1","doc":{"project_id":"P1"}}"#);
        match item {
            FeedItem::Change(ev) => {
                assert_eq!(ev.sequence, SeqToken::new("0001"));
                assert_eq!(ev.document_id, "P1");
                assert_eq!(ev.document["project_id"], "P1");
                assert!(!ev.deleted);
            }
            other => panic!("expected change, got {other:?}"),
        }
    }

    #[test]
    fn deletion_without_doc_has_null_document() {
        let item = parse_record(r#"{"sequence":"0002","id":"P1","deleted":true}"#);
        match item {
            FeedItem::Change(ev) => {
                assert!(ev.deleted);
                assert!(ev.document.is_null());
            }
            other => panic!("expected change, got {other:?}"),
        }
    }

    #[test]
    fn malformed_record_keeps_recoverable_sequence() {
        let item = parse_record(r#"{"seq":"0003","doc":{}}"#);
        match item {
            FeedItem::Malformed { sequence, reason } => {
                assert_eq!(sequence, Some(SeqToken::new("0003")));
                assert!(reason.contains("id"));
            }
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn garbage_is_malformed_without_sequence() {
        assert!(matches!(
            parse_record("not json at all"),
            FeedItem::Malformed { sequence: None, .. }
        ));
    }
}
