use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Semantic trigger attached to a change event by the dispatcher.
///
/// This is a classification label, never stored on the document itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    ProjectChange,
    FlowcellReady,
    DeliveryReady,
}

impl EventType {
    pub const ALL: [EventType; 3] = [
        EventType::ProjectChange,
        EventType::FlowcellReady,
        EventType::DeliveryReady,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ProjectChange => "project_change",
            EventType::FlowcellReady => "flowcell_ready",
            EventType::DeliveryReady => "delivery_ready",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "project_change" => Ok(EventType::ProjectChange),
            "flowcell_ready" => Ok(EventType::FlowcellReady),
            "delivery_ready" => Ok(EventType::DeliveryReady),
            other => Err(format!("unknown event type: {other}")),
        }
    }
}

/// User-level override for HPC submission.
///
/// - `Manual`: the user forced manual submission.
/// - `Allow`: the user explicitly permitted automatic submission.
/// - `Unset`: no override was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManualSubmit {
    Manual,
    Allow,
    #[default]
    Unset,
}

impl From<Option<bool>> for ManualSubmit {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => ManualSubmit::Manual,
            Some(false) => ManualSubmit::Allow,
            None => ManualSubmit::Unset,
        }
    }
}

/// Where the durable change-feed cursor is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CursorStorageMode {
    /// Store the cursor in a file (atomic write-then-rename).
    #[default]
    File,
    /// Keep the cursor in memory only (lost on restart).
    Memory,
}

/// Parse a short duration string such as `"500ms"`, `"5s"`, `"10m"`, `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
