use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reckon_shared::FilingKind;

/// Where a filing sits in its lifecycle. `pending` means a submission
/// saga owns it; `published` and `errored` are terminal until the user
/// moves it back to draft.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilingState {
    #[default]
    Draft,
    Pending,
    Published,
    Errored,
}

/// A filing configuration owned by one user. The `due` date doubles as
/// the obligation match key: the saga submits against the open
/// obligation whose due date is exactly this string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilingRecord {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub kind: FilingKind,
    pub label: String,
    pub due: String,
    #[serde(default)]
    pub state: FilingState,
}

/// The outcome of the most recent submission attempt, with the captured
/// per-step log. Written win or lose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilingStatus {
    pub time: DateTime<Utc>,
    pub success: bool,
    pub log: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_serializes_lowercase() {
        let record = FilingRecord {
            uid: "u1".into(),
            company: Some("12874000".into()),
            kind: FilingKind::Vat,
            label: "VAT Q1 2026".into(),
            due: "2026-05-07".into(),
            state: FilingState::Errored,
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["state"], "errored");
        assert_eq!(v["kind"], "vat");
    }

    #[test]
    fn missing_state_defaults_to_draft() {
        let record: FilingRecord = serde_json::from_value(serde_json::json!({
            "uid": "u1",
            "kind": "vat",
            "label": "VAT Q1",
            "due": "2026-05-07",
        }))
        .unwrap();
        assert_eq!(record.state, FilingState::Draft);
    }
}
