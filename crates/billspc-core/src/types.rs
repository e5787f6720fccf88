//! Shared types and OpenAPI schemas.
//!
//! These are the views handed to the UI collaborator and served by the
//! HTTP layer. They are snapshots; nothing here is mutated by the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::codec::Record;
use crate::session::{RadioState, Session, WriteStatus};

/// A record as shown in the list: a name (possibly empty) and a number label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "MEW",
    "index": 151,
    "label": "NO. 151"
}))]
pub struct DisplayRecord {
    /// Display name, empty for unnamed indices.
    #[schema(example = "MEW")]
    pub name: String,

    /// Record index.
    #[schema(example = 151, minimum = 0, maximum = 151)]
    pub index: u8,

    /// Number label shown under the name.
    #[schema(example = "NO. 151")]
    pub label: String,
}

impl From<&Record> for DisplayRecord {
    fn from(record: &Record) -> Self {
        Self {
            name: record.display_name().to_string(),
            index: record.index,
            label: format!("NO. {}", record.index),
        }
    }
}

/// Which view the UI shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisplayView {
    /// Waiting for a central to subscribe.
    #[default]
    Waiting,
    /// Showing the record list.
    Data,
}

/// Everything the UI needs to render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DisplaySnapshot {
    /// Current view.
    pub view: DisplayView,

    /// Visible records in batch order.
    pub records: Vec<DisplayRecord>,

    /// When the list was last refreshed.
    pub updated_at_utc: Option<DateTime<Utc>>,
}

/// Snapshot of the session for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "phase": "subscribed",
    "radio_state": null,
    "local_name": "Bill's PC",
    "service_uuid": "d78a31fe-e14f-4f6a-a107-790ab0d58f27",
    "characteristic_uuid": "ebe6204c-c1ee-4d09-97b8-f77f360f7372",
    "subscribers": 1,
    "last_batch_len": 6,
    "last_write_status": "success",
    "writes_handled": 3
}))]
pub struct SessionStatus {
    /// Lifecycle phase name.
    #[schema(example = "advertising")]
    pub phase: String,

    /// Radio condition when the phase is `unavailable`.
    pub radio_state: Option<RadioState>,

    /// Advertised local name.
    #[schema(example = "Bill's PC")]
    pub local_name: String,

    /// Advertised service UUID.
    pub service_uuid: Uuid,

    /// Characteristic UUID.
    pub characteristic_uuid: Uuid,

    /// Number of subscribed centrals.
    #[schema(example = 1)]
    pub subscribers: usize,

    /// Records decoded from the last parsed write.
    pub last_batch_len: Option<usize>,

    /// Status returned for the last write.
    pub last_write_status: Option<WriteStatus>,

    /// Writes handled since start, including failed ones.
    pub writes_handled: u64,
}

impl SessionStatus {
    /// Build a status snapshot from a session.
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        let advertisement = session.advertisement();
        Self {
            phase: session.phase().name().to_string(),
            radio_state: session.phase().radio_fault(),
            local_name: advertisement.local_name.clone(),
            service_uuid: advertisement.service_uuid,
            characteristic_uuid: advertisement.characteristic_uuid,
            subscribers: session.subscribed_centrals().len(),
            last_batch_len: None,
            last_write_status: None,
            writes_handled: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_record_from_named_record() {
        let record = DisplayRecord::from(&Record::new(2, 150));
        assert_eq!(record.name, "MEWTWO");
        assert_eq!(record.label, "NO. 150");
    }

    #[test]
    fn test_display_record_from_unnamed_record() {
        let record = DisplayRecord::from(&Record::new(2, 0));
        assert!(record.name.is_empty());
        assert_eq!(record.label, "NO. 0");
    }

    #[test]
    fn test_snapshot_defaults_to_waiting() {
        let snapshot = DisplaySnapshot::default();
        assert_eq!(snapshot.view, DisplayView::Waiting);
        assert!(snapshot.records.is_empty());
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"view\":\"waiting\""));
    }
}
