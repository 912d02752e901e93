//! Validated change events.

use std::fmt;

use uuid::Uuid;

use crate::domain::ports::{RawChangeEvent, Row};
use crate::domain::record::row_id;

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A row was created.
    Insert,
    /// A row was modified.
    Update,
    /// A row was removed.
    Delete,
}

impl ChangeKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Non-fatal problem with a change event. The event is dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconciliationWarning {
    /// The event type is not insert, update or delete.
    #[error("unknown change event type `{event_type}`")]
    UnknownKind {
        /// Event type as delivered.
        event_type: String,
    },
    /// The payload lacks the row the event kind needs.
    #[error("{kind} event carries no row")]
    MissingRow {
        /// Parsed kind.
        kind: ChangeKind,
    },
    /// The row has no usable `id`.
    #[error("{kind} event row has no valid id")]
    MissingId {
        /// Parsed kind.
        kind: ChangeKind,
    },
    /// The row did not decode into the collection's record type.
    #[error("row {id} could not be decoded: {message}")]
    Undecodable {
        /// Row id.
        id: Uuid,
        /// Decoder message.
        message: String,
    },
}

/// A change event with a known kind and a row carrying an id.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Change kind.
    pub kind: ChangeKind,
    /// Row id.
    pub id: Uuid,
    /// New row for inserts and updates, old row for deletes. Updates may
    /// carry only the changed columns.
    pub row: Row,
    /// Feed-supplied ordering hint. Informational only.
    pub sequence_hint: Option<u64>,
}

impl ChangeEvent {
    /// Event carrying a full row.
    pub fn new(kind: ChangeKind, row: Row) -> Result<Self, ReconciliationWarning> {
        let id = row_id(&row).ok_or(ReconciliationWarning::MissingId { kind })?;
        Ok(Self {
            kind,
            id,
            row,
            sequence_hint: None,
        })
    }
}

impl TryFrom<RawChangeEvent> for ChangeEvent {
    type Error = ReconciliationWarning;

    fn try_from(raw: RawChangeEvent) -> Result<Self, Self::Error> {
        let RawChangeEvent {
            event_type,
            new,
            old,
            sequence_hint,
        } = raw;
        let kind = ChangeKind::parse(&event_type)
            .ok_or(ReconciliationWarning::UnknownKind { event_type })?;
        // Deletes identify the row through `old`, or `new` when it is absent.
        let row = match kind {
            ChangeKind::Insert | ChangeKind::Update => new,
            ChangeKind::Delete => old.or(new),
        }
        .ok_or(ReconciliationWarning::MissingRow { kind })?;
        let mut event = Self::new(kind, row)?;
        event.sequence_hint = sequence_hint;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::domain::record::to_row;

    fn raw(event_type: &str, new: Option<serde_json::Value>, old: Option<serde_json::Value>) -> RawChangeEvent {
        RawChangeEvent {
            event_type: event_type.to_owned(),
            new: new.map(|v| to_row(&v).expect("object row")),
            old: old.map(|v| to_row(&v).expect("object row")),
            sequence_hint: Some(4),
        }
    }

    const ID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

    #[rstest]
    #[case("INSERT", ChangeKind::Insert)]
    #[case("update", ChangeKind::Update)]
    #[case(" Delete ", ChangeKind::Delete)]
    fn event_types_are_case_insensitive(#[case] event_type: &str, #[case] expected: ChangeKind) {
        let event = ChangeEvent::try_from(raw(
            event_type,
            Some(json!({ "id": ID })),
            Some(json!({ "id": ID })),
        ))
        .expect("valid event");
        assert_eq!(event.kind, expected);
        assert_eq!(event.sequence_hint, Some(4));
    }

    #[rstest]
    fn unknown_type_is_a_warning() {
        let err = ChangeEvent::try_from(raw("TRUNCATE", Some(json!({ "id": ID })), None))
            .expect_err("unknown kind");
        assert!(matches!(err, ReconciliationWarning::UnknownKind { .. }));
    }

    #[rstest]
    fn delete_reads_the_old_row() {
        let event = ChangeEvent::try_from(raw("DELETE", None, Some(json!({ "id": ID }))))
            .expect("valid delete");
        assert_eq!(event.id.to_string(), ID);
    }

    #[rstest]
    #[case(raw("INSERT", None, Some(json!({ "id": ID }))), ReconciliationWarning::MissingRow { kind: ChangeKind::Insert })]
    #[case(raw("UPDATE", Some(json!({ "text": "x" })), None), ReconciliationWarning::MissingId { kind: ChangeKind::Update })]
    fn malformed_payloads_are_warnings(#[case] event: RawChangeEvent, #[case] expected: ReconciliationWarning) {
        assert_eq!(ChangeEvent::try_from(event).expect_err("malformed"), expected);
    }
}
