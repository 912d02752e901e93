//! Merge engine for one live collection.
//!
//! The reconciler owns an ordered, id-unique collection of records and
//! folds change events into it. It performs no I/O; the owning
//! [`LiveQuery`](super::LiveQuery) feeds it snapshots and events.
//!
//! ```text
//! Uninitialized --seed--> Live --close--> Closed
//!       ^                  |
//!       +------reset-------+
//! ```
//!
//! Events that arrive before the first snapshot are buffered and replayed
//! after seeding. Every row is re-checked against the predicate because the
//! feed's own filtering is coarse.

use std::cmp::Ordering;
use std::marker::PhantomData;

use uuid::Uuid;

use super::change_event::{ChangeEvent, ChangeKind, ReconciliationWarning};
use crate::domain::access_policy::Predicate;
use crate::domain::ports::{RawChangeEvent, Row};
use crate::domain::record::{LiveRecord, from_row, merge_rows, row_id};

/// Lifecycle of a reconciled collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcilerState {
    /// Waiting for the first snapshot. Events are buffered.
    Uninitialized,
    /// Snapshot applied; events mutate the collection.
    Live,
    /// Torn down; everything is ignored.
    Closed,
}

/// What applying one event did to the collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new record was added.
    Inserted,
    /// An existing record was merged in place or moved.
    Updated,
    /// A record left the collection.
    Removed,
    /// Nothing changed.
    Ignored,
    /// Held until the snapshot arrives.
    Buffered,
    /// The event was malformed and discarded.
    Dropped(ReconciliationWarning),
}

impl ApplyOutcome {
    /// Whether the visible collection changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        matches!(self, Self::Inserted | Self::Updated | Self::Removed)
    }
}

#[derive(Debug, Clone)]
struct Entry<R> {
    row: Row,
    record: R,
}

/// Ordered, id-unique collection kept current by change events.
#[derive(Debug)]
pub struct Reconciler<R: LiveRecord> {
    predicate: Predicate,
    state: ReconcilerState,
    entries: Vec<Entry<R>>,
    pending: Vec<ChangeEvent>,
    _record: PhantomData<fn() -> R>,
}

impl<R: LiveRecord> Reconciler<R> {
    /// Fresh, uninitialised collection filtered by `predicate`.
    #[must_use]
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            state: ReconcilerState::Uninitialized,
            entries: Vec::new(),
            pending: Vec::new(),
            _record: PhantomData,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ReconcilerState {
        self.state
    }

    /// Predicate every record satisfies.
    #[must_use]
    pub const fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Records in collection order.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.entries.iter().map(|entry| &entry.record)
    }

    /// Owned copy of the collection.
    #[must_use]
    pub fn records(&self) -> Vec<R> {
        self.iter().cloned().collect()
    }

    /// Record with `id`, if present.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&R> {
        self.position(id)
            .and_then(|index| self.entries.get(index))
            .map(|entry| &entry.record)
    }

    /// Number of records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of events waiting for the snapshot.
    #[must_use]
    pub const fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Replace the collection with a snapshot and go live.
    ///
    /// Rows outside the predicate are skipped; duplicate ids keep the last
    /// row. Buffered events are replayed afterwards. Returns warnings for
    /// rows and events that were dropped.
    pub fn seed(&mut self, rows: Vec<Row>) -> Vec<ReconciliationWarning> {
        let mut warnings = Vec::new();
        if self.state == ReconcilerState::Closed {
            return warnings;
        }

        self.entries.clear();
        for row in rows {
            if !self.predicate.matches(&row) {
                continue;
            }
            let Some(id) = row_id(&row) else {
                warnings.push(ReconciliationWarning::MissingId {
                    kind: ChangeKind::Insert,
                });
                continue;
            };
            match decode::<R>(id, row) {
                Ok(entry) => {
                    self.entries.retain(|existing| existing.record.record_id() != id);
                    self.entries.push(entry);
                }
                Err(warning) => warnings.push(warning),
            }
        }
        self.entries
            .sort_by(|left, right| left.record.collection_order(&right.record));
        self.state = ReconcilerState::Live;

        for event in std::mem::take(&mut self.pending) {
            if let ApplyOutcome::Dropped(warning) = self.apply(event) {
                warnings.push(warning);
            }
        }
        warnings
    }

    /// Parse and apply a raw feed event.
    pub fn apply_raw(&mut self, raw: RawChangeEvent) -> ApplyOutcome {
        match ChangeEvent::try_from(raw) {
            Ok(event) => self.apply(event),
            Err(warning) => ApplyOutcome::Dropped(warning),
        }
    }

    /// Apply one event in feed order.
    pub fn apply(&mut self, event: ChangeEvent) -> ApplyOutcome {
        match self.state {
            ReconcilerState::Closed => ApplyOutcome::Ignored,
            ReconcilerState::Uninitialized => {
                self.pending.push(event);
                ApplyOutcome::Buffered
            }
            ReconcilerState::Live => match event.kind {
                // An insert for a known id is a replay of a write already
                // merged locally.
                ChangeKind::Insert | ChangeKind::Update => self.upsert(event.id, event.row),
                ChangeKind::Delete => self.remove(event.id),
            },
        }
    }

    /// Merge a row written by this session. Only acts while live.
    pub fn upsert_local(&mut self, row: Row) -> ApplyOutcome {
        if self.state != ReconcilerState::Live {
            return ApplyOutcome::Ignored;
        }
        match ChangeEvent::new(ChangeKind::Update, row) {
            Ok(event) => self.apply(event),
            Err(warning) => ApplyOutcome::Dropped(warning),
        }
    }

    /// Remove a record deleted by this session. Only acts while live.
    pub fn remove_local(&mut self, id: Uuid) -> ApplyOutcome {
        if self.state != ReconcilerState::Live {
            return ApplyOutcome::Ignored;
        }
        self.remove(id)
    }

    /// Stop accepting events and drop the collection.
    pub fn close(&mut self) {
        self.state = ReconcilerState::Closed;
        self.entries.clear();
        self.pending.clear();
    }

    /// Start over for a new scope.
    pub fn reset(&mut self, predicate: Predicate) {
        self.predicate = predicate;
        self.state = ReconcilerState::Uninitialized;
        self.entries.clear();
        self.pending.clear();
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.record.record_id() == id)
    }

    fn upsert(&mut self, id: Uuid, row: Row) -> ApplyOutcome {
        let Some((index, mut merged)) = self
            .position(id)
            .and_then(|index| self.entries.get(index).map(|entry| (index, entry.row.clone())))
        else {
            return self.insert(id, row);
        };

        merge_rows(&mut merged, row);
        if !self.predicate.matches(&merged) {
            self.entries.remove(index);
            return ApplyOutcome::Removed;
        }
        let entry = match decode::<R>(id, merged) {
            Ok(entry) => entry,
            Err(warning) => return ApplyOutcome::Dropped(warning),
        };

        if self.fits_at(index, &entry.record) {
            if let Some(slot) = self.entries.get_mut(index) {
                *slot = entry;
            }
        } else {
            self.entries.remove(index);
            self.insert_sorted(entry);
        }
        ApplyOutcome::Updated
    }

    fn insert(&mut self, id: Uuid, row: Row) -> ApplyOutcome {
        if !self.predicate.matches(&row) {
            return ApplyOutcome::Ignored;
        }
        match decode::<R>(id, row) {
            Ok(entry) => {
                self.insert_sorted(entry);
                ApplyOutcome::Inserted
            }
            Err(warning) => ApplyOutcome::Dropped(warning),
        }
    }

    fn remove(&mut self, id: Uuid) -> ApplyOutcome {
        let Some(index) = self.position(id) else {
            return ApplyOutcome::Ignored;
        };
        self.entries.remove(index);
        ApplyOutcome::Removed
    }

    /// New records go ahead of existing records that compare equal.
    fn insert_sorted(&mut self, entry: Entry<R>) {
        let index = self
            .entries
            .partition_point(|existing| existing.record.collection_order(&entry.record) == Ordering::Less);
        self.entries.insert(index, entry);
    }

    fn fits_at(&self, index: usize, record: &R) -> bool {
        let after_previous = index
            .checked_sub(1)
            .and_then(|previous| self.entries.get(previous))
            .is_none_or(|previous| previous.record.collection_order(record) != Ordering::Greater);
        let before_next = self
            .entries
            .get(index + 1)
            .is_none_or(|next| record.collection_order(&next.record) != Ordering::Greater);
        after_previous && before_next
    }
}

fn decode<R: LiveRecord>(id: Uuid, row: Row) -> Result<Entry<R>, ReconciliationWarning> {
    let record = from_row::<R>(row.clone()).map_err(|err| ReconciliationWarning::Undecodable {
        id,
        message: err.to_string(),
    })?;
    Ok(Entry { row, record })
}
