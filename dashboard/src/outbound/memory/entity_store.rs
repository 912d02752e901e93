//! In-process entity store and change feed.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use mockable::{Clock, DefaultClock};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{
    ChangeFeed, ChangeFeedError, Direction, EntityStore, EntityStoreError, FeedMessage,
    FeedRequest, FeedSubscription, Filter, OrderBy, Query, RawChangeEvent, Row, Table,
};

struct Subscriber {
    request: FeedRequest,
    sender: mpsc::UnboundedSender<FeedMessage>,
}

impl Subscriber {
    fn wants(&self, table: Table, rows: &[Option<&Row>]) -> bool {
        if self.request.table != table {
            return false;
        }
        self.request
            .filter
            .as_ref()
            .is_none_or(|filter| rows.iter().flatten().any(|row| filter.matches(row)))
    }
}

#[derive(Default)]
struct State {
    tables: HashMap<Table, Vec<Row>>,
    subscribers: Vec<Subscriber>,
    sequence: u64,
}

impl State {
    fn publish(&mut self, table: Table, event_type: &str, new: Option<Row>, old: Option<Row>) {
        self.sequence += 1;
        let event = RawChangeEvent {
            event_type: event_type.to_owned(),
            new,
            old,
            sequence_hint: Some(self.sequence),
        };
        let rows = [event.new.as_ref(), event.old.as_ref()];
        self.subscribers.retain(|subscriber| {
            if !subscriber.wants(table, &rows) {
                return !subscriber.sender.is_closed();
            }
            subscriber
                .sender
                .send(FeedMessage::Change(event.clone()))
                .is_ok()
        });
    }
}

/// Rows held in memory, keyed by table, with a built-in change feed.
///
/// Inserts fill in a missing `id` and the `created_at`/`updated_at` stamps.
/// Clones share the same state.
#[derive(Clone)]
pub struct InMemoryEntityStore {
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new(Arc::new(DefaultClock))
    }
}

impl InMemoryEntityStore {
    /// Empty store stamping rows with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            clock,
        }
    }

    /// Load rows without notifying subscribers.
    pub fn seed(&self, table: Table, rows: impl IntoIterator<Item = Row>) {
        self.lock().tables.entry(table).or_default().extend(rows);
    }

    /// Every row currently stored in `table`, in insertion order.
    #[must_use]
    pub fn rows(&self, table: Table) -> Vec<Row> {
        self.lock().tables.get(&table).cloned().unwrap_or_default()
    }

    /// Number of open subscriptions. Released subscriptions are pruned first.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state
            .subscribers
            .retain(|subscriber| !subscriber.sender.is_closed());
        state.subscribers.len()
    }

    /// Tell every subscriber the feed dropped. Subscriptions stay open.
    pub fn disconnect_all(&self, reason: &str) {
        let mut state = self.lock();
        state.subscribers.retain(|subscriber| {
            subscriber
                .sender
                .send(FeedMessage::Disconnected {
                    reason: reason.to_owned(),
                })
                .is_ok()
        });
        debug!(subscribers = state.subscribers.len(), reason, "feed disconnected");
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stamp_new(&self, row: &mut Row) -> Result<(), EntityStoreError> {
        let now = serde_json::to_value(self.clock.utc())
            .map_err(|err| EntityStoreError::query(err.to_string()))?;
        if !row.get("id").is_some_and(Value::is_string) {
            row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        for column in ["created_at", "updated_at"] {
            if row.get(column).is_none_or(Value::is_null) {
                row.insert(column.into(), now.clone());
            }
        }
        Ok(())
    }
}

fn matches_all(filters: &[Filter], row: &Row) -> bool {
    filters.iter().all(|filter| filter.matches(row))
}

fn compare_rows(order: &[OrderBy], left: &Row, right: &Row) -> Ordering {
    order
        .iter()
        .map(|clause| {
            let l = left.get(&clause.column).filter(|v| !v.is_null());
            let r = right.get(&clause.column).filter(|v| !v.is_null());
            match (l, r, clause.direction) {
                (None, None, _) => Ordering::Equal,
                // Ascending puts nulls last, descending puts them first.
                (None, Some(_), Direction::Ascending) | (Some(_), None, Direction::Descending) => {
                    Ordering::Greater
                }
                (Some(_), None, Direction::Ascending) | (None, Some(_), Direction::Descending) => {
                    Ordering::Less
                }
                (Some(l), Some(r), Direction::Ascending) => compare_values(l, r),
                (Some(l), Some(r), Direction::Descending) => compare_values(r, l),
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
        (Value::Number(l), Value::Number(r)) => l
            .as_f64()
            .zip(r.as_f64())
            .and_then(|(l, r)| l.partial_cmp(&r))
            .unwrap_or(Ordering::Equal),
        (Value::String(l), Value::String(r)) => l.cmp(r),
        _ => left.to_string().cmp(&right.to_string()),
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, EntityStoreError> {
        let state = self.lock();
        let mut rows: Vec<Row> = state
            .tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(&query.filters, row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|left, right| compare_rows(&query.order, left, right));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, mut row: Row) -> Result<Row, EntityStoreError> {
        self.stamp_new(&mut row)?;
        let mut state = self.lock();
        let id = row.get("id").cloned();
        let rows = state.tables.entry(table).or_default();
        if rows.iter().any(|existing| existing.get("id") == id.as_ref()) {
            return Err(EntityStoreError::query(format!(
                "duplicate key value violates unique constraint on {table}.id"
            )));
        }
        rows.push(row.clone());
        state.publish(table, "INSERT", Some(row.clone()), None);
        Ok(row)
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<Vec<Row>, EntityStoreError> {
        let mut state = self.lock();
        let mut changes = Vec::new();
        if let Some(rows) = state.tables.get_mut(&table) {
            for row in rows.iter_mut().filter(|row| matches_all(filters, row)) {
                let old = row.clone();
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                changes.push((old, row.clone()));
            }
        }
        let mut updated = Vec::with_capacity(changes.len());
        for (old, new) in changes {
            state.publish(table, "UPDATE", Some(new.clone()), Some(old));
            updated.push(new);
        }
        Ok(updated)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<Vec<Row>, EntityStoreError> {
        let mut state = self.lock();
        let removed: Vec<Row> = state.tables.get_mut(&table).map_or_else(Vec::new, |rows| {
            let (gone, kept) = std::mem::take(rows)
                .into_iter()
                .partition(|row| matches_all(filters, row));
            *rows = kept;
            gone
        });
        for row in &removed {
            state.publish(table, "DELETE", None, Some(row.clone()));
        }
        Ok(removed)
    }
}

#[async_trait]
impl ChangeFeed for InMemoryEntityStore {
    async fn subscribe(&self, request: &FeedRequest) -> Result<FeedSubscription, ChangeFeedError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.lock();
        state.subscribers.push(Subscriber {
            request: request.clone(),
            sender,
        });
        debug!(channel = %request.channel_name(), "feed subscription opened");
        Ok(FeedSubscription::new(request.channel_name(), receiver))
    }
}
