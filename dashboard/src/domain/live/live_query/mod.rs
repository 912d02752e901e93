//! Snapshot-plus-feed driver for one reconciled collection.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use super::change_event::ReconciliationWarning;
use super::reconciler::{ApplyOutcome, Reconciler, ReconcilerState};
use crate::domain::Error;
use crate::domain::access_policy::Predicate;
use crate::domain::ports::{
    ChangeFeed, Direction, EntityStore, FeedMessage, FeedPoll, FeedRequest, FeedSubscription,
    Query, RawChangeEvent, Row,
};
use crate::domain::record::LiveRecord;

/// Everything that identifies one live collection.
///
/// The store query is derived from the predicate, so rows the snapshot
/// returns and rows the feed delivers are judged by the same filters.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveScope {
    predicate: Predicate,
    query: Query,
    feed: FeedRequest,
}

impl LiveScope {
    /// Scope reading every row the predicate admits.
    #[must_use]
    pub fn new(predicate: Predicate, feed: FeedRequest) -> Self {
        let query = predicate.to_query();
        Self {
            predicate,
            query,
            feed,
        }
    }

    /// Ask the store to pre-sort the snapshot.
    #[must_use]
    pub fn ordered_by(mut self, column: &str, direction: Direction) -> Self {
        self.query = self.query.order_by(column, direction);
        self
    }

    /// Predicate applied to every row.
    #[must_use]
    pub const fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Snapshot query.
    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Feed subscription request.
    #[must_use]
    pub const fn feed(&self) -> &FeedRequest {
        &self.feed
    }
}

/// Result of processing feed traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// One event was applied.
    Applied(ApplyOutcome),
    /// The feed reported a disconnect; the collection was re-snapshotted
    /// on a fresh subscription.
    Resynced,
    /// No subscription is held: the query is not open, or the adapter
    /// ended the feed. Records stay as last reconciled until the next
    /// [`LiveQuery::open`].
    Closed,
}

/// A live, access-filtered collection owned by one consumer.
///
/// `open` subscribes to the feed before reading the snapshot, so no change
/// falls between the two; events that arrive meanwhile queue in the
/// subscription and merge by id once the snapshot is in. Changing the scope
/// drops the old subscription first. Dropping the query releases it.
///
/// A [`FeedMessage::Disconnected`] triggers exactly one resubscribe and
/// re-snapshot. A channel the adapter closes is released without a resync.
pub struct LiveQuery<R: LiveRecord> {
    store: Arc<dyn EntityStore>,
    feed: Arc<dyn ChangeFeed>,
    scope: Option<LiveScope>,
    reconciler: Reconciler<R>,
    subscription: Option<FeedSubscription>,
    loading: bool,
    error: Option<Error>,
    session_end: Option<watch::Receiver<bool>>,
}

impl<R: LiveRecord> LiveQuery<R> {
    /// Closed query bound to the session's store and feed.
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, feed: Arc<dyn ChangeFeed>) -> Self {
        Self {
            store,
            feed,
            scope: None,
            reconciler: Reconciler::new(Predicate::deny_all(R::KIND)),
            subscription: None,
            loading: false,
            error: None,
            session_end: None,
        }
    }

    /// Close the query once `signal` turns true. Sessions hand this to
    /// every query they create so sign-out stops live updates.
    #[must_use]
    pub(crate) fn ending_with(mut self, signal: watch::Receiver<bool>) -> Self {
        self.session_end = Some(signal);
        self
    }

    /// Load `scope` and keep it live.
    ///
    /// Reopening the current scope refreshes the snapshot on the existing
    /// subscription. On failure the collection is left empty with
    /// [`LiveQuery::error`] set, and the error is returned.
    pub async fn open(&mut self, scope: LiveScope) -> Result<(), Error> {
        if self.session_ended() {
            self.close();
            return Err(Error::unauthorized("the session has ended"));
        }
        let same_scope = self.scope.as_ref() == Some(&scope) && self.subscription.is_some();
        if !same_scope {
            self.release();
        }
        self.reconciler.reset(scope.predicate.clone());
        self.error = None;

        if scope.predicate.is_deny_all() {
            debug!(kind = %R::KIND, "live query scope matches nothing");
            self.scope = Some(scope);
            self.reconciler.seed(Vec::new());
            self.loading = false;
            return Ok(());
        }

        self.scope = Some(scope);
        self.loading = true;
        if !same_scope {
            self.subscribe().await?;
        }
        self.snapshot().await
    }

    /// Apply every message already queued, without waiting.
    ///
    /// Returns how many applied events changed the collection.
    pub async fn drain_pending(&mut self) -> Result<usize, Error> {
        if self.session_ended() {
            self.close();
            return Ok(0);
        }
        let mut changed = 0;
        loop {
            let Some(subscription) = self.subscription.as_mut() else {
                return Ok(changed);
            };
            match subscription.poll() {
                FeedPoll::Message(FeedMessage::Change(raw)) => {
                    if self.apply_raw(raw).changed() {
                        changed += 1;
                    }
                }
                FeedPoll::Message(FeedMessage::Disconnected { reason }) => {
                    warn!(kind = %R::KIND, %reason, "change feed disconnected");
                    self.resync().await?;
                    return Ok(changed);
                }
                FeedPoll::Closed => {
                    self.feed_ended();
                    return Ok(changed);
                }
                FeedPoll::Empty => return Ok(changed),
            }
        }
    }

    /// Wait for the next feed message and process it.
    ///
    /// Returns [`SyncOutcome::Closed`] as soon as the owning session ends.
    pub async fn next_change(&mut self) -> Result<SyncOutcome, Error> {
        if self.session_ended() {
            self.close();
            return Ok(SyncOutcome::Closed);
        }
        let Some(subscription) = self.subscription.as_mut() else {
            return Ok(SyncOutcome::Closed);
        };
        let next = tokio::select! {
            message = subscription.recv() => Some(message),
            () = wait_for_end(self.session_end.as_mut()) => None,
        };
        let Some(received) = next else {
            debug!(kind = %R::KIND, "session ended; closing live query");
            self.close();
            return Ok(SyncOutcome::Closed);
        };
        match received {
            Some(FeedMessage::Change(raw)) => Ok(SyncOutcome::Applied(self.apply_raw(raw))),
            Some(FeedMessage::Disconnected { reason }) => {
                warn!(kind = %R::KIND, %reason, "change feed disconnected");
                self.resync().await?;
                Ok(SyncOutcome::Resynced)
            }
            None => {
                self.feed_ended();
                Ok(SyncOutcome::Closed)
            }
        }
    }

    /// Merge a row this session just wrote.
    pub fn apply_local(&mut self, row: Row) -> ApplyOutcome {
        let outcome = self.reconciler.upsert_local(row);
        log_dropped::<R>(&outcome);
        outcome
    }

    /// Remove a record this session just deleted.
    pub fn remove_local(&mut self, id: Uuid) -> ApplyOutcome {
        self.reconciler.remove_local(id)
    }

    /// Release the subscription and drop the collection.
    pub fn close(&mut self) {
        self.release();
        self.reconciler.close();
        self.scope = None;
        self.loading = false;
    }

    /// Records in collection order.
    #[must_use]
    pub fn records(&self) -> Vec<R> {
        self.reconciler.records()
    }

    /// Borrowing iterator over the records.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.reconciler.iter()
    }

    /// Record with `id`, if present.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&R> {
        self.reconciler.get(id)
    }

    /// Whether a snapshot is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Last load failure.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Reconciler lifecycle state.
    #[must_use]
    pub fn state(&self) -> ReconcilerState {
        self.reconciler.state()
    }

    /// Current scope.
    #[must_use]
    pub const fn scope(&self) -> Option<&LiveScope> {
        self.scope.as_ref()
    }

    /// Whether a feed subscription is held.
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    fn session_ended(&self) -> bool {
        self.session_end
            .as_ref()
            .is_some_and(|signal| *signal.borrow())
    }

    fn feed_ended(&mut self) {
        warn!(kind = %R::KIND, "change feed closed; live updates stopped");
        self.release();
    }

    async fn resync(&mut self) -> Result<(), Error> {
        let Some(scope) = self.scope.clone() else {
            return Ok(());
        };
        self.release();
        self.reconciler.reset(scope.predicate.clone());
        self.loading = true;
        self.subscribe().await?;
        self.snapshot().await
    }

    async fn subscribe(&mut self) -> Result<(), Error> {
        let Some(request) = self.scope.as_ref().map(|scope| scope.feed.clone()) else {
            return Ok(());
        };
        match self.feed.subscribe(&request).await {
            Ok(subscription) => {
                debug!(channel = subscription.channel(), "live query subscribed");
                self.subscription = Some(subscription);
                Ok(())
            }
            Err(err) => Err(self.fail(err.into())),
        }
    }

    async fn snapshot(&mut self) -> Result<(), Error> {
        let Some(query) = self.scope.as_ref().map(|scope| scope.query.clone()) else {
            return Ok(());
        };
        match self.store.select(&query).await {
            Ok(rows) => {
                let count = rows.len();
                for warning in self.reconciler.seed(rows) {
                    log_warning::<R>(&warning);
                }
                self.loading = false;
                debug!(kind = %R::KIND, rows = count, "live query seeded");
                Ok(())
            }
            Err(err) => Err(self.fail(err.into())),
        }
    }

    fn apply_raw(&mut self, raw: RawChangeEvent) -> ApplyOutcome {
        let outcome = self.reconciler.apply_raw(raw);
        log_dropped::<R>(&outcome);
        outcome
    }

    /// Record a load failure: release the feed, empty the collection and
    /// keep `error` for the UI. Returns the error for propagation.
    pub(crate) fn fail(&mut self, error: Error) -> Error {
        warn!(kind = %R::KIND, error = %error, "live query failed to load");
        self.release();
        let predicate = self
            .scope
            .as_ref()
            .map_or_else(|| Predicate::deny_all(R::KIND), |scope| scope.predicate.clone());
        self.reconciler.reset(predicate);
        self.loading = false;
        self.error = Some(error.clone());
        error
    }

    fn release(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            debug!(channel = subscription.channel(), "live query released subscription");
        }
    }
}

/// Resolves once the session signals its end. A dropped sender means the
/// session went away without signing out, which never ends the query.
async fn wait_for_end(signal: Option<&mut watch::Receiver<bool>>) {
    if let Some(receiver) = signal
        && receiver.wait_for(|ended| *ended).await.is_ok()
    {
        return;
    }
    std::future::pending::<()>().await;
}

fn log_dropped<R: LiveRecord>(outcome: &ApplyOutcome) {
    if let ApplyOutcome::Dropped(warning) = outcome {
        log_warning::<R>(warning);
    }
}

fn log_warning<R: LiveRecord>(warning: &ReconciliationWarning) {
    warn!(kind = %R::KIND, %warning, "dropped change event");
}
