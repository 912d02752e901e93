//! Port for the hosted backend's realtime change feed.
//!
//! A subscription is a single-consumer channel: messages arrive in feed
//! order and the subscriber processes them one at a time. Dropping the
//! [`FeedSubscription`] releases it; adapters notice the closed channel and
//! stop delivering.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::define_port_error;
use super::entity_store::{Filter, Row, Table};

/// What to subscribe to: one table, optionally narrowed by one equality
/// filter. The narrowing is coarse; subscribers re-check every row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRequest {
    /// Table whose changes are wanted.
    pub table: Table,
    /// Optional equality filter applied by the feed.
    pub filter: Option<Filter>,
}

impl FeedRequest {
    /// Subscribe to every change on `table`.
    #[must_use]
    pub fn table(table: Table) -> Self {
        Self {
            table,
            filter: None,
        }
    }

    /// Narrow the feed with an equality filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Channel name used for logging and by adapters that name channels.
    #[must_use]
    pub fn channel_name(&self) -> String {
        self.filter.as_ref().map_or_else(
            || self.table.as_str().to_owned(),
            |filter| {
                let value = filter
                    .value
                    .as_str()
                    .map_or_else(|| filter.value.to_string(), str::to_owned);
                format!("{}:{}={}", self.table, filter.column, value)
            },
        )
    }
}

/// Change payload exactly as the feed delivers it.
///
/// Nothing here is trusted: the event type may be unknown and either row may
/// be missing. Parsing happens in the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChangeEvent {
    /// `INSERT`, `UPDATE` or `DELETE` for well-formed events.
    pub event_type: String,
    /// Row after the change (inserts and updates).
    pub new: Option<Row>,
    /// Row before the change (deletes; updates when the table replicates it).
    pub old: Option<Row>,
    /// Position hint from the feed. Not monotonic across reconnects.
    pub sequence_hint: Option<u64>,
}

/// Message delivered through a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// A row changed.
    Change(RawChangeEvent),
    /// The feed lost its connection; changes may have been missed.
    Disconnected {
        /// Adapter supplied reason.
        reason: String,
    },
}

/// Live subscription handle. Owned by exactly one consumer.
#[derive(Debug)]
pub struct FeedSubscription {
    channel: String,
    receiver: mpsc::UnboundedReceiver<FeedMessage>,
}

impl FeedSubscription {
    /// Wrap the receiving half of an adapter's channel.
    #[must_use]
    pub fn new(channel: impl Into<String>, receiver: mpsc::UnboundedReceiver<FeedMessage>) -> Self {
        Self {
            channel: channel.into(),
            receiver,
        }
    }

    /// Channel name.
    #[must_use]
    pub const fn channel(&self) -> &str {
        self.channel.as_str()
    }

    /// Wait for the next message. `None` once the adapter closed the channel.
    pub async fn recv(&mut self) -> Option<FeedMessage> {
        self.receiver.recv().await
    }

    /// Take the next message if one is already queued.
    pub fn poll(&mut self) -> FeedPoll {
        match self.receiver.try_recv() {
            Ok(message) => FeedPoll::Message(message),
            Err(mpsc::error::TryRecvError::Empty) => FeedPoll::Empty,
            Err(mpsc::error::TryRecvError::Disconnected) => FeedPoll::Closed,
        }
    }
}

/// Result of a non-blocking [`FeedSubscription::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum FeedPoll {
    /// A queued message.
    Message(FeedMessage),
    /// Nothing queued right now.
    Empty,
    /// The adapter closed the channel and everything was drained.
    Closed,
}

define_port_error! {
    /// Errors raised by change feed adapters.
    pub enum ChangeFeedError {
        /// The feed could not be reached.
        Connection { message: String } =>
            backend_transient, "change feed connection failed: {message}",
        /// The feed refused the subscription.
        Rejected { message: String } =>
            backend_permanent, "change feed rejected the subscription: {message}",
    }
}

/// Port for subscribing to row changes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a subscription.
    async fn subscribe(&self, request: &FeedRequest) -> Result<FeedSubscription, ChangeFeedError>;
}

/// Fixture feed whose subscriptions never deliver anything.
///
/// The sending half is dropped immediately, so `recv` resolves to `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureChangeFeed;

#[async_trait]
impl ChangeFeed for FixtureChangeFeed {
    async fn subscribe(&self, request: &FeedRequest) -> Result<FeedSubscription, ChangeFeedError> {
        let (_sender, receiver) = mpsc::unbounded_channel();
        Ok(FeedSubscription::new(request.channel_name(), receiver))
    }
}
