//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod auth_session;
mod blob_store;
mod change_feed;
mod entity_store;

#[cfg(test)]
pub use auth_session::MockAuthSession;
pub use auth_session::{
    AuthSession, AuthSessionError, AuthUser, Credentials, FixtureAuthSession,
};
#[cfg(test)]
pub use blob_store::MockBlobStore;
pub use blob_store::{BlobStore, BlobStoreError, FixtureBlobStore};
#[cfg(test)]
pub use change_feed::MockChangeFeed;
pub use change_feed::{
    ChangeFeed, ChangeFeedError, FeedMessage, FeedPoll, FeedRequest, FeedSubscription,
    FixtureChangeFeed, RawChangeEvent,
};
#[cfg(test)]
pub use entity_store::MockEntityStore;
pub use entity_store::{
    Direction, EntityStore, EntityStoreError, Filter, FilterOp, FixtureEntityStore, OrderBy,
    Query, Row, Table,
};
