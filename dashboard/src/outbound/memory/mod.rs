//! In-process adapters.
//!
//! [`InMemoryEntityStore`] keeps rows per table and doubles as the change
//! feed: every successful mutation is fanned out to the subscribers whose
//! coarse filter matches, in mutation order.

mod blob_store;
mod entity_store;

pub use blob_store::InMemoryBlobStore;
pub use entity_store::InMemoryEntityStore;
