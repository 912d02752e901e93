//! Live collections kept current by the change feed.
//!
//! [`Reconciler`] is the synchronous merge engine; [`LiveQuery`] wires one
//! reconciler to a snapshot query and a feed subscription.

mod change_event;
mod live_query;
mod reconciler;

pub use change_event::{ChangeEvent, ChangeKind, ReconciliationWarning};
pub use live_query::{LiveQuery, LiveScope, SyncOutcome};
pub use reconciler::{ApplyOutcome, Reconciler, ReconcilerState};
