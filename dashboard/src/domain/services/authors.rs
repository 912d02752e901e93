//! Profile lookups for the people behind comments and documents.

use std::collections::HashMap;

use tracing::debug;

use super::support::{decode, id_filter};
use crate::domain::entities::Profile;
use crate::domain::ports::{EntityStore, Query, Table};
use crate::domain::{Error, UserId};

/// Profiles by user id, cached for the lifetime of the owning service.
///
/// An id without a profile row is cached as absent and not fetched again.
#[derive(Debug, Default)]
pub(crate) struct AuthorDirectory {
    known: HashMap<UserId, Option<Profile>>,
}

impl AuthorDirectory {
    /// Fetch every id in `ids` that is not cached yet.
    pub(crate) async fn resolve(
        &mut self,
        store: &dyn EntityStore,
        ids: Vec<UserId>,
    ) -> Result<(), Error> {
        for id in ids {
            if self.known.contains_key(&id) {
                continue;
            }
            let query = Query::from(Table::Profiles)
                .filter(id_filter(*id.as_uuid()))
                .limit(1);
            let profile = store
                .select(&query)
                .await?
                .into_iter()
                .next()
                .map(decode::<Profile>)
                .transpose()?;
            debug!(user_id = %id, found = profile.is_some(), "resolved author profile");
            self.known.insert(id, profile);
        }
        Ok(())
    }

    /// Cached profile for `id`.
    pub(crate) fn get(&self, id: UserId) -> Option<Profile> {
        self.known.get(&id).cloned().flatten()
    }
}
