//! Helpers shared by the entity services.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::domain::access_policy::{
    AccessPolicyError, PolicyOptions, Predicate, ProjectScope, build_predicate,
};
use crate::domain::live::{LiveQuery, LiveScope};
use crate::domain::ports::{EntityStore, Filter, Query, Row};
use crate::domain::record::{EntityKind, LiveRecord, from_row, merge_rows, to_row};
use crate::domain::{Actor, CompanyId, Error, ProjectId};

pub(crate) fn policy_denied(err: &AccessPolicyError) -> Error {
    Error::forbidden(format!("access denied: {err}"))
        .with_details(json!({ "code": "role_unresolved" }))
}

pub(crate) fn predicate_for(
    actor: &Actor,
    kind: EntityKind,
    options: &PolicyOptions,
) -> Result<Predicate, Error> {
    build_predicate(actor, kind, options).map_err(|err| policy_denied(&err))
}

pub(crate) fn not_found(kind: EntityKind, id: Uuid) -> Error {
    Error::not_found(format!("{kind} {id} not found"))
        .with_details(json!({ "kind": kind.to_string(), "id": id.to_string() }))
}

pub(crate) fn forbidden(kind: EntityKind, id: Option<Uuid>) -> Error {
    let message = id.map_or_else(
        || format!("{kind} is outside your access scope"),
        |target| format!("{kind} {target} is outside your access scope"),
    );
    Error::forbidden(message).with_details(json!({ "kind": kind.to_string() }))
}

pub(crate) fn decode<T: DeserializeOwned>(row: Row) -> Result<T, Error> {
    from_row(row).map_err(|err| Error::backend_permanent(format!("unexpected row shape: {err}")))
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Row, Error> {
    to_row(value).map_err(|err| Error::internal(format!("failed to encode row: {err}")))
}

pub(crate) fn column_uuid(row: &Row, column: &str) -> Option<Uuid> {
    row.get(column)
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

pub(crate) fn id_filter(id: Uuid) -> Filter {
    Filter::eq("id", Value::String(id.to_string()))
}

/// Open `scope` on `live`, or record `scope`'s construction failure on it.
pub(crate) async fn open_live<R: LiveRecord>(
    live: &mut LiveQuery<R>,
    scope: Result<LiveScope, Error>,
) -> Result<Vec<R>, Error> {
    match scope {
        Ok(scope) => {
            live.open(scope).await?;
            Ok(live.records())
        }
        Err(err) => Err(live.fail(err)),
    }
}

/// Current row for `id`, or `NotFound`.
pub(crate) async fn fetch_existing(
    store: &dyn EntityStore,
    kind: EntityKind,
    id: Uuid,
) -> Result<Row, Error> {
    let query = Query::from(kind.table()).filter(id_filter(id)).limit(1);
    store
        .select(&query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| not_found(kind, id))
}

/// Owning company of a project, read from the store.
pub(crate) async fn resolve_project_scope(
    store: &dyn EntityStore,
    project_id: ProjectId,
) -> Result<ProjectScope, Error> {
    let row = fetch_existing(store, EntityKind::Project, *project_id.as_uuid()).await?;
    let company_id = column_uuid(&row, "client_company_id")
        .map(CompanyId::from_uuid)
        .ok_or_else(|| Error::backend_permanent("project row has no client_company_id"))?;
    Ok(ProjectScope {
        project_id,
        company_id,
    })
}

/// Check that `existing` is visible and stays visible once `patch` is
/// merged. Returns the merged row.
pub(crate) fn ensure_writable(
    predicate: &Predicate,
    existing: &Row,
    patch: &Row,
    id: Uuid,
) -> Result<Row, Error> {
    let kind = predicate.kind();
    if !predicate.matches(existing) {
        return Err(forbidden(kind, Some(id)));
    }
    let mut merged = existing.clone();
    merge_rows(&mut merged, patch.clone());
    if !predicate.matches(&merged) {
        return Err(forbidden(kind, Some(id)));
    }
    Ok(merged)
}

/// Insert `row` after checking it against `predicate`.
pub(crate) async fn insert_guarded(
    store: &dyn EntityStore,
    predicate: &Predicate,
    row: Row,
) -> Result<Row, Error> {
    if !predicate.matches(&row) {
        return Err(forbidden(predicate.kind(), None));
    }
    let stored = store.insert(predicate.kind().table(), row).await?;
    debug!(kind = %predicate.kind(), "inserted row");
    Ok(stored)
}

/// Apply `patch` to the row with `id`.
pub(crate) async fn update_row(
    store: &dyn EntityStore,
    kind: EntityKind,
    id: Uuid,
    patch: Row,
) -> Result<Row, Error> {
    store
        .update(kind.table(), &[id_filter(id)], patch)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| not_found(kind, id))
}

/// Delete the row with `id`.
pub(crate) async fn delete_row(
    store: &dyn EntityStore,
    kind: EntityKind,
    id: Uuid,
) -> Result<Row, Error> {
    store
        .delete(kind.table(), &[id_filter(id)])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| not_found(kind, id))
}

/// Stamp a timestamp column on a row.
pub(crate) fn stamp(row: &mut Row, column: &str, value: impl Serialize) {
    if let Ok(value) = serde_json::to_value(value) {
        row.insert(column.to_owned(), value);
    }
}

