//! Row API adapter speaking PostgREST query syntax.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::{RestClient, status_message};
use crate::domain::ports::{
    Direction, EntityStore, EntityStoreError, Filter, FilterOp, Query, Row, Table,
};

const REST_PREFIX: &str = "rest/v1";

/// Entity store backed by the hosted row API.
#[derive(Debug, Clone)]
pub struct RestEntityStore {
    client: RestClient,
}

impl RestEntityStore {
    /// Adapter sharing `client`'s session.
    #[must_use]
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    async fn send(
        &self,
        method: Method,
        table: Table,
        params: Vec<(String, String)>,
        body: Option<&Row>,
    ) -> Result<Vec<Row>, EntityStoreError> {
        let url = self.client.endpoint(&[REST_PREFIX, table.as_str()]);
        let mut request = self
            .client
            .authorize(self.client.http().request(method.clone(), url))
            .query(&params)
            .header(reqwest::header::ACCEPT, "application/json");
        if method != Method::GET {
            request = request.header("Prefer", "return=representation");
        }
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, bytes.as_ref()));
        }
        let rows = parse_rows(bytes.as_ref())?;
        debug!(%method, %table, rows = rows.len(), "row API call completed");
        Ok(rows)
    }
}

#[async_trait]
impl EntityStore for RestEntityStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, EntityStoreError> {
        self.send(Method::GET, query.table, query_params(query), None)
            .await
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row, EntityStoreError> {
        self.send(Method::POST, table, Vec::new(), Some(&row))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EntityStoreError::decode("insert returned no row"))
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<Vec<Row>, EntityStoreError> {
        self.send(Method::PATCH, table, filter_params(filters), Some(&patch))
            .await
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<Vec<Row>, EntityStoreError> {
        self.send(Method::DELETE, table, filter_params(filters), None)
            .await
    }
}

fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_owned(), "*".to_owned())];
    params.extend(filter_params(&query.filters));
    if !query.order.is_empty() {
        let order = query
            .order
            .iter()
            .map(|clause| {
                let direction = match clause.direction {
                    Direction::Ascending => "asc",
                    Direction::Descending => "desc",
                };
                format!("{}.{direction}", clause.column)
            })
            .collect::<Vec<_>>()
            .join(",");
        params.push(("order".to_owned(), order));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_owned(), limit.to_string()));
    }
    params
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(filter_param).collect()
}

fn filter_param(filter: &Filter) -> (String, String) {
    let operand = match &filter.value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    let operator = match (filter.op, filter.value.is_null()) {
        (FilterOp::Eq, false) => "eq",
        (FilterOp::Eq, true) => "is",
        (FilterOp::Neq, false) => "neq",
        (FilterOp::Neq, true) => "not.is",
    };
    (filter.column.clone(), format!("{operator}.{operand}"))
}

fn parse_rows(body: &[u8]) -> Result<Vec<Row>, EntityStoreError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(body)
        .map_err(|err| EntityStoreError::decode(format!("invalid row payload: {err}")))
}

fn map_transport_error(error: reqwest::Error) -> EntityStoreError {
    EntityStoreError::connection(error.to_string())
}

fn map_status_error(status: StatusCode, body: &[u8]) -> EntityStoreError {
    let message = status_message(status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => EntityStoreError::rejected(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            EntityStoreError::connection(message)
        }
        _ if status.is_server_error() => EntityStoreError::connection(message),
        _ => EntityStoreError::query(message),
    }
}
