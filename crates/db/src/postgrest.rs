//! Client for a hosted PostgREST endpoint (the REST face of the backend-as-a-service).

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bookshelf_kernel::settings::StoreSettings;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use crate::{Collection, Filter, Row, RowStore, SelectOptions, StoreError, StoreOp};

const REST_PREFIX: &str = "rest/v1";

#[derive(Debug, Clone)]
pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl PostgrestStore {
    /// Build a client for `base_url`, authenticating with `api_key` when provided.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert(
                "apikey",
                HeaderValue::from_str(key).context("invalid store api key header value")?,
            );
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}"))
                    .context("invalid store api key header value")?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("failed to build store HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_settings(settings: &StoreSettings) -> anyhow::Result<Self> {
        Self::new(
            settings.url.clone(),
            settings.api_key.as_deref(),
            Duration::from_millis(settings.request_timeout_ms),
        )
    }

    fn url(&self, collection: &Collection) -> String {
        format!("{}/{}/{}", self.base_url, REST_PREFIX, collection.name)
    }

    fn transport(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout(self.timeout)
        } else {
            StoreError::Transport(err.to_string())
        }
    }

    async fn read_rows(op: StoreOp, response: reqwest::Response) -> Result<Vec<Row>, StoreError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(target: "bookshelf-db", %op, status = status.as_u16(), "store rejected request");
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<Value> =
            serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))?;
        rows.into_iter()
            .map(|value| match value {
                Value::Object(row) => Ok(row),
                other => Err(StoreError::Decode(format!("expected a row object, got {other}"))),
            })
            .collect()
    }
}

/// Render filters as PostgREST query parameters (`title=eq.Dune`, `authors=cs.{"A","B"}`,
/// `page_count=lte.400`).
pub fn encode_filters(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(field, Value::String(s)) => (field.clone(), format!("eq.{s}")),
            Filter::Eq(field, other) => (field.clone(), format!("eq.{other}")),
            Filter::Contains(field, values) => {
                let items: Vec<String> = values.iter().map(|v| quote_array_item(v)).collect();
                (field.clone(), format!("cs.{{{}}}", items.join(",")))
            }
            Filter::Lte(field, bound) => (field.clone(), format!("lte.{bound}")),
        })
        .collect()
}

/// Render ordering and row cap (`order=page_count.desc.nullslast`, `limit=1`).
pub fn encode_options(options: &SelectOptions) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(order) = &options.order {
        let direction = if order.descending { "desc" } else { "asc" };
        params.push((
            "order".to_string(),
            format!("{}.{direction}.nullslast", order.field),
        ));
    }
    if let Some(limit) = options.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

fn quote_array_item(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

#[async_trait]
impl RowStore for PostgrestStore {
    fn backend(&self) -> &'static str {
        "postgrest"
    }

    async fn select_with(
        &self,
        collection: &Collection,
        filters: &[Filter],
        options: &SelectOptions,
    ) -> Result<Vec<Row>, StoreError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(encode_options(options));
        params.extend(encode_filters(filters));

        let response = self
            .client
            .get(self.url(collection))
            .query(&params)
            .send()
            .await
            .map_err(|err| self.transport(err))?;

        Self::read_rows(StoreOp::Select, response).await
    }

    async fn insert(&self, collection: &Collection, row: Row) -> Result<Vec<Row>, StoreError> {
        let response = self
            .client
            .post(self.url(collection))
            .header("Prefer", "return=representation")
            .json(&vec![Value::Object(row)])
            .send()
            .await
            .map_err(|err| self.transport(err))?;

        Self::read_rows(StoreOp::Insert, response).await
    }

    async fn delete(&self, collection: &Collection, filters: &[Filter]) -> Result<(), StoreError> {
        if filters.is_empty() {
            return Err(StoreError::Unscoped(StoreOp::Delete));
        }

        let response = self
            .client
            .delete(self.url(collection))
            .query(&encode_filters(filters))
            .send()
            .await
            .map_err(|err| self.transport(err))?;

        Self::read_rows(StoreOp::Delete, response).await.map(|_| ())
    }
}
