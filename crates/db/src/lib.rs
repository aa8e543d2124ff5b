//! Shelf Store client.
//!
//! The hosted store is row oriented: each collection is addressed by name, rows are JSON
//! objects, and reads/deletes are narrowed by equality, "array contains" or upper-bound
//! filters.
//! [`RowStore`] is the seam the shelf service talks through; [`MemoryStore`] backs local
//! runs and tests, [`PostgrestStore`] talks to a hosted PostgREST endpoint.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bookshelf_kernel::settings::{StoreBackend, StoreSettings};
use serde_json::Value;
use thiserror::Error;

pub mod memory;
pub mod postgrest;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

/// One stored row.
pub type Row = serde_json::Map<String, Value>;

/// A backing collection and the name of its generated row-id field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Collection {
    pub name: &'static str,
    pub id_field: &'static str,
}

/// Row filter understood by every backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field == value`
    Eq(String, Value),
    /// The array stored in `field` holds every listed value.
    Contains(String, Vec<String>),
    /// `field <= value`, numeric.
    Lte(String, i64),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn contains(field: impl Into<String>, values: &[String]) -> Self {
        Filter::Contains(field.into(), values.to_vec())
    }

    pub fn lte(field: impl Into<String>, bound: i64) -> Self {
        Filter::Lte(field.into(), bound)
    }

    /// Whether `row` satisfies this filter.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::Eq(field, expected) => row.get(field) == Some(expected),
            Filter::Contains(field, wanted) => match row.get(field) {
                Some(Value::Array(stored)) => wanted
                    .iter()
                    .all(|w| stored.iter().any(|s| s.as_str() == Some(w.as_str()))),
                _ => false,
            },
            Filter::Lte(field, bound) => row
                .get(field)
                .and_then(Value::as_i64)
                .is_some_and(|stored| stored <= *bound),
        }
    }
}

/// Sort key for a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub descending: bool,
}

impl Order {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Ordering and row cap applied to a select.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectOptions {
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl SelectOptions {
    pub fn ordered(order: Order) -> Self {
        Self {
            order: Some(order),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Store operation, used in logs and for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Select,
    Insert,
    Delete,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StoreOp::Select => "select",
            StoreOp::Insert => "insert",
            StoreOp::Delete => "delete",
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store transport error: {0}")]
    Transport(String),

    #[error("store rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("could not decode store response: {0}")]
    Decode(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("refusing to {0} without filters")]
    Unscoped(StoreOp),
}

/// Row-oriented persistence collaborator.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Rows matching every filter, ordered by the collection's id field ascending.
    async fn select(
        &self,
        collection: &Collection,
        filters: &[Filter],
    ) -> Result<Vec<Row>, StoreError> {
        let options = SelectOptions::ordered(Order::asc(collection.id_field));
        self.select_with(collection, filters, &options).await
    }

    /// Rows matching every filter, sorted and capped as `options` asks. Rows missing the
    /// sort field sort last.
    async fn select_with(
        &self,
        collection: &Collection,
        filters: &[Filter],
        options: &SelectOptions,
    ) -> Result<Vec<Row>, StoreError>;

    /// Insert one row. Returns the stored representation when the backend provides one.
    async fn insert(&self, collection: &Collection, row: Row) -> Result<Vec<Row>, StoreError>;

    /// Delete rows matching every filter. An empty filter list is refused.
    async fn delete(&self, collection: &Collection, filters: &[Filter]) -> Result<(), StoreError>;
}

/// Run one store call, failing with [`StoreError::Timeout`] when it outlives `limit`.
pub async fn bounded<T>(
    limit: Duration,
    op: StoreOp,
    collection: &Collection,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                target: "bookshelf-db",
                %op,
                collection = collection.name,
                timeout_ms = limit.as_millis() as u64,
                "store call timed out"
            );
            Err(StoreError::Timeout(limit))
        }
    }
}

/// Build the store selected by configuration.
pub fn connect(settings: &StoreSettings) -> anyhow::Result<Arc<dyn RowStore>> {
    match settings.backend {
        StoreBackend::Memory => {
            tracing::info!(target: "bookshelf-db", "using in-memory shelf store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgrest => {
            tracing::info!(target: "bookshelf-db", url = %settings.url, "using PostgREST shelf store");
            Ok(Arc::new(PostgrestStore::from_settings(settings)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn eq_filter_compares_json_values() {
        let r = row(json!({"title": "Dune", "user_id": "u1"}));
        assert!(Filter::eq("title", "Dune").matches(&r));
        assert!(!Filter::eq("title", "dune").matches(&r));
        assert!(!Filter::eq("missing", "Dune").matches(&r));
    }

    #[test]
    fn contains_filter_accepts_author_supersets() {
        let r = row(json!({"authors": ["Frank Herbert", "Brian Herbert"]}));
        assert!(Filter::contains("authors", &["Frank Herbert".to_string()]).matches(&r));
        assert!(Filter::contains("authors", &[]).matches(&r));
        assert!(!Filter::contains("authors", &["Kevin J. Anderson".to_string()]).matches(&r));
    }

    #[test]
    fn contains_filter_needs_an_array() {
        let r = row(json!({"authors": "Frank Herbert"}));
        assert!(!Filter::contains("authors", &["Frank Herbert".to_string()]).matches(&r));
    }

    #[test]
    fn lte_filter_bounds_numeric_fields() {
        let r = row(json!({"page_count": 412}));
        assert!(Filter::lte("page_count", 412).matches(&r));
        assert!(!Filter::lte("page_count", 411).matches(&r));
        assert!(!Filter::lte("page_count", 500).matches(&row(json!({"page_count": null}))));
    }

    #[tokio::test]
    async fn bounded_call_times_out() {
        let books = Collection {
            name: "books",
            id_field: "id",
        };
        let limit = Duration::from_millis(10);
        let stalled = std::future::pending::<Result<(), StoreError>>();

        let err = bounded(limit, StoreOp::Select, &books, stalled)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout(d) if d == limit));

        let quick = bounded(limit, StoreOp::Select, &books, async { Ok(7) }).await;
        assert_eq!(quick.unwrap(), 7);
    }

    #[test]
    fn connect_defaults_to_memory() {
        let store = connect(&StoreSettings::default()).unwrap();
        assert_eq!(store.backend(), "memory");
    }
}
