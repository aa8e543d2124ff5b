use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{Collection, Filter, Order, Row, RowStore, SelectOptions, StoreError, StoreOp};

#[derive(Default)]
struct Tables {
    rows: HashMap<&'static str, Vec<Row>>,
    next_id: i64,
}

/// In-process row store.
///
/// Ids come from one sequence shared by every collection, starting at 1. Faults can be
/// armed per (operation, collection); each armed fault fails exactly one call.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    faults: Mutex<HashSet<(StoreOp, String)>>,
    omit_inserted_rows: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behave like a backend that does not echo inserted rows back.
    pub fn without_insert_representation() -> Self {
        Self {
            omit_inserted_rows: true,
            ..Self::default()
        }
    }

    /// Make the next `op` against `collection` fail with [`StoreError::Unavailable`].
    pub async fn fail_next(&self, op: StoreOp, collection: &str) {
        self.faults.lock().await.insert((op, collection.to_string()));
    }

    /// Every row currently held in `collection`.
    pub async fn rows(&self, collection: &str) -> Vec<Row> {
        self.tables
            .lock()
            .await
            .rows
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    async fn take_fault(&self, op: StoreOp, collection: &Collection) -> Result<(), StoreError> {
        let armed = self
            .faults
            .lock()
            .await
            .remove(&(op, collection.name.to_string()));
        if armed {
            tracing::debug!(target: "bookshelf-db", %op, collection = collection.name, "injected fault");
            return Err(StoreError::Unavailable(format!(
                "injected {} failure on {}",
                op, collection.name
            )));
        }
        Ok(())
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Null) | None, Some(Value::Null) | None) => Ordering::Equal,
        (Some(Value::Null) | None, Some(_)) => Ordering::Greater,
        (Some(_), Some(Value::Null) | None) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn sort_rows(rows: &mut [Row], order: &Order) {
    rows.sort_by(|a, b| {
        let ordering = compare_values(a.get(&order.field), b.get(&order.field));
        let present = |row: &Row| !matches!(row.get(&order.field), None | Some(Value::Null));
        if order.descending && present(a) && present(b) {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

#[async_trait]
impl RowStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn select_with(
        &self,
        collection: &Collection,
        filters: &[Filter],
        options: &SelectOptions,
    ) -> Result<Vec<Row>, StoreError> {
        self.take_fault(StoreOp::Select, collection).await?;

        let tables = self.tables.lock().await;
        let mut rows: Vec<Row> = tables
            .rows
            .get(collection.name)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filters.iter().all(|f| f.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(order) = &options.order {
            sort_rows(&mut rows, order);
        }
        if let Some(limit) = options.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, collection: &Collection, mut row: Row) -> Result<Vec<Row>, StoreError> {
        self.take_fault(StoreOp::Insert, collection).await?;

        let mut tables = self.tables.lock().await;
        tables.next_id += 1;
        let id = tables.next_id;
        row.insert(collection.id_field.to_string(), Value::from(id));
        tables
            .rows
            .entry(collection.name)
            .or_default()
            .push(row.clone());

        if self.omit_inserted_rows {
            Ok(Vec::new())
        } else {
            Ok(vec![row])
        }
    }

    async fn delete(&self, collection: &Collection, filters: &[Filter]) -> Result<(), StoreError> {
        if filters.is_empty() {
            return Err(StoreError::Unscoped(StoreOp::Delete));
        }
        self.take_fault(StoreOp::Delete, collection).await?;

        let mut tables = self.tables.lock().await;
        if let Some(rows) = tables.rows.get_mut(collection.name) {
            rows.retain(|row| !filters.iter().all(|f| f.matches(row)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BOOKS: Collection = Collection {
        name: "books",
        id_field: "book_id",
    };
    const OTHER: Collection = Collection {
        name: "other",
        id_field: "other_id",
    };

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn ids_are_shared_across_collections() {
        let store = MemoryStore::new();
        let first = store.insert(&BOOKS, row(json!({"title": "a"}))).await.unwrap();
        let second = store.insert(&OTHER, row(json!({"title": "b"}))).await.unwrap();

        assert_eq!(first[0]["book_id"], json!(1));
        assert_eq!(second[0]["other_id"], json!(2));
    }

    #[tokio::test]
    async fn delete_only_touches_matching_rows() {
        let store = MemoryStore::new();
        store
            .insert(&BOOKS, row(json!({"title": "a", "user_id": "u1"})))
            .await
            .unwrap();
        store
            .insert(&BOOKS, row(json!({"title": "a", "user_id": "u2"})))
            .await
            .unwrap();

        store
            .delete(&BOOKS, &[Filter::eq("user_id", "u1")])
            .await
            .unwrap();

        let left = store.rows("books").await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0]["user_id"], json!("u2"));
    }

    #[tokio::test]
    async fn unscoped_delete_is_refused() {
        let store = MemoryStore::new();
        let err = store.delete(&BOOKS, &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::Unscoped(StoreOp::Delete)));
    }

    #[tokio::test]
    async fn armed_fault_fires_once() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::Insert, "books").await;

        assert!(store.insert(&BOOKS, row(json!({}))).await.is_err());
        assert!(store.insert(&BOOKS, row(json!({}))).await.is_ok());
        assert!(store.insert(&OTHER, row(json!({}))).await.is_ok());
    }

    #[tokio::test]
    async fn select_orders_and_caps_rows() {
        let store = MemoryStore::new();
        for pages in [json!(300), json!(null), json!(950), json!(120)] {
            store
                .insert(&BOOKS, row(json!({"page_count": pages})))
                .await
                .unwrap();
        }

        let top = store
            .select_with(
                &BOOKS,
                &[],
                &SelectOptions::ordered(Order::desc("page_count")).limit(2),
            )
            .await
            .unwrap();
        let pages: Vec<&Value> = top.iter().map(|r| &r["page_count"]).collect();
        assert_eq!(pages, vec![&json!(950), &json!(300)]);

        let by_id = store.select(&BOOKS, &[]).await.unwrap();
        assert_eq!(by_id.len(), 4);
        assert_eq!(by_id[0]["book_id"], json!(1));
        assert_eq!(by_id[3]["book_id"], json!(4));

        let ascending = store
            .select_with(&BOOKS, &[], &SelectOptions::ordered(Order::asc("page_count")))
            .await
            .unwrap();
        assert_eq!(ascending[0]["page_count"], json!(120));
        assert_eq!(ascending[3]["page_count"], json!(null));
    }

    #[tokio::test]
    async fn insert_representation_can_be_withheld() {
        let store = MemoryStore::without_insert_representation();
        let returned = store.insert(&BOOKS, row(json!({"title": "a"}))).await.unwrap();
        assert!(returned.is_empty());
        assert_eq!(store.rows("books").await.len(), 1);
    }
}
