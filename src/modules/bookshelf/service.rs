//! Shelf transfer service: add with dedup, move between shelves, remove, clear.
//!
//! The service is stateless apart from its advisory locks. Every store call is scoped by
//! `user_id` and bounded by a per-call timeout. Shelves live in separate collections, so
//! a move is a select, an insert into the destination and a delete from the origin, in
//! that order. The store offers no transaction across collections; when the final delete
//! fails the book is left on both shelves and reported as [`ShelfError::PartialFailure`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bookshelf_db::{Collection, Filter, Row, RowStore, StoreError, StoreOp};
use bookshelf_kernel::settings::{DedupMode, ShelfSettings};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

use super::models::{Bookshelf, EntryId, ShelfEntry};
use super::shelf::{resolve_shelf, Shelf, UnknownShelf};

const USER_FIELD: &str = "user_id";
const TITLE_FIELD: &str = "title";
const AUTHORS_FIELD: &str = "authors";

#[derive(Debug, Error)]
pub enum ShelfError {
    #[error("book not found on the origin shelf")]
    NotFound,

    #[error("book is already on this shelf")]
    Duplicate,

    #[error("origin and destination shelves must differ")]
    SameShelf,

    #[error("could not add the book to the destination shelf")]
    InsertFailed(#[source] StoreError),

    /// The destination row exists but the origin row could not be removed.
    #[error("book was added to the destination shelf but is still on the origin shelf")]
    PartialFailure {
        new_id: Option<EntryId>,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    UnknownShelf(#[from] UnknownShelf),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How the book to move is identified on its origin shelf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookRef {
    Id(EntryId),
    Title(String),
}

/// Advisory locks keyed by (user, shelf).
///
/// Two requests touching the same shelves of the same user run one after the other, so a
/// book cannot be moved twice or added twice by racing requests served by this process.
#[derive(Default)]
struct ShelfLocks {
    inner: Mutex<HashMap<(String, Shelf), Arc<tokio::sync::Mutex<()>>>>,
}

impl ShelfLocks {
    async fn acquire(&self, user_id: &str, shelves: &[Shelf]) -> Vec<OwnedMutexGuard<()>> {
        // Sorted order keeps two movers going opposite ways from deadlocking.
        let ordered: BTreeSet<Shelf> = shelves.iter().copied().collect();

        let mutexes: Vec<Arc<tokio::sync::Mutex<()>>> = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.retain(|_, m| Arc::strong_count(m) > 1);
            ordered
                .iter()
                .map(|shelf| {
                    map.entry((user_id.to_string(), *shelf))
                        .or_default()
                        .clone()
                })
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        guards
    }
}

pub struct ShelfService {
    store: Arc<dyn RowStore>,
    dedup: DedupMode,
    call_timeout: Duration,
    locks: ShelfLocks,
}

impl ShelfService {
    pub fn new(store: Arc<dyn RowStore>, settings: &ShelfSettings) -> Self {
        Self {
            store,
            dedup: settings.dedup,
            call_timeout: Duration::from_millis(settings.store_call_timeout_ms),
            locks: ShelfLocks::default(),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Add a book unless the shelf already holds it. Returns the new row id.
    pub async fn add_book(
        &self,
        title: &str,
        authors: &[String],
        shelf: Shelf,
        user_id: &str,
    ) -> Result<EntryId, ShelfError> {
        let collection = resolve_shelf(shelf);
        let _guards = self.locks.acquire(user_id, &[shelf]).await;

        let lookup = book_filters(title, authors, user_id);
        let existing = self
            .bounded(StoreOp::Select, &collection, self.store.select(&collection, &lookup))
            .await?;
        if existing.iter().any(|row| self.is_same_book(row, authors)) {
            tracing::info!(%shelf, user_id, title, "book already on shelf");
            return Err(ShelfError::Duplicate);
        }

        let inserted = self
            .bounded(
                StoreOp::Insert,
                &collection,
                self.store
                    .insert(&collection, new_row(title, authors, user_id)),
            )
            .await?;

        let id = self
            .capture_id(&collection, &inserted, title, authors, user_id)
            .await?
            .ok_or_else(|| {
                StoreError::Decode(format!(
                    "inserted row not found in {} after insert",
                    collection.name
                ))
            })?;

        tracing::info!(%shelf, user_id, title, %id, "book added");
        Ok(id)
    }

    /// Move a book between shelves. Returns the id of the row on the destination shelf.
    ///
    /// Insert always precedes delete: a failure in between leaves the book on both
    /// shelves rather than on none.
    pub async fn move_book(
        &self,
        book: &BookRef,
        origin: Shelf,
        destination: Shelf,
        user_id: &str,
    ) -> Result<EntryId, ShelfError> {
        if origin == destination {
            return Err(ShelfError::SameShelf);
        }
        let from = resolve_shelf(origin);
        let to = resolve_shelf(destination);
        let _guards = self.locks.acquire(user_id, &[origin, destination]).await;

        // SELECT
        let mut filters = vec![Filter::eq(USER_FIELD, user_id)];
        match book {
            BookRef::Id(id) => filters.push(Filter::eq(from.id_field, id.0)),
            BookRef::Title(title) => filters.push(Filter::eq(TITLE_FIELD, title.as_str())),
        }
        let rows = self
            .bounded(StoreOp::Select, &from, self.store.select(&from, &filters))
            .await?;
        if rows.len() > 1 {
            tracing::warn!(
                %origin,
                user_id,
                matches = rows.len(),
                book = ?book,
                "several origin rows match, moving the lowest id"
            );
        }
        let Some(entry) = rows
            .iter()
            .map(|row| ShelfEntry::from_row(origin, &from, row))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .min_by_key(|entry| entry.id)
        else {
            tracing::info!(%origin, user_id, book = ?book, "book to move not found");
            return Err(ShelfError::NotFound);
        };

        // INSERT
        let inserted = self
            .bounded(
                StoreOp::Insert,
                &to,
                self.store
                    .insert(&to, new_row(&entry.title, &entry.authors, user_id)),
            )
            .await
            .map_err(|err| {
                tracing::error!(%destination, user_id, error = %err, "move insert failed");
                ShelfError::InsertFailed(err)
            })?;

        let captured = self
            .capture_id(&to, &inserted, &entry.title, &entry.authors, user_id)
            .await
            .and_then(|id| {
                id.ok_or_else(|| {
                    StoreError::Decode(format!(
                        "inserted row not found in {} after insert",
                        to.name
                    ))
                })
            });
        let new_id = match captured {
            Ok(id) => id,
            Err(err) => {
                tracing::error!(
                    %origin,
                    %destination,
                    user_id,
                    old_id = %entry.id,
                    error = %err,
                    "destination row id unavailable, leaving origin row in place"
                );
                return Err(ShelfError::PartialFailure {
                    new_id: None,
                    source: err,
                });
            }
        };

        // DELETE
        let origin_row = [
            Filter::eq(from.id_field, entry.id.0),
            Filter::eq(USER_FIELD, user_id),
        ];
        if let Err(err) = self
            .bounded(StoreOp::Delete, &from, self.store.delete(&from, &origin_row))
            .await
        {
            tracing::error!(
                %origin,
                %destination,
                user_id,
                old_id = %entry.id,
                %new_id,
                error = %err,
                "book now on both shelves, origin delete failed"
            );
            return Err(ShelfError::PartialFailure {
                new_id: Some(new_id),
                source: err,
            });
        }

        tracing::info!(%origin, %destination, user_id, old_id = %entry.id, %new_id, "book moved");
        Ok(new_id)
    }

    /// Remove one book from a shelf.
    pub async fn remove_book(
        &self,
        id: EntryId,
        shelf: Shelf,
        user_id: &str,
    ) -> Result<(), ShelfError> {
        let collection = resolve_shelf(shelf);
        let filters = [
            Filter::eq(collection.id_field, id.0),
            Filter::eq(USER_FIELD, user_id),
        ];
        self.bounded(StoreOp::Delete, &collection, self.store.delete(&collection, &filters))
            .await?;

        tracing::info!(%shelf, user_id, %id, "book removed");
        Ok(())
    }

    /// Remove every book the user has on a shelf.
    pub async fn clear_shelf(&self, shelf: Shelf, user_id: &str) -> Result<(), ShelfError> {
        let collection = resolve_shelf(shelf);
        let filters = [Filter::eq(USER_FIELD, user_id)];
        self.bounded(StoreOp::Delete, &collection, self.store.delete(&collection, &filters))
            .await?;

        tracing::info!(%shelf, user_id, "shelf cleared");
        Ok(())
    }

    pub async fn list_shelf(&self, shelf: Shelf, user_id: &str) -> Result<Vec<ShelfEntry>, ShelfError> {
        let collection = resolve_shelf(shelf);
        let filters = [Filter::eq(USER_FIELD, user_id)];
        let rows = self
            .bounded(StoreOp::Select, &collection, self.store.select(&collection, &filters))
            .await?;

        rows.iter()
            .map(|row| ShelfEntry::from_row(shelf, &collection, row).map_err(ShelfError::from))
            .collect()
    }

    pub async fn list_all(&self, user_id: &str) -> Result<Bookshelf, ShelfError> {
        let (to_read, reading, read) = tokio::try_join!(
            self.list_shelf(Shelf::ToRead, user_id),
            self.list_shelf(Shelf::Reading, user_id),
            self.list_shelf(Shelf::Read, user_id),
        )?;
        Ok(Bookshelf {
            to_read,
            reading,
            read,
        })
    }

    /// Whether a row returned by the duplicate lookup counts as the same book.
    fn is_same_book(&self, row: &Row, authors: &[String]) -> bool {
        match self.dedup {
            DedupMode::Contains => true,
            DedupMode::Exact => {
                let stored: HashSet<&str> = match row.get(AUTHORS_FIELD) {
                    Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
                    _ => HashSet::new(),
                };
                let wanted: HashSet<&str> = authors.iter().map(String::as_str).collect();
                stored == wanted
            }
        }
    }

    /// Id of a freshly inserted row: taken from the insert's representation when the
    /// store returned one, otherwise read back with the same filters (highest id wins).
    async fn capture_id(
        &self,
        collection: &Collection,
        inserted: &[Row],
        title: &str,
        authors: &[String],
        user_id: &str,
    ) -> Result<Option<EntryId>, StoreError> {
        if let Some(id) = inserted
            .iter()
            .filter_map(|row| row.get(collection.id_field).and_then(Value::as_i64))
            .max()
        {
            return Ok(Some(EntryId(id)));
        }

        tracing::debug!(collection = collection.name, "insert returned no row, reading id back");
        let filters = book_filters(title, authors, user_id);
        let rows = self
            .bounded(StoreOp::Select, collection, self.store.select(collection, &filters))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(collection.id_field).and_then(Value::as_i64))
            .max()
            .map(EntryId))
    }

    /// Run one store call under the per-call timeout.
    async fn bounded<T>(
        &self,
        op: StoreOp,
        collection: &Collection,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        bookshelf_db::bounded(self.call_timeout, op, collection, call).await
    }
}

fn book_filters(title: &str, authors: &[String], user_id: &str) -> Vec<Filter> {
    vec![
        Filter::eq(TITLE_FIELD, title),
        Filter::contains(AUTHORS_FIELD, authors),
        Filter::eq(USER_FIELD, user_id),
    ]
}

fn new_row(title: &str, authors: &[String], user_id: &str) -> Row {
    let mut row = Row::new();
    row.insert(TITLE_FIELD.to_string(), Value::from(title));
    row.insert(AUTHORS_FIELD.to_string(), Value::from(authors.to_vec()));
    row.insert(USER_FIELD.to_string(), Value::from(user_id));
    row
}
