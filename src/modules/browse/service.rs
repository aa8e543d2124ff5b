//! Read-only views over the shared book catalog: the recommended list, its filters and
//! the option lists the filter form is built from.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bookshelf_db::{Filter, Order, Row, RowStore, SelectOptions, StoreError, StoreOp};
use bookshelf_kernel::settings::BrowseSettings;
use thiserror::Error;

use super::models::{CatalogBook, CatalogFilter, AUTHOR_FIELD, CATALOG, GENRE_FIELD, PAGE_COUNT_FIELD};

#[derive(Debug, Error)]
pub enum BrowseError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct BrowseService {
    store: Arc<dyn RowStore>,
    limit: usize,
    call_timeout: Duration,
}

impl BrowseService {
    pub fn new(store: Arc<dyn RowStore>, settings: &BrowseSettings) -> Self {
        Self {
            store,
            limit: settings.limit,
            call_timeout: Duration::from_millis(settings.store_call_timeout_ms),
        }
    }

    /// The catalog in id order, capped at the configured limit.
    pub async fn recommended(&self) -> Result<Vec<CatalogBook>, BrowseError> {
        self.filtered(&CatalogFilter::default()).await
    }

    /// Catalog books by author, by genre and at most `page_count` pages. Each criterion is
    /// optional.
    pub async fn filtered(&self, filter: &CatalogFilter) -> Result<Vec<CatalogBook>, BrowseError> {
        let mut filters = Vec::new();
        if let Some(author) = filter.author() {
            filters.push(Filter::contains(AUTHOR_FIELD, &[author.to_string()]));
        }
        if let Some(genre) = filter.genre() {
            filters.push(Filter::contains(GENRE_FIELD, &[genre.to_string()]));
        }
        if let Some(pages) = filter.max_pages() {
            filters.push(Filter::lte(PAGE_COUNT_FIELD, pages));
        }

        let options = SelectOptions::ordered(Order::asc(CATALOG.id_field)).limit(self.limit);
        let rows = self
            .bounded(self.store.select_with(&CATALOG, &filters, &options))
            .await?;
        let books = rows
            .into_iter()
            .map(CatalogBook::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            author = filter.author(),
            genre = filter.genre(),
            max_pages = filter.max_pages(),
            books = books.len(),
            "catalog filtered"
        );
        Ok(books)
    }

    /// Every author in the catalog, de-duplicated and sorted.
    pub async fn authors(&self) -> Result<Vec<String>, BrowseError> {
        self.distinct(|book| book.authors).await
    }

    /// Every genre in the catalog, de-duplicated and sorted.
    pub async fn genres(&self) -> Result<Vec<String>, BrowseError> {
        self.distinct(|book| book.genres).await
    }

    /// Largest page count in the catalog; `None` when no book has one.
    pub async fn max_pages(&self) -> Result<Option<i64>, BrowseError> {
        let options = SelectOptions::ordered(Order::desc(PAGE_COUNT_FIELD)).limit(1);
        let rows = self
            .bounded(self.store.select_with(&CATALOG, &[], &options))
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.get(PAGE_COUNT_FIELD).and_then(|v| v.as_i64())))
    }

    async fn distinct(
        &self,
        values: impl Fn(CatalogBook) -> Vec<String>,
    ) -> Result<Vec<String>, BrowseError> {
        let rows: Vec<Row> = self.bounded(self.store.select(&CATALOG, &[])).await?;
        let mut seen = BTreeSet::new();
        for row in rows {
            seen.extend(values(CatalogBook::from_row(row)?));
        }
        Ok(seen.into_iter().collect())
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        bookshelf_db::bounded(self.call_timeout, StoreOp::Select, &CATALOG, call).await
    }
}
