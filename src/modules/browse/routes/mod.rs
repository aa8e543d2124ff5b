//! Public catalog routes. No user identity is needed to browse.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use bookshelf_http::{error::AppError, extract::AppQuery};

use super::models::{CatalogBook, CatalogFilter, PageBound};
use super::service::{BrowseError, BrowseService};
use crate::modules::bookshelf::models::ApiResponse;

pub fn router(service: Arc<BrowseService>) -> Router {
    Router::new()
        .route("/recommended", get(recommended))
        .route("/filter", get(filter))
        .route("/authors", get(authors))
        .route("/genres", get(genres))
        .route("/pages", get(pages))
        .with_state(service)
}

impl From<BrowseError> for AppError {
    fn from(err: BrowseError) -> Self {
        match err {
            BrowseError::Store(source) => {
                AppError::Internal(anyhow::Error::new(source).context("catalog store call failed"))
            }
        }
    }
}

async fn recommended(
    State(service): State<Arc<BrowseService>>,
) -> Result<Json<ApiResponse<Vec<CatalogBook>>>, AppError> {
    Ok(Json(ApiResponse::data(service.recommended().await?)))
}

async fn filter(
    State(service): State<Arc<BrowseService>>,
    AppQuery(query): AppQuery<CatalogFilter>,
) -> Result<Json<ApiResponse<Vec<CatalogBook>>>, AppError> {
    Ok(Json(ApiResponse::data(service.filtered(&query).await?)))
}

async fn authors(
    State(service): State<Arc<BrowseService>>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    Ok(Json(ApiResponse::data(service.authors().await?)))
}

async fn genres(
    State(service): State<Arc<BrowseService>>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    Ok(Json(ApiResponse::data(service.genres().await?)))
}

async fn pages(
    State(service): State<Arc<BrowseService>>,
) -> Result<Json<ApiResponse<PageBound>>, AppError> {
    let page_count = service.max_pages().await?;
    Ok(Json(ApiResponse::data(PageBound { page_count })))
}
