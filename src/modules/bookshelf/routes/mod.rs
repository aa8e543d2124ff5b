//! HTTP handlers for the bookshelf module.

use std::sync::Arc;

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use bookshelf_authz::{CurrentUser, UserIdentity};
use bookshelf_http::{error::AppError, extract::AppJson};
use serde_json::json;

use super::models::{
    AddBookRequest, ApiResponse, Bookshelf, ClearShelfRequest, EntryCreated, MoveBookRequest,
    MoveByTitleRequest, RemoveBookRequest, ShelfEntry,
};
use super::service::{BookRef, ShelfError, ShelfService};
use super::shelf::Shelf;

/// Shared state behind every bookshelf route.
#[derive(Clone)]
pub struct ShelfState {
    pub service: Arc<ShelfService>,
    pub identity: UserIdentity,
}

impl FromRef<ShelfState> for UserIdentity {
    fn from_ref(state: &ShelfState) -> Self {
        state.identity.clone()
    }
}

pub fn router(state: ShelfState) -> Router {
    Router::new()
        .route("/addbooktoshelf", post(add_book))
        .route("/move", delete(move_book))
        .route("/move-btn", delete(move_book_by_title))
        .route("/delete", delete(remove_book))
        .route("/clear", delete(clear_shelf))
        .route("/shelves", get(list_all))
        .route("/shelves/{shelf}", get(list_shelf))
        .with_state(state)
}

impl From<ShelfError> for AppError {
    fn from(err: ShelfError) -> Self {
        match err {
            ShelfError::NotFound => {
                AppError::not_found("book not found on the origin shelf")
            }
            ShelfError::Duplicate => AppError::conflict(vec![], "book is already on this shelf")
                .with_code("duplicate"),
            ShelfError::SameShelf => {
                AppError::bad_request("start and end shelves must be different")
                    .with_code("same_shelf")
            }
            ShelfError::UnknownShelf(unknown) => {
                AppError::bad_request(unknown.to_string()).with_code("unknown_shelf")
            }
            ShelfError::InsertFailed(source) => {
                AppError::not_found(format!("could not add book to destination shelf: {source}"))
                    .with_code("insert_failed")
            }
            ShelfError::PartialFailure { new_id, source } => AppError::conflict(
                vec![json!({ "new_id": new_id, "cause": source.to_string() })],
                "book was added to the destination shelf but could not be removed from the origin shelf; it is now on both",
            )
            .with_code("partial_failure"),
            ShelfError::Store(source) => {
                AppError::Internal(anyhow::Error::new(source).context("shelf store call failed"))
            }
        }
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| {
        AppError::bad_request(format!("missing field '{field}'")).with_code("missing_field")
    })
}

fn required_text(value: Option<String>, field: &str) -> Result<String, AppError> {
    let value = required(value, field)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(format!("field '{field}' must not be blank"))
            .with_code("missing_field"));
    }
    Ok(trimmed.to_string())
}

fn shelf_field(value: Option<String>, field: &str) -> Result<Shelf, AppError> {
    let raw = required_text(value, field)?;
    raw.parse::<Shelf>()
        .map_err(|unknown| ShelfError::from(unknown).into())
}

async fn add_book(
    State(state): State<ShelfState>,
    user: CurrentUser,
    AppJson(body): AppJson<AddBookRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EntryCreated>>), AppError> {
    let title = required_text(body.title, "title")?;
    let shelf = shelf_field(body.table, "table")?;

    let id = state
        .service
        .add_book(&title, &body.authors, shelf, user.id())
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::data(EntryCreated { id }))))
}

async fn move_book(
    State(state): State<ShelfState>,
    user: CurrentUser,
    AppJson(body): AppJson<MoveBookRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EntryCreated>>), AppError> {
    let book_id = required(body.book_id, "book_id")?;
    let origin = shelf_field(body.start, "start")?;
    let destination = shelf_field(body.end, "end")?;

    let id = state
        .service
        .move_book(&BookRef::Id(book_id), origin, destination, user.id())
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::data(EntryCreated { id }))))
}

async fn move_book_by_title(
    State(state): State<ShelfState>,
    user: CurrentUser,
    AppJson(body): AppJson<MoveByTitleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EntryCreated>>), AppError> {
    let title = required_text(body.title, "title")?;
    let origin = shelf_field(body.start, "start")?;
    let destination = shelf_field(body.end, "end")?;

    let id = state
        .service
        .move_book(&BookRef::Title(title), origin, destination, user.id())
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::data(EntryCreated { id }))))
}

async fn remove_book(
    State(state): State<ShelfState>,
    user: CurrentUser,
    AppJson(body): AppJson<RemoveBookRequest>,
) -> Result<(StatusCode, Json<ApiResponse<()>>), AppError> {
    let book_id = required(body.book_id, "book_id")?;
    let shelf = shelf_field(body.bookshelf, "bookshelf")?;

    state
        .service
        .remove_book(book_id, shelf, user.id())
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok())))
}

async fn clear_shelf(
    State(state): State<ShelfState>,
    user: CurrentUser,
    AppJson(body): AppJson<ClearShelfRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let shelf = shelf_field(body.bookshelf, "bookshelf")?;

    state.service.clear_shelf(shelf, user.id()).await?;

    Ok(Json(ApiResponse::ok()))
}

async fn list_all(
    State(state): State<ShelfState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Bookshelf>>, AppError> {
    let shelves = state.service.list_all(user.id()).await?;
    Ok(Json(ApiResponse::data(shelves)))
}

async fn list_shelf(
    State(state): State<ShelfState>,
    user: CurrentUser,
    Path(shelf): Path<String>,
) -> Result<Json<ApiResponse<Vec<ShelfEntry>>>, AppError> {
    let shelf = shelf_field(Some(shelf), "shelf")?;
    let entries = state.service.list_shelf(shelf, user.id()).await?;
    Ok(Json(ApiResponse::data(entries)))
}
