//! End-to-end tests of the bookshelf routes through the full HTTP stack.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use bookshelf_db::{MemoryStore, StoreOp};
use bookshelf_kernel::settings::Settings;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let settings = Settings::default();
    let registry = bookshelf_app::build_registry(store.clone(), &settings).unwrap();
    (bookshelf_http::build_router(&registry, &settings), store)
}

async fn call(
    app: &Router,
    method: Method,
    path: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(path);
    if let Some(user) = user {
        request = request.header("x-user-id", user);
    }
    let request = match body {
        Some(json_body) => request
            .header("content-type", "application/json")
            .body(Body::from(json_body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn add(app: &Router, user: &str, title: &str, table: &str) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/api/bookshelf/addbooktoshelf",
        Some(user),
        Some(json!({"title": title, "authors": ["Frank Herbert"], "table": table})),
    )
    .await
}

#[tokio::test]
async fn add_duplicate_move_and_list() {
    let (app, _) = setup();

    let (status, body) = add(&app, "u1", "Dune", "to-read").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"success": true, "data": {"id": 1}}));

    let (status, body) = add(&app, "u1", "Dune", "to-read-books").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "duplicate");

    let (status, body) = call(
        &app,
        Method::DELETE,
        "/api/bookshelf/move",
        Some("u1"),
        Some(json!({"book_id": 1, "start": "to-read", "end": "reading"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["id"], 2);

    let (status, body) = call(&app, Method::GET, "/api/bookshelf/shelves", Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["to-read"], json!([]));
    assert_eq!(body["data"]["reading"][0]["title"], "Dune");
    assert_eq!(body["data"]["reading"][0]["id"], 2);
}

#[tokio::test]
async fn move_by_title_validates_input() {
    let (app, _) = setup();
    add(&app, "u1", "Dune", "reading").await;

    let (status, _) = call(
        &app,
        Method::DELETE,
        "/api/bookshelf/move-btn",
        Some("u1"),
        Some(json!({"title": "Dune", "start": "reading"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::DELETE,
        "/api/bookshelf/move-btn",
        Some("u1"),
        Some(json!({"title": "Dune", "start": "reading", "end": "reading-books"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "same_shelf");

    let (status, body) = call(
        &app,
        Method::DELETE,
        "/api/bookshelf/move-btn",
        Some("u1"),
        Some(json!({"title": "Dune", "start": "reading", "end": "favourites"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "unknown_shelf");

    let (status, _) = call(
        &app,
        Method::DELETE,
        "/api/bookshelf/move-btn",
        Some("u1"),
        Some(json!({"title": "Dune", "start": "reading", "end": "read"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn wrongly_typed_bodies_are_bad_requests() {
    let (app, store) = setup();
    add(&app, "u1", "Dune", "reading").await;

    let cases = [
        (
            Method::DELETE,
            "/api/bookshelf/move-btn",
            json!({"title": 5, "start": "reading", "end": "read"}),
        ),
        (
            Method::DELETE,
            "/api/bookshelf/move",
            json!({"book_id": "abc", "start": "reading", "end": "read"}),
        ),
        (
            Method::POST,
            "/api/bookshelf/addbooktoshelf",
            json!({"title": "Dune", "authors": null, "table": "read"}),
        ),
        (
            Method::DELETE,
            "/api/bookshelf/delete",
            json!({"book_id": 1, "bookshelf": ["read"]}),
        ),
        (Method::DELETE, "/api/bookshelf/clear", json!({"bookshelf": 3})),
    ];

    for (method, path, body) in cases {
        let (status, response) = call(&app, method, path, Some("u1"), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert_eq!(response["error"]["code"], "bad_request", "{path}");
    }

    assert_eq!(store.rows("books_being_read").await.len(), 1);
    assert!(store.rows("books_read").await.is_empty());
}

#[tokio::test]
async fn moving_a_missing_book_is_not_found() {
    let (app, store) = setup();

    let (status, body) = call(
        &app,
        Method::DELETE,
        "/api/bookshelf/move",
        Some("u1"),
        Some(json!({"book_id": 99, "start": "to-read", "end": "read"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    assert!(store.rows("books_read").await.is_empty());
}

#[tokio::test]
async fn failed_destination_insert_maps_to_insert_failed() {
    let (app, store) = setup();
    add(&app, "u1", "Dune", "to-read").await;
    store.fail_next(StoreOp::Insert, "books_read").await;

    let (status, body) = call(
        &app,
        Method::DELETE,
        "/api/bookshelf/move",
        Some("u1"),
        Some(json!({"book_id": 1, "start": "to-read", "end": "read"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "insert_failed");
    assert_eq!(store.rows("books_to_read").await.len(), 1);
}

#[tokio::test]
async fn failed_origin_delete_is_reported_as_partial_failure() {
    let (app, store) = setup();
    add(&app, "u1", "Dune", "to-read").await;
    store.fail_next(StoreOp::Delete, "books_to_read").await;

    let (status, body) = call(
        &app,
        Method::DELETE,
        "/api/bookshelf/move",
        Some("u1"),
        Some(json!({"book_id": 1, "start": "to-read", "end": "read"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "partial_failure");
    assert_eq!(body["error"]["details"][0]["new_id"], 2);
    assert_eq!(store.rows("books_to_read").await.len(), 1);
    assert_eq!(store.rows("books_read").await.len(), 1);
}

#[tokio::test]
async fn anonymous_requests_are_forbidden() {
    let (app, _) = setup();

    let (status, body) = call(
        &app,
        Method::DELETE,
        "/api/bookshelf/clear",
        None,
        Some(json!({"bookshelf": "read"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "not_logged_in");

    let (status, _) = call(&app, Method::GET, "/api/bookshelf/shelves/read", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn remove_and_clear() {
    let (app, store) = setup();
    add(&app, "u1", "Dune", "read").await;
    add(&app, "u1", "Children of Dune", "read").await;
    add(&app, "u2", "Dune", "read").await;

    let (status, body) = call(
        &app,
        Method::DELETE,
        "/api/bookshelf/delete",
        Some("u1"),
        Some(json!({"book_id": 1, "bookshelf": "read"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"success": true}));

    let (status, body) = call(&app, Method::GET, "/api/bookshelf/shelves/read", Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = call(
        &app,
        Method::DELETE,
        "/api/bookshelf/clear",
        Some("u1"),
        Some(json!({"bookshelf": "read"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let remaining = store.rows("books_read").await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["user_id"], "u2");

    let (status, _) = call(
        &app,
        Method::DELETE,
        "/api/bookshelf/clear",
        Some("u1"),
        Some(json!({"bookshelf": "read"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn store_outage_is_an_internal_error() {
    let (app, store) = setup();
    store.fail_next(StoreOp::Delete, "books_being_read").await;

    let (status, body) = call(
        &app,
        Method::DELETE,
        "/api/bookshelf/clear",
        Some("u1"),
        Some(json!({"bookshelf": "reading"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "internal_error");
}

#[tokio::test]
async fn unknown_shelf_in_path_is_bad_request() {
    let (app, _) = setup();
    let (status, body) = call(&app, Method::GET, "/api/bookshelf/shelves/wishlist", Some("u1"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "unknown_shelf");
}

#[tokio::test]
async fn openapi_lists_bookshelf_routes() {
    let (app, _) = setup();
    let (status, body) = call(&app, Method::GET, "/docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/bookshelf/move"]["delete"].is_object());
    assert!(body["components"]["schemas"]["ShelfEntry"].is_object());
}

#[tokio::test]
async fn swagger_document_carries_every_module_route() {
    let (app, _) = setup();
    let (status, body) = call(&app, Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    for path in [
        "/api/bookshelf/addbooktoshelf",
        "/api/bookshelf/move",
        "/api/bookshelf/move-btn",
        "/api/bookshelf/delete",
        "/api/bookshelf/clear",
        "/api/bookshelf/shelves",
        "/api/bookshelf/shelves/{shelf}",
        "/api/browse/recommended",
        "/api/browse/filter",
        "/api/browse/authors",
        "/api/browse/genres",
        "/api/browse/pages",
    ] {
        assert!(body["paths"][path].is_object(), "{path} missing from swagger document");
    }
}
