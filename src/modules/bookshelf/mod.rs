pub mod models;
pub mod routes;
pub mod service;
pub mod shelf;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::Router;
use bookshelf_authz::UserIdentity;
use bookshelf_db::RowStore;
use bookshelf_kernel::{settings::Settings, InitCtx, Module};
use serde_json::json;

use routes::ShelfState;
use service::ShelfService;

/// Personal reading shelves: add, move, remove and clear books per user.
pub struct BookshelfModule {
    state: ShelfState,
}

impl BookshelfModule {
    pub fn new(store: Arc<dyn RowStore>, settings: &Settings) -> anyhow::Result<Self> {
        let identity = UserIdentity::from_settings(&settings.auth).with_context(|| {
            format!("invalid auth.user_header '{}'", settings.auth.user_header)
        })?;

        Ok(Self {
            state: ShelfState {
                service: Arc::new(ShelfService::new(store, &settings.shelves)),
                identity,
            },
        })
    }
}

#[async_trait]
impl Module for BookshelfModule {
    fn name(&self) -> &'static str {
        "bookshelf"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            store = self.state.service.backend(),
            dedup = ?ctx.settings.shelves.dedup,
            user_header = %self.state.identity.header(),
            "bookshelf module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let created = json!({
            "description": "Created",
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/EntryCreatedResponse" }
                }
            }
        });
        let success = |description: &str, schema: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": format!("#/components/schemas/{schema}") }
                    }
                }
            })
        };
        let body = |schema: &str| {
            json!({
                "required": true,
                "content": {
                    "application/json": {
                        "schema": { "$ref": format!("#/components/schemas/{schema}") }
                    }
                }
            })
        };

        Some(json!({
            "paths": {
                "/addbooktoshelf": {
                    "post": {
                        "summary": "Add a book to a shelf",
                        "tags": ["Bookshelf"],
                        "requestBody": body("AddBook"),
                        "responses": {
                            "201": created,
                            "400": error("Missing field or unknown shelf"),
                            "403": error("User not logged in"),
                            "409": error("Book already on the shelf"),
                            "500": error("Store failure")
                        }
                    }
                },
                "/move": {
                    "delete": {
                        "summary": "Move a book to another shelf by id",
                        "tags": ["Bookshelf"],
                        "requestBody": body("MoveBook"),
                        "responses": {
                            "201": created,
                            "400": error("Missing field, unknown shelf or same shelf"),
                            "403": error("User not logged in"),
                            "404": error("Book not found or destination insert failed"),
                            "409": error("Book is now on both shelves"),
                            "500": error("Store failure")
                        }
                    }
                },
                "/move-btn": {
                    "delete": {
                        "summary": "Move a book to another shelf by title",
                        "tags": ["Bookshelf"],
                        "requestBody": body("MoveBookByTitle"),
                        "responses": {
                            "201": created,
                            "400": error("Missing field, unknown shelf or same shelf"),
                            "403": error("User not logged in"),
                            "404": error("Book not found or destination insert failed"),
                            "409": error("Book is now on both shelves"),
                            "500": error("Store failure")
                        }
                    }
                },
                "/delete": {
                    "delete": {
                        "summary": "Remove a book from a shelf",
                        "tags": ["Bookshelf"],
                        "requestBody": body("RemoveBook"),
                        "responses": {
                            "201": success("Removed", "SuccessResponse"),
                            "400": error("Missing field or unknown shelf"),
                            "403": error("User not logged in"),
                            "500": error("Store failure")
                        }
                    }
                },
                "/clear": {
                    "delete": {
                        "summary": "Remove every book from a shelf",
                        "tags": ["Bookshelf"],
                        "requestBody": body("ClearShelf"),
                        "responses": {
                            "200": success("Cleared", "SuccessResponse"),
                            "400": error("Missing field or unknown shelf"),
                            "403": error("User not logged in"),
                            "500": error("Store failure")
                        }
                    }
                },
                "/shelves": {
                    "get": {
                        "summary": "List all three shelves",
                        "tags": ["Bookshelf"],
                        "responses": {
                            "200": success("Books grouped by shelf", "BookshelfResponse"),
                            "403": error("User not logged in"),
                            "500": error("Store failure")
                        }
                    }
                },
                "/shelves/{shelf}": {
                    "get": {
                        "summary": "List one shelf",
                        "tags": ["Bookshelf"],
                        "parameters": [{
                            "name": "shelf",
                            "in": "path",
                            "required": true,
                            "schema": { "$ref": "#/components/schemas/Shelf" }
                        }],
                        "responses": {
                            "200": success("Books on the shelf", "ShelfListResponse"),
                            "400": error("Unknown shelf"),
                            "403": error("User not logged in"),
                            "500": error("Store failure")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Shelf": {
                        "type": "string",
                        "enum": ["to-read", "reading", "read"]
                    },
                    "ShelfEntry": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer", "description": "Shelf-scoped row id" },
                            "shelf": { "$ref": "#/components/schemas/Shelf" },
                            "title": { "type": "string" },
                            "authors": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["id", "shelf", "title", "authors"]
                    },
                    "SuccessResponse": {
                        "type": "object",
                        "properties": {
                            "success": { "type": "boolean" }
                        },
                        "required": ["success"]
                    },
                    "ShelfListResponse": {
                        "type": "object",
                        "properties": {
                            "success": { "type": "boolean" },
                            "data": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/ShelfEntry" }
                            }
                        },
                        "required": ["success", "data"]
                    },
                    "BookshelfResponse": {
                        "type": "object",
                        "properties": {
                            "success": { "type": "boolean" },
                            "data": {
                                "type": "object",
                                "properties": {
                                    "to-read": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/ShelfEntry" }
                                    },
                                    "reading": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/ShelfEntry" }
                                    },
                                    "read": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/ShelfEntry" }
                                    }
                                },
                                "required": ["to-read", "reading", "read"]
                            }
                        },
                        "required": ["success", "data"]
                    },
                    "EntryCreatedResponse": {
                        "type": "object",
                        "properties": {
                            "success": { "type": "boolean" },
                            "data": {
                                "type": "object",
                                "properties": { "id": { "type": "integer" } },
                                "required": ["id"]
                            }
                        },
                        "required": ["success", "data"]
                    },
                    "AddBook": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "authors": { "type": "array", "items": { "type": "string" } },
                            "table": { "$ref": "#/components/schemas/Shelf" }
                        },
                        "required": ["title", "table"]
                    },
                    "MoveBook": {
                        "type": "object",
                        "properties": {
                            "book_id": { "type": "integer" },
                            "start": { "$ref": "#/components/schemas/Shelf" },
                            "end": { "$ref": "#/components/schemas/Shelf" }
                        },
                        "required": ["book_id", "start", "end"]
                    },
                    "MoveBookByTitle": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "start": { "$ref": "#/components/schemas/Shelf" },
                            "end": { "$ref": "#/components/schemas/Shelf" }
                        },
                        "required": ["title", "start", "end"]
                    },
                    "RemoveBook": {
                        "type": "object",
                        "properties": {
                            "book_id": { "type": "integer" },
                            "bookshelf": { "$ref": "#/components/schemas/Shelf" }
                        },
                        "required": ["book_id", "bookshelf"]
                    },
                    "ClearShelf": {
                        "type": "object",
                        "properties": {
                            "bookshelf": { "$ref": "#/components/schemas/Shelf" }
                        },
                        "required": ["bookshelf"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "bookshelf module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "bookshelf module stopped");
        Ok(())
    }
}

/// Create a new instance of the bookshelf module
pub fn create_module(
    store: Arc<dyn RowStore>,
    settings: &Settings,
) -> anyhow::Result<Arc<dyn Module>> {
    Ok(Arc::new(BookshelfModule::new(store, settings)?))
}
