pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookshelf_db::RowStore;
use bookshelf_kernel::{settings::Settings, InitCtx, Module};
use serde_json::json;

use service::BrowseService;

/// Recommended catalog for visitors: the book list, its filters and filter options.
pub struct BrowseModule {
    service: Arc<BrowseService>,
}

impl BrowseModule {
    pub fn new(store: Arc<dyn RowStore>, settings: &Settings) -> Self {
        Self {
            service: Arc::new(BrowseService::new(store, &settings.browse)),
        }
    }
}

#[async_trait]
impl Module for BrowseModule {
    fn name(&self) -> &'static str {
        "browse"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            limit = ctx.settings.browse.limit,
            collection = models::CATALOG.name,
            "browse module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let failure = json!({
            "description": "Store failure",
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                }
            }
        });
        let ok = |description: &str, schema: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": format!("#/components/schemas/{schema}") }
                    }
                }
            })
        };
        let query = |name: &str, schema: serde_json::Value, description: &str| {
            json!({
                "name": name,
                "in": "query",
                "required": false,
                "description": description,
                "schema": schema
            })
        };

        Some(json!({
            "paths": {
                "/recommended": {
                    "get": {
                        "summary": "Recommended books",
                        "tags": ["Browse"],
                        "responses": {
                            "200": ok("Catalog in id order", "CatalogListResponse"),
                            "500": failure
                        }
                    }
                },
                "/filter": {
                    "get": {
                        "summary": "Recommended books narrowed by author, genre and length",
                        "tags": ["Browse"],
                        "parameters": [
                            query("author", json!({ "type": "string" }), "Blank means any author"),
                            query("genre", json!({ "type": "string" }), "Blank means any genre"),
                            query(
                                "page_count",
                                json!({ "type": "integer" }),
                                "Largest page count; negative means any length"
                            )
                        ],
                        "responses": {
                            "200": ok("Matching books", "CatalogListResponse"),
                            "400": {
                                "description": "Unparsable query",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            },
                            "500": failure
                        }
                    }
                },
                "/authors": {
                    "get": {
                        "summary": "Distinct catalog authors, sorted",
                        "tags": ["Browse"],
                        "responses": {
                            "200": ok("Authors", "NameListResponse"),
                            "500": failure
                        }
                    }
                },
                "/genres": {
                    "get": {
                        "summary": "Distinct catalog genres, sorted",
                        "tags": ["Browse"],
                        "responses": {
                            "200": ok("Genres", "NameListResponse"),
                            "500": failure
                        }
                    }
                },
                "/pages": {
                    "get": {
                        "summary": "Largest page count in the catalog",
                        "tags": ["Browse"],
                        "responses": {
                            "200": ok("Page bound", "PageBoundResponse"),
                            "500": failure
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "CatalogBook": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "title": { "type": "string" },
                            "author": { "type": "array", "items": { "type": "string" } },
                            "genre": { "type": "array", "items": { "type": "string" } },
                            "page_count": { "type": ["integer", "null"] },
                            "isbn": { "type": "string" },
                            "cover": { "type": "string" }
                        },
                        "required": ["id", "title", "author", "genre", "page_count"]
                    },
                    "CatalogListResponse": {
                        "type": "object",
                        "properties": {
                            "success": { "type": "boolean" },
                            "data": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/CatalogBook" }
                            }
                        },
                        "required": ["success", "data"]
                    },
                    "NameListResponse": {
                        "type": "object",
                        "properties": {
                            "success": { "type": "boolean" },
                            "data": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["success", "data"]
                    },
                    "PageBoundResponse": {
                        "type": "object",
                        "properties": {
                            "success": { "type": "boolean" },
                            "data": {
                                "type": "object",
                                "properties": {
                                    "page_count": { "type": ["integer", "null"] }
                                },
                                "required": ["page_count"]
                            }
                        },
                        "required": ["success", "data"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "browse module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "browse module stopped");
        Ok(())
    }
}

/// Create a new instance of the browse module
pub fn create_module(store: Arc<dyn RowStore>, settings: &Settings) -> Arc<dyn Module> {
    Arc::new(BrowseModule::new(store, settings))
}
