//! Bookshelf application library
//!
//! Wires the bookshelf and browse modules onto the kernel and HTTP facade. The binary in `main.rs`
//! and the operator CLI both start the service through [`run`].

pub mod modules;

use std::sync::Arc;

use anyhow::Context;
use bookshelf_db::RowStore;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// Registry with every application module registered against `store`.
pub fn build_registry(store: Arc<dyn RowStore>, settings: &Settings) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, store, settings)?;
    Ok(registry)
}

/// Connect the store, bring modules up, serve HTTP until shutdown, then stop modules.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        store = ?settings.store.backend,
        "bookshelf bootstrap starting"
    );

    let store = bookshelf_db::connect(&settings.store).context("failed to connect shelf store")?;
    let registry = build_registry(store, &settings)?;

    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    tracing::info!("bookshelf bootstrap complete");
    let served = bookshelf_http::start_server(&registry, &settings).await;

    registry.stop_all().await?;
    served
}
