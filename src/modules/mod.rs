pub mod bookshelf;
pub mod browse;

use std::sync::Arc;

use bookshelf_db::RowStore;
use bookshelf_kernel::{settings::Settings, ModuleRegistry};

/// Register all project-specific modules with the registry
pub fn register_all(
    registry: &mut ModuleRegistry,
    store: Arc<dyn RowStore>,
    settings: &Settings,
) -> anyhow::Result<()> {
    registry.register(bookshelf::create_module(store.clone(), settings)?);
    registry.register(browse::create_module(store, settings));
    Ok(())
}
