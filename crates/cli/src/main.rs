use anyhow::Context;
use bookshelf_app::modules::bookshelf::shelf::Shelf;
use bookshelf_kernel::settings::Settings;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bookshelf", version, about = "Bookshelf service operator tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve,
    /// Print the effective configuration as JSON (secrets omitted)
    Config,
    /// List the shelves and their backing collections
    Shelves,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().with_context(|| "failed to load Bookshelf settings")?;

    match cli.command {
        Command::Serve => {
            bookshelf_telemetry::init(&settings.telemetry)?;
            tracing::info!(
                env = ?settings.environment,
                store = ?settings.store.backend,
                "bookshelf CLI starting server"
            );
            let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            runtime.block_on(bookshelf_app::run(settings))
        }
        Command::Config => {
            let rendered = serde_json::to_string_pretty(&settings)
                .context("failed to render configuration")?;
            println!("{rendered}");
            Ok(())
        }
        Command::Shelves => {
            for shelf in Shelf::ALL {
                let collection = shelf.collection();
                println!("{}\t{}\t{}", shelf, collection.name, collection.id_field);
            }
            Ok(())
        }
    }
}
