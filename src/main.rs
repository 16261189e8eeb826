mod komga;

use clap::{Parser, Subcommand};
use koma_catalog::{Database, Removals};
use koma_config::{Config, MediaServerKind};
use koma_sync::{LibraryNotifier, NoopNotifier, PassOptions, SyncEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "koma", version, about = "Catalog gallery folders and repackage them as CBZ archives")]
struct Cli {
    /// Configuration file (TOML, YAML, or JSON; defaults to the platform
    /// config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one synchronization pass (the default).
    Sync,
    /// Mark a GID as intentionally purged; folders carrying it are skipped
    /// on future passes.
    Tombstone { gid: u64 },
    /// Clear a GID tombstone so the gallery can be re-ingested.
    Readmit { gid: u64 },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).map_err(|error| miette::miette!("{error}"))?;
    let db = Database::connect(&config.database.path)
        .await
        .map_err(|error| miette::miette!("{error}"))?;

    let result = match cli.command.unwrap_or(Command::Sync) {
        Command::Sync => run_sync(&db, &config).await,
        Command::Tombstone { gid } => {
            Removals::from(&db)
                .tombstone_gid(gid)
                .await
                .map_err(|error| miette::miette!("{error}"))?;
            println!("GID {gid} tombstoned; matching folders will be skipped");
            Ok(())
        },
        Command::Readmit { gid } => {
            let cleared =
                Removals::from(&db).readmit_gid(gid).await.map_err(|error| miette::miette!("{error}"))?;
            match cleared {
                true => println!("GID {gid} readmitted; it will be re-ingested on the next pass"),
                false => println!("GID {gid} carried no tombstone"),
            }
            Ok(())
        },
    };
    db.close().await;
    result
}

async fn run_sync(db: &Database, config: &Config) -> miette::Result<()> {
    let notifier: Arc<dyn LibraryNotifier> = match &config.media_server {
        Some(media_server) => match media_server.kind {
            MediaServerKind::Komga => Arc::new(komga::KomgaNotifier::new(media_server)),
        },
        None => Arc::new(NoopNotifier),
    };
    let engine = SyncEngine::new(
        db,
        PassOptions {
            download_root: config.library.download_root.clone(),
            archive_root: config.library.archive_root.clone(),
            grouping: config.library.grouping,
            sort: config.library.sort,
            max_image_dimension: config.library.max_image_dimension,
            workers: config.library.workers,
        },
        notifier,
    );

    // Ctrl-C stops the pass at the next gallery boundary; in-flight units
    // run to completion so no gallery is left half-written.
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; finishing in-flight galleries");
            trigger.cancel();
        }
    });

    let report = engine.run_pass(&cancel).await.map_err(|error| miette::miette!("{error}"))?;
    print!("{report}");
    match report.is_clean() {
        true => Ok(()),
        false => Err(miette::miette!("pass completed with per-gallery failures")),
    }
}
