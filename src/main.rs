use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use image_manager::error::{ImageError, Result};
use image_manager::storage::hash::content_hash;
use image_manager::sweep::{find_orphans, migrate_all};
use image_manager::{AppConfig, Library, NewImage, PathResolver, RecordLifecycle, Stamp};

/// Manage the image catalog and its files
#[derive(Debug, Parser)]
#[command(name = "image-manager", version)]
struct Cli {
    /// Configuration file (defaults to config/image-manager.toml if present)
    #[arg(long, env = "IMAGE_MANAGER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add an image file to the catalog
    Import {
        file: PathBuf,
        #[arg(long, default_value = "")]
        tag: String,
        /// User ID recorded when auditing is enabled
        #[arg(long)]
        actor: Option<i64>,
    },
    /// Print an image's record, path and metrics as JSON
    Show { id: i64 },
    /// Delete an image record and its file
    Delete { id: i64 },
    /// Move every legacy file into the tagged layout
    Migrate,
    /// List stored files no record refers to
    Orphans,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let library = Library::open(&config.database.path)?;
    let lifecycle = RecordLifecycle::new(PathResolver::new(&config.media));

    match cli.command {
        Command::Import { file, tag, actor } => {
            let bytes = std::fs::read(&file).map_err(|source| ImageError::Io {
                path: file.clone(),
                source,
            })?;
            let file_name = file
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();

            let image = NewImage::new(file_name, content_hash(&bytes)).with_tag(tag);
            let stamp = Stamp::now(actor, &config.audit);
            let record = lifecycle.store_bytes(&library, &image, &bytes, &stamp)?;

            println!("✅ Imported {} as image {}", file.display(), record.id);
        }
        Command::Show { id } => {
            let record = library.get_image(id)?.ok_or(ImageError::NotFound(id))?;
            let path = lifecycle.resolve_existing_path(&record);
            let metrics = lifecycle.image_metrics(&record);

            let output = serde_json::json!({
                "record": record,
                "path": path,
                "metrics": metrics,
                "size": metrics.display_size(2),
            });
            match serde_json::to_string_pretty(&output) {
                Ok(text) => println!("{}", text),
                Err(e) => eprintln!("⚠️  Could not render image {}: {}", id, e),
            }
        }
        Command::Delete { id } => match lifecycle.delete_record(&library, id)? {
            Some(_) => println!("🗑️  Deleted image {}", id),
            None => return Err(ImageError::NotFound(id)),
        },
        Command::Migrate => {
            let report = migrate_all(&library, &lifecycle)?;
            println!(
                "📊 {} images: {} in place, {} migrated, {} stuck in legacy layout, {} missing",
                report.total(),
                report.canonical,
                report.migrated,
                report.stuck_legacy,
                report.missing
            );
        }
        Command::Orphans => {
            let orphans = find_orphans(&library, lifecycle.resolver())?;
            for path in &orphans {
                println!("{}", path.display());
            }
            println!("🔍 {} orphaned files", orphans.len());
        }
    }

    Ok(())
}
