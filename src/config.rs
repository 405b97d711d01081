use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Where image files live on disk.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MediaConfig {
    /// Base directory for all stored images. Tags become subfolders of it.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// SQLite database file holding the `image_manager` table.
    pub path: PathBuf,
}

/// Audit toggle. When enabled, `created_by` / `modified_by` are recorded.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct AuditConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    pub media: MediaConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl AppConfig {
    /// Load configuration from defaults, an optional TOML file and the environment.
    ///
    /// Without an explicit file, `config/image-manager.toml` is read if present.
    /// Environment variables override everything, e.g. `IMAGE_MANAGER__MEDIA__ROOT`.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let data_dir = app_data_dir();

        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name("config/image-manager").required(false),
        };

        let s = Config::builder()
            .set_default(
                "media.root",
                data_dir.join("media").to_string_lossy().into_owned(),
            )?
            .set_default(
                "database.path",
                data_dir
                    .join("image_manager.db")
                    .to_string_lossy()
                    .into_owned(),
            )?
            .set_default("audit.enabled", false)?
            .add_source(file_source)
            .add_source(Environment::with_prefix("IMAGE_MANAGER").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Configuration rooted in a single directory. Used by tests and tooling.
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            media: MediaConfig {
                root: dir.join("media"),
            },
            database: DatabaseConfig {
                path: dir.join("image_manager.db"),
            },
            audit: AuditConfig::default(),
        }
    }
}

/// Per-user data directory for the application:
/// - Linux: ~/.local/share/image-manager
/// - macOS: ~/Library/Application Support/image-manager
/// - Windows: %APPDATA%\image-manager
fn app_data_dir() -> PathBuf {
    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    path.push("image-manager");
    path
}
