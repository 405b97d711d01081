//! Image metadata catalog with tag-partitioned file storage.
//!
//! Each image is a row in an SQLite table plus one file under the media
//! root at `{root}/{tag}/{id}_{hash}.{ext}`. Files written by older
//! versions at `{root}/{id}_{hash}.{ext}` are moved into place the first
//! time they are looked up.

pub mod config;
pub mod error;
pub mod state;
pub mod storage;
pub mod sweep;

pub use config::AppConfig;
pub use error::{ImageError, Result};
pub use state::audit::Stamp;
pub use state::data::{ImageRecord, NewImage};
pub use state::library::Library;
pub use storage::{ImageMetrics, PathResolver, RecordLifecycle, Resolution};
