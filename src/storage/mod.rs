/// On-disk image storage
///
/// This module handles:
/// - Deriving canonical and legacy file paths (resolver.rs)
/// - Migrating legacy files and deleting files with their records (lifecycle.rs)
/// - Reading dimensions and size of stored files (metrics.rs)
/// - Content hashing for new files (hash.rs)

pub mod hash;
pub mod lifecycle;
pub mod metrics;
pub mod resolver;

pub use lifecycle::{RecordLifecycle, Resolution};
pub use metrics::ImageMetrics;
pub use resolver::{Layout, PathResolver};
