use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::metrics::ImageMetrics;
use super::resolver::{Layout, PathResolver};
use crate::error::{ImageError, Result};
use crate::state::audit::Stamp;
use crate::state::data::{ImageRecord, NewImage};
use crate::state::library::Library;

/// Where a record's file was found by `RecordLifecycle::resolve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Already at the canonical path
    Canonical(PathBuf),
    /// Found in a legacy layout and moved to the canonical path just now
    Migrated(PathBuf),
    /// Found in a legacy layout but the move failed; served from there
    Legacy(PathBuf),
    /// No file in any known layout
    Missing,
}

impl Resolution {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Canonical(p) | Self::Migrated(p) | Self::Legacy(p) => Some(p),
            Self::Missing => None,
        }
    }

    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            Self::Canonical(p) | Self::Migrated(p) | Self::Legacy(p) => Some(p),
            Self::Missing => None,
        }
    }
}

/// Keeps a record's file in step with the record itself:
/// resolves (and migrates) its location, reports metrics, and
/// cleans up the file once the record is gone.
#[derive(Debug, Clone)]
pub struct RecordLifecycle {
    resolver: PathResolver,
}

impl RecordLifecycle {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Canonical path to write the record's bytes to. The directory exists on return.
    pub fn save_path(&self, record: &ImageRecord) -> Result<PathBuf> {
        self.resolver.save_path(record)
    }

    /// Path of the record's existing file, or `None` when there is none.
    ///
    /// A file found in a legacy layout is moved to the canonical path first.
    pub fn resolve_existing_path(&self, record: &ImageRecord) -> Option<PathBuf> {
        self.resolve(record).into_path()
    }

    /// Look through the candidate layouts in order and report where the file was.
    pub fn resolve(&self, record: &ImageRecord) -> Resolution {
        let canonical = self.resolver.canonical_path(record);
        if canonical.exists() {
            return Resolution::Canonical(canonical);
        }

        for layout in Layout::CANDIDATES.iter().filter(|l| !l.is_canonical()) {
            let legacy = self.resolver.path_for(*layout, record);
            if legacy == canonical || !legacy.exists() {
                continue;
            }
            if let Some(resolution) = self.migrate(record, legacy, &canonical) {
                return resolution;
            }
        }

        Resolution::Missing
    }

    /// Move a legacy file to the canonical path.
    /// Returns `None` when the source vanished and nothing is at the target either.
    fn migrate(&self, record: &ImageRecord, legacy: PathBuf, canonical: &Path) -> Option<Resolution> {
        if let Err(e) = self.resolver.save_directory(record.tag()) {
            warn!(id = record.id, error = %e, "migration skipped, serving legacy path");
            return Some(Resolution::Legacy(legacy));
        }

        match fs::rename(&legacy, canonical) {
            Ok(()) => {
                info!(
                    id = record.id,
                    from = %legacy.display(),
                    to = %canonical.display(),
                    "migrated image to tagged layout"
                );
                Some(Resolution::Migrated(canonical.to_path_buf()))
            }
            // Someone else moved it between our existence check and the rename
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(id = record.id, "legacy file already gone");
                canonical
                    .exists()
                    .then(|| Resolution::Canonical(canonical.to_path_buf()))
            }
            Err(e) => {
                warn!(
                    id = record.id,
                    from = %legacy.display(),
                    to = %canonical.display(),
                    error = %e,
                    "migration failed, serving legacy path"
                );
                Some(Resolution::Legacy(legacy))
            }
        }
    }

    /// Width, height and byte size of the record's file. Zeros when there is no file.
    pub fn image_metrics(&self, record: &ImageRecord) -> ImageMetrics {
        match self.resolve_existing_path(record) {
            Some(path) => ImageMetrics::from_file(&path),
            None => ImageMetrics::default(),
        }
    }

    /// Cleanup after the record's row has been deleted.
    ///
    /// Only the canonical path is checked; a file still sitting in a legacy
    /// layout is left alone. Failures are logged and swallowed. Returns
    /// whether a file was removed.
    pub fn on_record_deleted(&self, record: &ImageRecord) -> bool {
        let path = self.resolver.canonical_path(record);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(id = record.id, path = %path.display(), "removed image file");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(id = record.id, path = %path.display(), "no image file to remove");
                false
            }
            Err(e) => {
                warn!(
                    id = record.id,
                    path = %path.display(),
                    error = %e,
                    "failed to remove image file after record deletion"
                );
                false
            }
        }
    }

    /// Delete the record's row, then its file.
    ///
    /// Returns the deleted record, or `None` if it did not exist. File
    /// cleanup never fails the deletion.
    pub fn delete_record(&self, library: &Library, id: i64) -> Result<Option<ImageRecord>> {
        let Some(record) = library.get_image(id)? else {
            return Ok(None);
        };
        if !library.delete_image(id)? {
            return Ok(None);
        }

        self.on_record_deleted(&record);
        Ok(Some(record))
    }

    /// Insert a record and write its bytes to the canonical path.
    ///
    /// If the file cannot be written the row is removed again.
    pub fn store_bytes(
        &self,
        library: &Library,
        image: &NewImage,
        bytes: &[u8],
        stamp: &Stamp,
    ) -> Result<ImageRecord> {
        let record = library.insert_image(image, stamp)?;

        let written = self.resolver.save_path(&record).and_then(|path| {
            if let Err(source) = fs::write(&path, bytes) {
                // Drop whatever part of the file made it to disk
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "could not remove partial file");
                    }
                }
                return Err(ImageError::Io { path, source });
            }
            Ok(path)
        });

        match written {
            Ok(path) => {
                info!(id = record.id, path = %path.display(), bytes = bytes.len(), "stored image");
                Ok(record)
            }
            Err(e) => {
                if let Err(del) = library.delete_image(record.id) {
                    warn!(id = record.id, error = %del, "could not roll back record after failed write");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaConfig;
    use chrono::Utc;
    use tempfile::TempDir;

    fn setup() -> (RecordLifecycle, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(&MediaConfig {
            root: dir.path().join("media"),
        });
        std::fs::create_dir_all(dir.path().join("media")).unwrap();
        (RecordLifecycle::new(resolver), dir)
    }

    fn record(id: i64, hash: &str, name: &str, tag: &str) -> ImageRecord {
        ImageRecord {
            id,
            tag: if tag.is_empty() { None } else { Some(tag.to_string()) },
            file_name: name.to_string(),
            file_hash: hash.to_string(),
            created: Utc::now(),
            modified: None,
            created_by: None,
            modified_by: None,
        }
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        let img: image::RgbImage = image::ImageBuffer::new(width, height);
        img.save_with_format(path, image::ImageFormat::Png).unwrap();
    }

    #[test]
    fn canonical_file_is_returned_directly() {
        let (lifecycle, _dir) = setup();
        let rec = record(1, "aa", "a.png", "avatars");
        let path = lifecycle.save_path(&rec).unwrap();
        fs::write(&path, b"data").unwrap();

        assert_eq!(lifecycle.resolve(&rec), Resolution::Canonical(path));
    }

    #[test]
    fn untagged_legacy_file_is_already_canonical() {
        let (lifecycle, _dir) = setup();
        let rec = record(5, "abc123", "x.jpg", "");
        let legacy = lifecycle.resolver().legacy_path(&rec);
        fs::write(&legacy, b"jpeg").unwrap();

        // With no tag both layouts coincide, so the first call finds it in place
        assert_eq!(lifecycle.resolve(&rec), Resolution::Canonical(legacy.clone()));
        assert_eq!(lifecycle.resolve_existing_path(&rec), Some(legacy.clone()));
        assert!(legacy.exists());
    }

    #[test]
    fn legacy_file_is_migrated_once() {
        let (lifecycle, _dir) = setup();
        let rec = record(5, "abc123", "x.jpg", "avatars");
        let legacy = lifecycle.resolver().legacy_path(&rec);
        let canonical = lifecycle.resolver().canonical_path(&rec);
        fs::write(&legacy, b"jpeg").unwrap();

        assert_eq!(lifecycle.resolve(&rec), Resolution::Migrated(canonical.clone()));
        assert!(canonical.exists());
        assert!(!legacy.exists());
        assert_eq!(fs::read(&canonical).unwrap(), b"jpeg");

        // Later lookups go straight to the canonical path
        assert_eq!(lifecycle.resolve(&rec), Resolution::Canonical(canonical.clone()));
        assert_eq!(lifecycle.resolve_existing_path(&rec), Some(canonical));
    }

    #[test]
    fn racing_migration_treats_missing_source_as_done() {
        let (lifecycle, _dir) = setup();
        let rec = record(5, "abc123", "x.jpg", "avatars");
        let legacy = lifecycle.resolver().legacy_path(&rec);
        let canonical = lifecycle.resolver().canonical_path(&rec);
        fs::write(&legacy, b"jpeg").unwrap();

        // Two requests both saw the legacy file; the first one wins the rename
        let first = lifecycle.migrate(&rec, legacy.clone(), &canonical);
        let second = lifecycle.migrate(&rec, legacy.clone(), &canonical);

        assert_eq!(first, Some(Resolution::Migrated(canonical.clone())));
        assert_eq!(second, Some(Resolution::Canonical(canonical.clone())));
        assert!(canonical.exists());
        assert!(!legacy.exists());
    }

    #[test]
    fn vanished_source_with_no_target_is_missing() {
        let (lifecycle, _dir) = setup();
        let rec = record(6, "bb", "x.jpg", "avatars");
        let legacy = lifecycle.resolver().legacy_path(&rec);
        let canonical = lifecycle.resolver().canonical_path(&rec);

        assert_eq!(lifecycle.migrate(&rec, legacy, &canonical), None);
    }

    #[cfg(unix)]
    #[test]
    fn failed_migration_serves_legacy_path() {
        let (lifecycle, dir) = setup();
        let rec = record(7, "cc", "x.jpg", "locked");
        let legacy = lifecycle.resolver().legacy_path(&rec);
        fs::write(&legacy, b"jpeg").unwrap();

        // A plain file where the tag directory should be blocks the move
        fs::write(dir.path().join("media").join("locked"), b"").unwrap();

        assert_eq!(lifecycle.resolve(&rec), Resolution::Legacy(legacy.clone()));
        assert!(legacy.exists());
    }

    #[test]
    fn no_file_anywhere() {
        let (lifecycle, _dir) = setup();
        let rec = record(8, "dd", "x.jpg", "avatars");

        assert_eq!(lifecycle.resolve(&rec), Resolution::Missing);
        assert_eq!(lifecycle.resolve_existing_path(&rec), None);
        assert_eq!(lifecycle.image_metrics(&rec), ImageMetrics::default());
    }

    #[test]
    fn metrics_read_header_and_size() {
        let (lifecycle, _dir) = setup();
        let rec = record(9, "ee", "pic.png", "avatars");
        let path = lifecycle.save_path(&rec).unwrap();
        write_png(&path, 12, 5);

        let metrics = lifecycle.image_metrics(&rec);
        assert_eq!((metrics.width, metrics.height), (12, 5));
        assert_eq!(metrics.size_bytes, fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn metrics_migrate_legacy_file() {
        let (lifecycle, _dir) = setup();
        let rec = record(10, "ff", "pic.png", "avatars");
        let legacy = lifecycle.resolver().legacy_path(&rec);
        write_png(&legacy, 2, 2);

        let metrics = lifecycle.image_metrics(&rec);
        assert_eq!((metrics.width, metrics.height), (2, 2));
        assert!(lifecycle.resolver().canonical_path(&rec).exists());
        assert!(!legacy.exists());
    }

    #[test]
    fn delete_hook_removes_canonical_file() {
        let (lifecycle, _dir) = setup();
        let rec = record(11, "gg", "a.png", "avatars");
        let path = lifecycle.save_path(&rec).unwrap();
        fs::write(&path, b"data").unwrap();

        assert!(lifecycle.on_record_deleted(&rec));
        assert!(!path.exists());

        // Second run finds nothing and is not an error
        assert!(!lifecycle.on_record_deleted(&rec));
    }

    #[test]
    fn delete_hook_leaves_legacy_file() {
        let (lifecycle, _dir) = setup();
        let rec = record(12, "hh", "a.png", "avatars");
        let legacy = lifecycle.resolver().legacy_path(&rec);
        fs::write(&legacy, b"data").unwrap();

        assert!(!lifecycle.on_record_deleted(&rec));
        assert!(legacy.exists());
    }

    #[test]
    fn delete_record_removes_row_then_file() {
        let (lifecycle, _dir) = setup();
        let library = Library::open_in_memory().unwrap();
        let rec = lifecycle
            .store_bytes(
                &library,
                &NewImage::new("a.png", "ii").with_tag("avatars"),
                b"bytes",
                &Stamp::system(),
            )
            .unwrap();
        let path = lifecycle.resolver().canonical_path(&rec);
        assert!(path.exists());

        let deleted = lifecycle.delete_record(&library, rec.id).unwrap();
        assert_eq!(deleted.map(|r| r.id), Some(rec.id));
        assert!(library.get_image(rec.id).unwrap().is_none());
        assert!(!path.exists());

        assert_eq!(lifecycle.delete_record(&library, rec.id).unwrap(), None);
    }

    #[test]
    fn delete_record_without_file_succeeds() {
        let (lifecycle, _dir) = setup();
        let library = Library::open_in_memory().unwrap();
        let rec = library
            .insert_image(&NewImage::new("a.png", "jj"), &Stamp::system())
            .unwrap();

        let deleted = lifecycle.delete_record(&library, rec.id).unwrap();
        assert!(deleted.is_some());
        assert_eq!(library.image_count().unwrap(), 0);
    }

    #[test]
    fn store_bytes_writes_to_canonical_path() {
        let (lifecycle, _dir) = setup();
        let library = Library::open_in_memory().unwrap();
        let rec = lifecycle
            .store_bytes(
                &library,
                &NewImage::new("scan", "kk").with_tag("docs"),
                b"raw",
                &Stamp::system(),
            )
            .unwrap();

        let path = lifecycle.resolve_existing_path(&rec).unwrap();
        assert!(path.ends_with(format!("docs/{}_kk.", rec.id)));
        assert_eq!(fs::read(path).unwrap(), b"raw");
    }

    #[test]
    fn store_bytes_rolls_back_row_on_failure() {
        let (lifecycle, dir) = setup();
        let library = Library::open_in_memory().unwrap();
        fs::write(dir.path().join("media").join("blocked"), b"").unwrap();

        let result = lifecycle.store_bytes(
            &library,
            &NewImage::new("a.png", "ll").with_tag("blocked"),
            b"bytes",
            &Stamp::system(),
        );
        assert!(matches!(result, Err(ImageError::CreateDir { .. })));
        assert_eq!(library.image_count().unwrap(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn store_bytes_removes_partial_file_on_failed_write() {
        let (lifecycle, dir) = setup();
        let library = Library::open_in_memory().unwrap();

        // The first record gets id 1; make its canonical path a full disk
        let target = dir.path().join("media").join("full").join("1_mm.png");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink("/dev/full", &target).unwrap();

        let result = lifecycle.store_bytes(
            &library,
            &NewImage::new("a.png", "mm").with_tag("full"),
            b"bytes",
            &Stamp::system(),
        );
        assert!(matches!(result, Err(ImageError::Io { .. })));
        assert_eq!(library.image_count().unwrap(), 0);
        assert!(fs::symlink_metadata(&target).is_err());
    }
}
