use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::audit::Stamp;
use super::data::{ImageRecord, NewImage};
use crate::error::{ImageError, Result};

const SELECT_COLUMNS: &str =
    "id, tag, file_name, file_hash, created, modified, created_by, modified_by";

/// The Library manages the SQLite image catalog.
/// It stores one row per image; the bytes themselves live under the media root.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
}

impl Library {
    /// Open (or create) the catalog database at `db_path` and initialize the schema.
    pub fn open(db_path: &Path) -> Result<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ImageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(db_path)?;
        info!(path = %db_path.display(), "database opened");

        let mut library = Library {
            conn,
            db_path: db_path.to_path_buf(),
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Private in-memory catalog, gone when dropped.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut library = Library {
            conn,
            db_path: PathBuf::from(":memory:"),
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Initialize the database schema.
    /// Creates the table and indexes if they don't exist.
    fn init_schema(&mut self) -> SqlResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS image_manager (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                tag             TEXT,
                file_name       TEXT NOT NULL,
                file_hash       TEXT NOT NULL,
                created         TEXT NOT NULL,
                modified        TEXT
            )",
            [],
        )?;

        // Audit columns were added after the first release.
        // If the column already exists the ALTER fails and is ignored.
        let _ = self.conn.execute(
            "ALTER TABLE image_manager ADD COLUMN created_by INTEGER DEFAULT NULL",
            [],
        );
        let _ = self.conn.execute(
            "ALTER TABLE image_manager ADD COLUMN modified_by INTEGER DEFAULT NULL",
            [],
        );

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_image_manager_tag
             ON image_manager(tag)",
            [],
        )?;

        debug!("database schema initialized");

        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Get a count of images in the catalog
    pub fn image_count(&self) -> SqlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM image_manager", [], |row| row.get(0))
    }

    /// Insert a new image row.
    /// `created` and `modified` both come from the stamp.
    pub fn insert_image(&self, image: &NewImage, stamp: &Stamp) -> Result<ImageRecord> {
        image.validate()?;

        self.conn.execute(
            "INSERT INTO image_manager
                (tag, file_name, file_hash, created, modified, created_by, modified_by)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?5)",
            params![
                image.tag.as_deref().filter(|t| !t.is_empty()),
                image.file_name,
                image.file_hash,
                stamp.at,
                stamp.by,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!(id, file_name = %image.file_name, "image inserted");

        Ok(ImageRecord {
            id,
            tag: image.tag.clone().filter(|t| !t.is_empty()),
            file_name: image.file_name.clone(),
            file_hash: image.file_hash.clone(),
            created: stamp.at,
            modified: Some(stamp.at),
            created_by: stamp.by,
            modified_by: stamp.by,
        })
    }

    /// Fetch a single image by ID
    pub fn get_image(&self, id: i64) -> SqlResult<Option<ImageRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM image_manager WHERE id = ?1"),
                [id],
                row_to_image,
            )
            .optional()
    }

    /// Persist changes to tag, file name and hash.
    ///
    /// The stored file is not moved: changing any of these fields changes
    /// the record's canonical path.
    pub fn update_image(&self, record: &mut ImageRecord, stamp: &Stamp) -> Result<()> {
        record.validate()?;

        let changed = self.conn.execute(
            "UPDATE image_manager
             SET tag = ?1, file_name = ?2, file_hash = ?3, modified = ?4, modified_by = ?5
             WHERE id = ?6",
            params![
                record.tag.as_deref().filter(|t| !t.is_empty()),
                record.file_name,
                record.file_hash,
                stamp.at,
                stamp.by,
                record.id,
            ],
        )?;

        if changed == 0 {
            return Err(ImageError::NotFound(record.id));
        }

        record.modified = Some(stamp.at);
        record.modified_by = stamp.by;
        Ok(())
    }

    /// Delete an image row. Returns false if no such row existed.
    pub fn delete_image(&self, id: i64) -> SqlResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM image_manager WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    /// Get all images, oldest first
    pub fn all_images(&self) -> SqlResult<Vec<ImageRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SELECT_COLUMNS} FROM image_manager ORDER BY id"))?;

        let images = stmt
            .query_map([], row_to_image)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(images)
    }

    /// Get images under one tag. An empty tag selects untagged images.
    pub fn images_with_tag(&self, tag: &str) -> SqlResult<Vec<ImageRecord>> {
        let sql = if tag.is_empty() {
            format!(
                "SELECT {SELECT_COLUMNS} FROM image_manager
                 WHERE tag IS NULL OR tag = '' ORDER BY id"
            )
        } else {
            format!("SELECT {SELECT_COLUMNS} FROM image_manager WHERE tag = ?1 ORDER BY id")
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = if tag.is_empty() {
            stmt.query_map([], row_to_image)?
                .collect::<SqlResult<Vec<_>>>()?
        } else {
            stmt.query_map([tag], row_to_image)?
                .collect::<SqlResult<Vec<_>>>()?
        };
        Ok(rows)
    }
}

fn row_to_image(row: &Row<'_>) -> SqlResult<ImageRecord> {
    Ok(ImageRecord {
        id: row.get(0)?,
        tag: row.get(1)?,
        file_name: row.get(2)?,
        file_hash: row.get(3)?,
        created: row.get(4)?,
        modified: row.get(5)?,
        created_by: row.get(6)?,
        modified_by: row.get(7)?,
    })
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}
