use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};

use crate::config::MediaConfig;
use crate::error::{ImageError, Result};
use crate::state::data::ImageRecord;

/// On-disk layouts a record's file may be found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `{root}/{tag}/{id}_{hash}.{ext}`, or directly under the root when untagged.
    Tagged,
    /// `{root}/{id}_{hash}.{ext}` regardless of tag. Files written before tags
    /// became subfolders.
    Flat,
}

impl Layout {
    /// Lookup order. The first entry is canonical, the rest are legacy layouts
    /// whose files get moved to the canonical location when found.
    pub const CANDIDATES: [Layout; 2] = [Layout::Tagged, Layout::Flat];

    pub fn is_canonical(self) -> bool {
        self == Self::CANDIDATES[0]
    }
}

/// Computes where a record's file lives under the media root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    media_root: PathBuf,
}

impl PathResolver {
    pub fn new(media: &MediaConfig) -> Self {
        Self {
            media_root: media.root.clone(),
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Directory new files for `tag` are written to, created if missing.
    ///
    /// Fails if the directory cannot be created, since any write into it
    /// would fail as well.
    pub fn save_directory(&self, tag: &str) -> Result<PathBuf> {
        let dir = self.tag_directory(tag);
        fs::create_dir_all(&dir).map_err(|source| ImageError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Canonical path for writing the record's file. Creates the directory.
    pub fn save_path(&self, record: &ImageRecord) -> Result<PathBuf> {
        Ok(self
            .save_directory(record.tag())?
            .join(stored_file_name(record)))
    }

    /// Canonical path without touching the filesystem.
    pub fn canonical_path(&self, record: &ImageRecord) -> PathBuf {
        self.path_for(Layout::CANDIDATES[0], record)
    }

    /// Pre-tag flat location of the record's file.
    pub fn legacy_path(&self, record: &ImageRecord) -> PathBuf {
        self.path_for(Layout::Flat, record)
    }

    pub fn path_for(&self, layout: Layout, record: &ImageRecord) -> PathBuf {
        let dir = match layout {
            Layout::Tagged => self.tag_directory(record.tag()),
            Layout::Flat => self.media_root.clone(),
        };
        dir.join(stored_file_name(record))
    }

    // The tag is appended as text, not joined as a path: a tag with
    // separators nests, and a leading separator does not escape the root.
    fn tag_directory(&self, tag: &str) -> PathBuf {
        if tag.is_empty() {
            return self.media_root.clone();
        }
        let mut dir = OsString::from(self.media_root.as_os_str());
        dir.push(MAIN_SEPARATOR_STR);
        dir.push(tag);
        PathBuf::from(dir)
    }
}

/// `{id}_{hash}.{ext}`. The dot is kept even when the extension is empty.
pub fn stored_file_name(record: &ImageRecord) -> String {
    format!(
        "{}_{}.{}",
        record.id,
        record.file_hash,
        file_extension(&record.file_name)
    )
}

/// Text after the last `.` of the final component of `file_name`, or "".
pub fn file_extension(file_name: &str) -> &str {
    let base = file_name.rsplit('/').next().unwrap_or(file_name);
    match base.rfind('.') {
        Some(dot) => &base[dot + 1..],
        None => "",
    }
}
