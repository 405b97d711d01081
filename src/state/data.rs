/// Shared data structures for the image catalog
///
/// These structs represent the rows that flow between
/// the database layer and the file storage layer.
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ImageError, Result};

/// Maximum length of an original file name
pub const FILE_NAME_MAX: usize = 128;
/// Maximum length of a stored content hash
pub const FILE_HASH_MAX: usize = 32;
/// Maximum length of a tag
pub const TAG_MAX: usize = 128;

/// Represents a single image in the catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    /// Unique database ID, assigned on insert
    pub id: i64,
    /// Logical subfolder; empty means the media root itself
    pub tag: Option<String>,
    /// Original upload name (e.g., "holiday.jpg"), only used for its extension
    pub file_name: String,
    /// Content hash, part of the stored file name
    pub file_hash: String,
    pub created: DateTime<Utc>,
    pub modified: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub modified_by: Option<i64>,
}

impl ImageRecord {
    /// Tag as a plain string, empty when unset
    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or("")
    }

    pub fn validate(&self) -> Result<()> {
        validate_fields(self.tag.as_deref(), &self.file_name, &self.file_hash)
    }
}

/// Metadata supplied by the caller when a new image is added
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewImage {
    pub tag: Option<String>,
    pub file_name: String,
    pub file_hash: String,
}

impl NewImage {
    pub fn new(file_name: impl Into<String>, file_hash: impl Into<String>) -> Self {
        Self {
            tag: None,
            file_name: file_name.into(),
            file_hash: file_hash.into(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.tag = if tag.is_empty() { None } else { Some(tag) };
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_fields(self.tag.as_deref(), &self.file_name, &self.file_hash)
    }
}

fn validate_fields(tag: Option<&str>, file_name: &str, file_hash: &str) -> Result<()> {
    if file_name.is_empty() {
        return Err(invalid("file_name", "cannot be blank".to_string()));
    }
    if file_hash.is_empty() {
        return Err(invalid("file_hash", "cannot be blank".to_string()));
    }
    check_length("file_name", file_name, FILE_NAME_MAX)?;
    check_length("file_hash", file_hash, FILE_HASH_MAX)?;
    if let Some(tag) = tag {
        check_length("tag", tag, TAG_MAX)?;
    }
    Ok(())
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(invalid(
            field,
            format!("should contain at most {} characters, got {}", max, len),
        ));
    }
    Ok(())
}

fn invalid(field: &'static str, reason: String) -> ImageError {
    ImageError::Invalid { field, reason }
}
