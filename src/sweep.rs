//! Whole-catalog maintenance: bulk legacy migration and orphan detection.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::state::library::Library;
use crate::storage::lifecycle::{RecordLifecycle, Resolution};
use crate::storage::resolver::{Layout, PathResolver};

/// Outcome of resolving every record once
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub canonical: usize,
    pub migrated: usize,
    /// Found in a legacy layout but could not be moved
    pub stuck_legacy: usize,
    pub missing: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.canonical + self.migrated + self.stuck_legacy + self.missing
    }
}

/// Resolve every record in the catalog, migrating legacy files as a side effect.
pub fn migrate_all(library: &Library, lifecycle: &RecordLifecycle) -> Result<SweepReport> {
    let mut report = SweepReport::default();

    for record in library.all_images()? {
        match lifecycle.resolve(&record) {
            Resolution::Canonical(_) => report.canonical += 1,
            Resolution::Migrated(_) => report.migrated += 1,
            Resolution::Legacy(path) => {
                warn!(id = record.id, path = %path.display(), "image still in legacy layout");
                report.stuck_legacy += 1;
            }
            Resolution::Missing => report.missing += 1,
        }
    }

    info!(
        canonical = report.canonical,
        migrated = report.migrated,
        stuck_legacy = report.stuck_legacy,
        missing = report.missing,
        "migration sweep complete"
    );

    Ok(report)
}

/// Files under the media root named like stored images that no record claims.
///
/// Typical source: a record deleted before its legacy file was ever migrated.
/// Nothing is deleted here.
pub fn find_orphans(library: &Library, resolver: &PathResolver) -> Result<Vec<PathBuf>> {
    let mut claimed = HashSet::new();
    for record in library.all_images()? {
        for layout in Layout::CANDIDATES {
            claimed.insert(normalize(&resolver.path_for(layout, &record)));
        }
    }

    let mut orphans = Vec::new();

    // Walk the media root recursively
    for entry in WalkDir::new(resolver.media_root()).into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry, orphan list may be incomplete");
                continue;
            }
        };

        // Only process files (not directories)
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !is_stored_file_name(&name) {
            continue;
        }

        if !claimed.contains(&normalize(entry.path())) {
            orphans.push(entry.into_path());
        }
    }

    orphans.sort();
    if !orphans.is_empty() {
        info!(count = orphans.len(), "found orphaned image files");
    }

    Ok(orphans)
}

/// Resolve `.` and `..` lexically. Tags are stored unsanitized, so a
/// record's path can spell the same file differently than the walk does.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Matches `{id}_{hash}.{ext}` with a numeric id and a non-empty hash.
fn is_stored_file_name(name: &str) -> bool {
    let Some((id, rest)) = name.split_once('_') else {
        return false;
    };
    let Some(dot) = rest.rfind('.') else {
        return false;
    };
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) && dot > 0
}
