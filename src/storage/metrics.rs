use std::fs;
use std::path::Path;

use image::ImageReader;
use serde::Serialize;
use tracing::debug;

/// Size units for display, base 1024
const SIZE_UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

/// Dimensions and size of a stored image. All zeros when no file exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImageMetrics {
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
}

impl ImageMetrics {
    /// Read metrics from a file on disk.
    ///
    /// Unreadable headers leave width/height at 0; a failed stat leaves the size at 0.
    pub fn from_file(path: &Path) -> Self {
        let (width, height) = probe_dimensions(path).unwrap_or((0, 0));
        let size_bytes = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "stat failed");
                0
            }
        };

        Self {
            width,
            height,
            size_bytes,
        }
    }

    /// Short human readable size, e.g. `512 B` or `1.50 KiB`.
    pub fn display_size(&self, decimals: usize) -> String {
        format_short_size(self.size_bytes, decimals)
    }
}

/// Width and height from the image header, without decoding pixels.
///
/// The format is sniffed from the content, so files with a wrong or
/// empty extension still probe correctly.
pub fn probe_dimensions(path: &Path) -> Option<(u32, u32)> {
    let result = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.into_dimensions());

    match result {
        Ok(dims) => Some(dims),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not read image dimensions");
            None
        }
    }
}

/// Format a byte count with binary units.
/// Plain bytes never get decimals.
pub fn format_short_size(bytes: u64, decimals: usize) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, SIZE_UNITS[0])
    } else {
        format!("{:.*} {}", decimals, value, SIZE_UNITS[unit])
    }
}
