//! Segment file naming
//!
//! Segments are named `<prefix>-<number>.<extension>` with a zero-padded,
//! strictly increasing number. Replay walks them in number order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::errors::{JournalError, JournalResult};

/// Width of the zero-padded segment number.
const NUMBER_WIDTH: usize = 10;

/// File name of segment `number`.
pub fn segment_file_name(prefix: &str, number: u64, extension: &str) -> String {
    format!("{}-{:0width$}.{}", prefix, number, extension, width = NUMBER_WIDTH)
}

/// Parses the segment number out of a file name, if it is one of ours.
pub fn parse_segment_number(file_name: &str, prefix: &str, extension: &str) -> Option<u64> {
    let stem = file_name
        .strip_prefix(prefix)?
        .strip_prefix('-')?
        .strip_suffix(extension)?
        .strip_suffix('.')?;
    if stem.len() != NUMBER_WIDTH || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Lists the segments in `dir`, sorted by number.
pub fn list_segments(dir: &Path, prefix: &str, extension: &str) -> JournalResult<Vec<(u64, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(JournalError::io_failed(
                format!("Failed to list journal directory: {}", dir.display()),
                e,
            ))
        }
    };

    let mut segments = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            JournalError::io_failed(format!("Failed to read entry in {}", dir.display()), e)
        })?;
        let name = entry.file_name();
        if let Some(number) = name
            .to_str()
            .and_then(|n| parse_segment_number(n, prefix, extension))
        {
            segments.push((number, entry.path()));
        }
    }
    segments.sort_by_key(|(number, _)| *number);
    Ok(segments)
}
