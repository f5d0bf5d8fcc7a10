//! Buffer splicing and whole-file atomic writes.
//!
//! Spans always come from a [`SnippetLocator`](crate::locate::SnippetLocator)
//! run over the same buffer, so a splice cannot miss its target.

use crate::locate::Located;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Result of splicing a replacement into a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Splice {
    /// Content with the span replaced.
    Applied(String),
    /// The span already holds the replacement.
    Unchanged,
}

/// Replace `found` in `content` with `replacement`.
///
/// `found` must have been located in this same `content`.
pub fn splice(content: &str, found: Located<'_>, replacement: &str) -> Splice {
    if found.text == replacement {
        return Splice::Unchanged;
    }

    let mut updated = String::with_capacity(content.len() - found.text.len() + replacement.len());
    updated.push_str(&content[..found.start]);
    updated.push_str(replacement);
    updated.push_str(&content[found.end()..]);
    Splice::Applied(updated)
}

/// Whole-file atomic write: tempfile + fsync + rename.
///
/// Either the full write lands or the file is left as it was.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    // Same directory keeps the rename on one filesystem
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory")
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
