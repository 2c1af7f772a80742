use std::path::Path;

pub const DISPLAY_SEGMENTS: usize = 7;

/// Keeps the last `segments` components of a path for status lines.
pub fn shorten_path(path: &Path, segments: usize) -> String {
    let full = path.to_string_lossy().replace('\\', "/");
    let parts: Vec<&str> = full.split('/').collect();
    if parts.len() > segments {
        parts[parts.len() - segments..].join("/")
    } else {
        full
    }
}

pub fn display_path(path: &Path) -> String {
    shorten_path(path, DISPLAY_SEGMENTS)
}
