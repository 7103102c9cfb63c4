//! Path normalization for selector matching

use std::path::Path;

/// Convert a path into the slash-separated relative form selectors match
/// against.
///
/// Backslashes become `/`, empty and `.` segments are dropped, `..` pops the
/// previous segment when there is one, and any root or drive prefix is
/// removed.
pub fn normalize_path(path: impl AsRef<Path>) -> String {
    let raw = path.as_ref().to_string_lossy().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for (position, segment) in raw.split('/').enumerate() {
        match segment {
            "" | "." => {}
            // Windows drive prefix such as `C:`
            s if position == 0 && s.len() == 2 && s.ends_with(':') => {}
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            s => segments.push(s),
        }
    }

    segments.join("/")
}

/// Normalize `path` relative to `root`, falling back to the full path when
/// it does not live under `root`.
pub fn relative_to(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) => normalize_path(relative),
        Err(_) => normalize_path(path),
    }
}
