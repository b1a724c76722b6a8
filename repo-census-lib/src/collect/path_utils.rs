//! Path utilities for safe filesystem operations.

/// Turn a repository name such as `owner/name` into a single path component.
///
/// Separators and characters that are unsafe on common filesystems become `_`, and `..`
/// sequences are neutralized so the result can never escape its parent directory.
#[must_use]
pub fn sanitize_path_component(s: &str) -> String {
    let s = s.replace("..", "__");
    s.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_")
}
