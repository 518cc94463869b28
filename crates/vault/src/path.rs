//! Logical path normalisation.

/// Trim surrounding whitespace and every leading and trailing `/`.
///
/// Whitespace and slashes are stripped together, so `"/ a"` becomes `"a"` in
/// one pass.
///
/// Pure and idempotent; no other rewriting happens, so logical paths
/// (`secret/app`) and API-shaped paths (`secret/data/app`) both pass through
/// unchanged apart from trimming.
///
/// ```
/// use stepvault_vault::normalize_path;
///
/// assert_eq!(normalize_path("  /secret/app/ "), "secret/app");
/// ```
#[must_use]
pub fn normalize_path(path: &str) -> String {
    path.trim_matches(is_separator).to_string()
}

fn is_separator(c: char) -> bool {
    c == '/' || c.is_whitespace()
}

/// Join segments with `/`, normalising each one and skipping empty ones.
#[must_use]
pub fn join_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|segment| segment.trim_matches(is_separator))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
