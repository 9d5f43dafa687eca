//! Character-level helpers shared by the identity and URL modules.

/// Check if a character is allowed inside a single key segment.
pub fn is_segment_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'
}

/// Check if a character is allowed inside a flat key or folder path.
pub fn is_path_char(c: char) -> bool {
    is_segment_char(c) || c == '/'
}

/// Strictly validate one already-normalized segment.
///
/// Returns the reason on failure so callers can attach their own context.
pub fn check_segment(segment: &str) -> Result<(), String> {
    if segment.is_empty() {
        return Err("segment is empty".to_string());
    }
    if segment.contains('/') {
        return Err(format!("segment `{}` contains a path separator", segment));
    }
    if segment.contains("..") {
        return Err(format!("segment `{}` contains `..`", segment));
    }
    if let Some(c) = segment.chars().find(|c| !is_segment_char(*c)) {
        return Err(format!("segment `{}` contains disallowed character `{}`", segment, c));
    }
    Ok(())
}

/// Strictly validate a `/`-joined path of segments.
pub fn check_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("value is empty".to_string());
    }
    if let Some(c) = path.chars().find(|c| !is_path_char(*c)) {
        return Err(format!("contains disallowed character `{}`", c));
    }
    if path.starts_with('/') || path.ends_with('/') {
        return Err("must not start or end with `/`".to_string());
    }
    if path.contains("//") {
        return Err("must not contain `//`".to_string());
    }
    if path.contains("..") {
        return Err("must not contain `..`".to_string());
    }
    Ok(())
}
