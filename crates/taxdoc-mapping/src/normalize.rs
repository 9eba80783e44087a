//! Field path normalization
//!
//! Physical paths look like `topmostSubform[0].Page1[0].f1_04[0]`. Only the
//! trailing field code (`f1_04`) is stable across template revisions; the
//! subform chain and `[n]` index suffixes are not.

/// Short field code used as the stable identity of a field path
#[must_use]
pub fn normalize_field_path(path: &str) -> String {
    path.rsplit('.')
        .map(strip_index_tokens)
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
}

/// Drop every `[...]` token from a segment
fn strip_index_tokens(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut depth = 0usize;
    for ch in segment.chars() {
        match ch {
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}
