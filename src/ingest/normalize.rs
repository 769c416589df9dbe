//! Column key normalization.

/// Trim, lowercase and snake_case a column name.
///
/// Runs of whitespace, hyphens and dots collapse to a single underscore.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut pending_sep = false;

    for c in key.trim().trim_start_matches('\u{feff}').chars() {
        if c.is_whitespace() || c == '-' || c == '.' || c == '_' {
            pending_sep = !out.is_empty();
            continue;
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.extend(c.to_lowercase());
    }

    out
}
