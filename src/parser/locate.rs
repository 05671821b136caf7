//! Byte-scan locator for version-string literals
//!
//! Diagnostics anchor to the version string as written, located by literal
//! text scanning rather than a syntax tree: the first occurrence of the
//! quoted package name, the next `:`, and the next quote pair after it.

/// Byte range (quotes excluded) of the version string declared for `name`.
///
/// Returns `None` when any scan step fails, in which case the caller emits
/// no diagnostic for this dependency.
pub fn locate_version_literal(text: &str, name: &str) -> Option<(usize, usize)> {
    let key = format!("\"{name}\"");
    let key_start = text.find(&key)?;
    let after_key = key_start + key.len();

    let colon = after_key + text[after_key..].find(':')?;
    let open = colon + text[colon..].find('"')?;
    let close = open + 1 + text[open + 1..].find('"')?;

    Some((open + 1, close))
}
