//! package.json dependency extraction

use indexmap::IndexMap;
use serde::Deserialize;

use crate::parser::types::DependencyDeclaration;

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    dependencies: IndexMap<String, serde_json::Value>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: IndexMap<String, serde_json::Value>,
}

/// Extracts the merged dependency set from manifest text.
///
/// `dependencies` and `devDependencies` are merged with devDependencies
/// taking precedence on a name collision; declaration order is preserved.
/// Entries whose version is not a string are skipped.
///
/// Returns `None` only for syntactically malformed JSON ("no dependencies
/// for this document"); a well-formed manifest without dependency sections
/// yields an empty list.
pub fn parse_dependencies(content: &str) -> Option<Vec<DependencyDeclaration>> {
    let value: serde_json::Value = serde_json::from_str(content).ok()?;
    let manifest: Manifest = serde_json::from_value(value).unwrap_or_default();

    let mut merged: IndexMap<String, String> = IndexMap::new();
    for (name, version) in manifest
        .dependencies
        .into_iter()
        .chain(manifest.dev_dependencies)
    {
        if let Some(version) = version.as_str() {
            merged.insert(name, version.to_string());
        }
    }

    Some(
        merged
            .into_iter()
            .map(|(name, version_spec)| DependencyDeclaration { name, version_spec })
            .collect(),
    )
}
