//! Workspace manifest discovery for the bulk prewarm

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::MAX_WORKSPACE_MANIFESTS;
use crate::parser::package_json::parse_dependencies;

/// Collects the deduplicated dependency names declared across every
/// `package.json` below `roots`, skipping installed packages under
/// `node_modules` and reading at most [`MAX_WORKSPACE_MANIFESTS`] files.
/// Unreadable or malformed manifests are skipped.
pub fn collect_dependency_names(roots: &[PathBuf]) -> Vec<String> {
    let mut names = BTreeSet::new();
    let mut manifests_read = 0usize;

    'roots: for root in roots {
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| !is_node_modules(entry.path()))
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() || entry.file_name() != "package.json" {
                continue;
            }
            if manifests_read >= MAX_WORKSPACE_MANIFESTS {
                break 'roots;
            }
            manifests_read += 1;

            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let Some(dependencies) = parse_dependencies(&content) else {
                continue;
            };
            for dependency in dependencies {
                names.insert(dependency.name);
            }
        }
    }

    debug!(
        "collected {} dependency names from {} manifests",
        names.len(),
        manifests_read
    );
    names.into_iter().collect()
}

fn is_node_modules(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == "node_modules")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, content: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("package.json"), content).unwrap();
    }

    #[test]
    fn collects_deduplicated_names_across_manifests() {
        let workspace = TempDir::new().unwrap();
        write_manifest(
            workspace.path(),
            r#"{"dependencies": {"react": "^18.0.0", "left-pad": "1.0.0"}}"#,
        );
        write_manifest(
            &workspace.path().join("packages/app"),
            r#"{"dependencies": {"react": "^18.2.0"}, "devDependencies": {"typescript": "~5.4.0"}}"#,
        );

        let names = collect_dependency_names(&[workspace.path().to_path_buf()]);

        assert_eq!(names, vec!["left-pad", "react", "typescript"]);
    }

    #[test]
    fn skips_manifests_under_node_modules() {
        let workspace = TempDir::new().unwrap();
        write_manifest(workspace.path(), r#"{"dependencies": {"react": "^18.0.0"}}"#);
        write_manifest(
            &workspace.path().join("node_modules/lodash"),
            r#"{"dependencies": {"hidden-dep": "1.0.0"}}"#,
        );

        let names = collect_dependency_names(&[workspace.path().to_path_buf()]);

        assert_eq!(names, vec!["react"]);
    }

    #[test]
    fn skips_malformed_manifests() {
        let workspace = TempDir::new().unwrap();
        write_manifest(workspace.path(), r#"{"dependencies": {"#);
        write_manifest(
            &workspace.path().join("sub"),
            r#"{"dependencies": {"react": "^18.0.0"}}"#,
        );

        let names = collect_dependency_names(&[workspace.path().to_path_buf()]);

        assert_eq!(names, vec!["react"]);
    }

    #[test]
    fn empty_roots_yield_no_names() {
        assert!(collect_dependency_names(&[]).is_empty());
    }
}
