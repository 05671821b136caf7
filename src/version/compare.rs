//! Declared-version cleaning and version difference classification

use std::sync::LazyLock;

use regex::Regex;

/// Matches the leading numeric triple of a version string, anchored at the
/// start; trailing pre-release or build metadata is ignored.
static TRIPLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)").expect("triple regex is valid"));

/// Kind of difference between a declared version and the registry latest.
///
/// `Unknown` covers parse failure on either side as well as a latest that
/// is not numerically greater than the current version (callers filter
/// exact equality before diffing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionDiff {
    Patch,
    Minor,
    Major,
    Unknown,
}

impl VersionDiff {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionDiff::Patch => "patch",
            VersionDiff::Minor => "minor",
            VersionDiff::Major => "major",
            VersionDiff::Unknown => "unknown",
        }
    }
}

/// Strips exactly one leading `^` or `~` range operator; no-op otherwise.
pub fn clean_version_spec(spec: &str) -> &str {
    spec.strip_prefix(['^', '~']).unwrap_or(spec)
}

/// Parses the leading `major.minor.patch` triple of a version string.
pub fn parse_triple(version: &str) -> Option<(u64, u64, u64)> {
    let caps = TRIPLE_RE.captures(version)?;
    let major = caps[1].parse().ok()?;
    let minor = caps[2].parse().ok()?;
    let patch = caps[3].parse().ok()?;
    Some((major, minor, patch))
}

/// Classifies the difference between `current` and `latest` by comparing
/// the triples lexicographically.
pub fn diff_versions(current: &str, latest: &str) -> VersionDiff {
    let (Some(current), Some(latest)) = (parse_triple(current), parse_triple(latest)) else {
        return VersionDiff::Unknown;
    };

    if latest.0 > current.0 {
        VersionDiff::Major
    } else if latest.0 == current.0 && latest.1 > current.1 {
        VersionDiff::Minor
    } else if latest.0 == current.0 && latest.1 == current.1 && latest.2 > current.2 {
        VersionDiff::Patch
    } else {
        VersionDiff::Unknown
    }
}

/// Re-applies the range operator of `declared` onto `latest`, producing the
/// replacement text for an automated update.
///
/// Ex: `"^4.0.0"` + `"4.1.2"` -> `"^4.1.2"`
pub fn build_updated_version_spec(declared: &str, latest: &str) -> String {
    match declared.as_bytes().first() {
        Some(b'^') => format!("^{latest}"),
        Some(b'~') => format!("~{latest}"),
        _ => latest.to_string(),
    }
}
