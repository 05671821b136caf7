//! Advisory normalization and severity ranking

use serde::Deserialize;

/// Advisory severity. The derived order is the ranking order used for
/// picking the worst advisory: `Unknown` deliberately ranks below `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Unknown,
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Unknown => "unknown",
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Maps a raw severity field into the bounded enum. Anything outside
    /// the four known levels (including garbage) is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "moderate" => Severity::Moderate,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Unknown,
        }
    }
}

/// Advisory entry as it appears in the bulk endpoint response body.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAdvisory {
    /// Arrives as a number or a string depending on the advisory source
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub vulnerable_versions: Option<String>,
    #[serde(default)]
    pub patched_versions: Option<String>,
}

/// A security advisory scoped to one package, normalized for ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub severity: Severity,
    pub vulnerable_versions: Option<String>,
    pub patched_versions: Option<String>,
}

/// Normalizes one wire advisory into the canonical shape.
pub fn normalize_advisory(raw: RawAdvisory) -> Advisory {
    let id = raw.id.map(|id| match id {
        serde_json::Value::String(id) => id,
        other => other.to_string(),
    });

    Advisory {
        id,
        title: raw.title,
        url: raw.url,
        severity: raw
            .severity
            .as_deref()
            .map(Severity::parse)
            .unwrap_or(Severity::Unknown),
        vulnerable_versions: raw.vulnerable_versions,
        patched_versions: raw.patched_versions,
    }
}

/// Highest severity in a non-empty advisory list.
///
/// Folds from `Low`, keeping the greatest rank seen; a list carrying only
/// `Unknown` severities therefore ranks `Low`. Callers check for emptiness
/// before ranking.
pub fn highest_severity(advisories: &[Advisory]) -> Severity {
    advisories
        .iter()
        .fold(Severity::Low, |acc, advisory| acc.max(advisory.severity))
}
