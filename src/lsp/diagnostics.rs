//! Finding-to-diagnostic translation and incremental publishing

use std::sync::Mutex;

use serde_json::json;
use tower_lsp::Client;
use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range, Url,
};

use crate::parser::locate::locate_version_literal;
use crate::parser::types::DependencyDeclaration;
use crate::version::advisory::{Advisory, Severity};
use crate::version::compare::{VersionDiff, clean_version_spec};
use crate::version::scanner::{Finding, FindingSink};

pub const DIAGNOSTIC_SOURCE: &str = "depwatch";
pub const CODE_OUTDATED: &str = "depwatch.outdated";
pub const CODE_VULNERABLE: &str = "depwatch.vulnerable";

/// How urgently a version difference is surfaced.
fn diff_urgency(diff: VersionDiff) -> DiagnosticSeverity {
    match diff {
        VersionDiff::Major => DiagnosticSeverity::ERROR,
        VersionDiff::Minor => DiagnosticSeverity::WARNING,
        VersionDiff::Patch => DiagnosticSeverity::INFORMATION,
        VersionDiff::Unknown => DiagnosticSeverity::HINT,
    }
}

/// Same four-way mapping, applied to advisory severity.
fn advisory_urgency(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Critical | Severity::High => DiagnosticSeverity::ERROR,
        Severity::Moderate => DiagnosticSeverity::WARNING,
        Severity::Low => DiagnosticSeverity::INFORMATION,
        Severity::Unknown => DiagnosticSeverity::HINT,
    }
}

/// Converts a byte offset into an LSP position (UTF-16 columns).
fn offset_to_position(text: &str, offset: usize) -> Position {
    let prefix = &text[..offset];
    let line = prefix.bytes().filter(|&byte| byte == b'\n').count();
    let line_start = prefix.rfind('\n').map(|index| index + 1).unwrap_or(0);
    let character: usize = prefix[line_start..].chars().map(char::len_utf16).sum();

    Position {
        line: line as u32,
        character: character as u32,
    }
}

fn vulnerability_message(
    dependency: &DependencyDeclaration,
    advisories: &[Advisory],
    highest: Severity,
) -> String {
    let current = clean_version_spec(&dependency.version_spec);

    let titles = advisories
        .iter()
        .filter_map(|advisory| advisory.title.as_deref())
        .collect::<Vec<_>>()
        .join("; ");
    let patched = advisories
        .iter()
        .filter_map(|advisory| advisory.patched_versions.as_deref())
        .collect::<Vec<_>>()
        .join(", ");

    let mut parts = vec![format!(
        "Security vulnerabilities ({}) found in {}@{}.",
        highest.as_str(),
        dependency.name,
        current
    )];
    if !titles.is_empty() {
        parts.push(titles);
    }
    if !patched.is_empty() {
        parts.push(format!("Patched in: {patched}"));
    }
    parts.join(" ")
}

/// Builds the diagnostic for one finding, or `None` when the version
/// literal cannot be located in the document text (in which case no
/// diagnostic is shown for this dependency).
pub fn build_diagnostic(text: &str, finding: &Finding) -> Option<Diagnostic> {
    let (dependency, severity, message, code, data) = match finding {
        Finding::Outdated {
            dependency,
            diff,
            latest,
            replacement,
        } => (
            dependency,
            diff_urgency(*diff),
            format!(
                "Newer version available ({}): {} -> {}",
                diff.as_str(),
                dependency.version_spec,
                latest
            ),
            CODE_OUTDATED,
            // Carried for the quick fix; the replacement is precomputed so
            // the code action needs no registry access.
            Some(json!({
                "name": dependency.name,
                "latest": latest,
                "declared": dependency.version_spec,
                "replacement": replacement,
            })),
        ),
        Finding::Vulnerable {
            dependency,
            advisories,
            highest,
        } => (
            dependency,
            advisory_urgency(*highest),
            vulnerability_message(dependency, advisories, *highest),
            CODE_VULNERABLE,
            None,
        ),
    };

    let (start, end) = locate_version_literal(text, &dependency.name)?;

    Some(Diagnostic {
        range: Range {
            start: offset_to_position(text, start),
            end: offset_to_position(text, end),
        },
        severity: Some(severity),
        code: Some(NumberOrString::String(code.to_string())),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message,
        data,
        ..Default::default()
    })
}

/// Publishes findings for one document as they settle: each finding is
/// appended to the accumulated set, which is republished wholesale, so the
/// editor sees diagnostics stream in without waiting for slow lookups.
pub struct DiagnosticsPublisher {
    client: Client,
    uri: Url,
    text: String,
    published: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticsPublisher {
    pub fn new(client: Client, uri: Url, text: String) -> Self {
        Self {
            client,
            uri,
            text,
            published: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl FindingSink for DiagnosticsPublisher {
    async fn emit(&self, finding: Finding) {
        let Some(diagnostic) = build_diagnostic(&self.text, &finding) else {
            return;
        };

        let snapshot = {
            let mut published = self.published.lock().expect("diagnostics mutex poisoned");
            published.push(diagnostic);
            published.clone()
        };

        self.client
            .publish_diagnostics(self.uri.clone(), snapshot, None)
            .await;
    }
}
