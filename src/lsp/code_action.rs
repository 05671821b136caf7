//! Quick fixes for outdated-dependency diagnostics

use std::collections::HashMap;

use serde::Deserialize;
use tower_lsp::lsp_types::{
    CodeAction, CodeActionKind, CodeActionOrCommand, Diagnostic, NumberOrString, TextEdit, Url,
    WorkspaceEdit,
};

use crate::lsp::diagnostics::{CODE_OUTDATED, DIAGNOSTIC_SOURCE};

/// Payload attached to outdated diagnostics (`Diagnostic::data`).
#[derive(Debug, Deserialize)]
struct OutdatedData {
    name: String,
    replacement: String,
}

/// One QuickFix per outdated diagnostic, replacing the version literal
/// with the precomputed replacement text. Vulnerability diagnostics get no
/// automated fix: choosing a safe version is the author's call.
pub fn build_quick_fixes(uri: &Url, diagnostics: &[Diagnostic]) -> Vec<CodeActionOrCommand> {
    diagnostics
        .iter()
        .filter_map(|diagnostic| {
            if diagnostic.source.as_deref() != Some(DIAGNOSTIC_SOURCE) {
                return None;
            }
            if diagnostic.code != Some(NumberOrString::String(CODE_OUTDATED.to_string())) {
                return None;
            }
            let data: OutdatedData = serde_json::from_value(diagnostic.data.clone()?).ok()?;

            let edit = TextEdit {
                range: diagnostic.range,
                new_text: data.replacement.clone(),
            };
            let mut changes = HashMap::new();
            changes.insert(uri.clone(), vec![edit]);

            Some(CodeActionOrCommand::CodeAction(CodeAction {
                title: format!("Update {} to {}", data.name, data.replacement),
                kind: Some(CodeActionKind::QUICKFIX),
                diagnostics: Some(vec![diagnostic.clone()]),
                is_preferred: Some(true),
                edit: Some(WorkspaceEdit {
                    changes: Some(changes),
                    ..Default::default()
                }),
                ..Default::default()
            }))
        })
        .collect()
}
