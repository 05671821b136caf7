//! Dependency scan orchestration
//!
//! For every declared dependency two independent checks run through the
//! query cache: is a newer version published, and does the declared
//! version carry known advisories. Findings reach the sink in whatever
//! order the underlying fetches settle, never in declaration order; a
//! finding whose source document changed or closed in the meantime is
//! dropped rather than queued. Any failure below degrades to the absence
//! of a finding.

#[cfg(test)]
use mockall::automock;

use std::sync::Arc;

use futures::future::join_all;

use crate::parser::types::DependencyDeclaration;
use crate::version::advisory::{Advisory, Severity, highest_severity};
use crate::version::cache::QueryCache;
use crate::version::compare::{
    VersionDiff, build_updated_version_spec, clean_version_spec, diff_versions,
};

/// One classification produced by a scan pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// A newer version than the declared one is published.
    Outdated {
        dependency: DependencyDeclaration,
        diff: VersionDiff,
        latest: String,
        /// Declared spec with its range operator re-applied to `latest`,
        /// ready to splice into the manifest.
        replacement: String,
    },
    /// The declared version is affected by published advisories.
    Vulnerable {
        dependency: DependencyDeclaration,
        advisories: Vec<Advisory>,
        highest: Severity,
    },
}

/// Receives findings as they settle, in arbitrary order.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait FindingSink: Send + Sync {
    async fn emit(&self, finding: Finding);
}

/// Tells a settling check whether its originating document still matches
/// the content the scan started from.
#[cfg_attr(test, automock)]
pub trait ScanGuard: Send + Sync {
    fn is_current(&self) -> bool;
}

/// Runs both checks for every dependency concurrently and returns once all
/// of them have settled, however many produced findings.
pub async fn scan_dependencies(
    cache: QueryCache,
    dependencies: Vec<DependencyDeclaration>,
    guard: Arc<dyn ScanGuard>,
    sink: Arc<dyn FindingSink>,
) {
    let checks = dependencies.into_iter().map(|dependency| {
        let cache = cache.clone();
        let guard = guard.clone();
        let sink = sink.clone();
        async move {
            tokio::join!(
                check_freshness(&cache, &dependency, &*guard, &*sink),
                check_advisories(&cache, &dependency, &*guard, &*sink),
            );
        }
    });

    join_all(checks).await;
}

async fn check_freshness(
    cache: &QueryCache,
    dependency: &DependencyDeclaration,
    guard: &dyn ScanGuard,
    sink: &dyn FindingSink,
) {
    let current = clean_version_spec(&dependency.version_spec);

    let Some(latest) = cache.latest_version(&dependency.name).await else {
        return;
    };
    if latest == current {
        return;
    }
    if !guard.is_current() {
        return;
    }

    let finding = Finding::Outdated {
        diff: diff_versions(current, &latest),
        replacement: build_updated_version_spec(&dependency.version_spec, &latest),
        dependency: dependency.clone(),
        latest,
    };
    sink.emit(finding).await;
}

async fn check_advisories(
    cache: &QueryCache,
    dependency: &DependencyDeclaration,
    guard: &dyn ScanGuard,
    sink: &dyn FindingSink,
) {
    let current = clean_version_spec(&dependency.version_spec);

    let advisories = cache.advisories(&dependency.name, current).await;
    if advisories.is_empty() {
        return;
    }
    if !guard.is_current() {
        return;
    }

    let finding = Finding::Vulnerable {
        highest: highest_severity(&advisories),
        dependency: dependency.clone(),
        advisories,
    };
    sink.emit(finding).await;
}
