//! Registry trait and network-activity observer seam

#[cfg(test)]
use mockall::automock;

use crate::version::advisory::Advisory;
use crate::version::error::RegistryError;

/// Observer for in-flight registry request counting.
///
/// Side effect only: implementations must never influence request results
/// or control flow. The client signals `request_started` before a fetch
/// and `request_ended` when it settles, success or failure.
pub trait ActivityObserver: Send + Sync {
    fn request_started(&self);
    fn request_ended(&self);
}

/// Observer that ignores every signal.
pub struct NullActivity;

impl ActivityObserver for NullActivity {
    fn request_started(&self) {}
    fn request_ended(&self) {}
}

/// The two query types the npm registry answers.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait NpmRegistryApi: Send + Sync {
    /// Latest published version of `package_name`.
    ///
    /// `Ok(None)` means the registry confirmed the package does not exist,
    /// which is a stable, cacheable answer.
    async fn latest_version(&self, package_name: &str)
    -> Result<Option<String>, RegistryError>;

    /// Advisories affecting `package_name` at exactly `version`.
    async fn advisories(
        &self,
        package_name: &str,
        version: &str,
    ) -> Result<Vec<Advisory>, RegistryError>;
}
