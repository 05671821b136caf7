//! npm registry client
//!
//! Two operations: latest published version (`GET /{name}/latest`) and
//! known advisories for one package version (the bulk advisory endpoint).
//! The client does not retry; it classifies every outcome so the cache can
//! decide what is stable (a confirmed 404, a parsed advisory list) and
//! what is transient (everything in [`RegistryError`]).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::config::{DEFAULT_REGISTRY_URL, FETCH_TIMEOUT_MS};
use crate::version::advisory::{Advisory, RawAdvisory, normalize_advisory};
use crate::version::error::RegistryError;
use crate::version::registry::{ActivityObserver, NpmRegistryApi, NullActivity};

const ADVISORIES_BULK_PATH: &str = "/-/npm/v1/security/advisories/bulk";

#[derive(Debug, Deserialize)]
struct LatestResponse {
    version: String,
}

pub struct NpmRegistry {
    client: reqwest::Client,
    base_url: String,
    activity: Arc<dyn ActivityObserver>,
}

impl NpmRegistry {
    pub fn new(base_url: &str, activity: Arc<dyn ActivityObserver>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
                .timeout(Duration::from_millis(FETCH_TIMEOUT_MS))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            activity,
        }
    }

    /// Encode package name for URL (handles scoped packages)
    fn encode_package_name(package_name: &str) -> String {
        if package_name.starts_with('@') {
            // Scoped package: @scope/name -> @scope%2Fname
            package_name.replace('/', "%2F")
        } else {
            package_name.to_string()
        }
    }

    async fn fetch_latest(&self, package_name: &str) -> Result<Option<String>, RegistryError> {
        let url = format!(
            "{}/{}/latest",
            self.base_url,
            Self::encode_package_name(package_name)
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            // Confirmed absence is a stable answer, not a failure.
            return Ok(None);
        }
        if !status.is_success() {
            warn!("registry returned status {} for {}", status, url);
            return Err(RegistryError::UnexpectedStatus(status.as_u16()));
        }

        let body: LatestResponse = response.json().await.map_err(|e| {
            warn!(
                "failed to parse latest-version response for {}: {}",
                package_name, e
            );
            RegistryError::InvalidResponse(e.to_string())
        })?;

        Ok(Some(body.version))
    }

    async fn fetch_advisories(
        &self,
        package_name: &str,
        version: &str,
    ) -> Result<Vec<Advisory>, RegistryError> {
        let url = format!("{}{}", self.base_url, ADVISORIES_BULK_PATH);
        // Batch query keyed by package name, with the single declared
        // version as its value set.
        let payload = HashMap::from([(package_name, vec![version])]);

        let response = self.client.post(&url).json(&payload).send().await?;
        let status = response.status();

        if status.as_u16() >= 400 {
            warn!("advisory endpoint returned status {}", status);
            return Err(RegistryError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(RegistryError::InvalidResponse(
                "empty advisory response body".to_string(),
            ));
        }

        let mut by_package: HashMap<String, Vec<RawAdvisory>> = serde_json::from_str(&body)
            .map_err(|e| {
                warn!("failed to parse advisory response for {}: {}", package_name, e);
                RegistryError::InvalidResponse(e.to_string())
            })?;

        // Only the attribute matching the queried name counts; entries for
        // other packages in a batch response are ignored.
        let raw = by_package.remove(package_name).unwrap_or_default();
        Ok(raw.into_iter().map(normalize_advisory).collect())
    }
}

impl Default for NpmRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_URL, Arc::new(NullActivity))
    }
}

#[async_trait::async_trait]
impl NpmRegistryApi for NpmRegistry {
    async fn latest_version(
        &self,
        package_name: &str,
    ) -> Result<Option<String>, RegistryError> {
        self.activity.request_started();
        let result = self.fetch_latest(package_name).await;
        self.activity.request_ended();
        result
    }

    async fn advisories(
        &self,
        package_name: &str,
        version: &str,
    ) -> Result<Vec<Advisory>, RegistryError> {
        self.activity.request_started();
        let result = self.fetch_advisories(package_name, version).await;
        self.activity.request_ended();
        result
    }
}
