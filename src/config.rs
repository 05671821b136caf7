use serde::Deserialize;
use std::path::PathBuf;

// =============================================================================
// Tuning constants
// =============================================================================

/// Number of concurrent workers used by the prewarm scheduler
pub const PREWARM_CONCURRENCY: usize = 5;

/// Interval between full cache resets in milliseconds (30 minutes)
pub const CACHE_RESET_INTERVAL_MS: u64 = 30 * 60 * 1000;

/// Timeout for a single registry request in milliseconds (30 seconds)
pub const FETCH_TIMEOUT_MS: u64 = 30_000;

/// Maximum number of package.json files examined during a workspace prewarm
pub const MAX_WORKSPACE_MANIFESTS: usize = 50;

/// Default base URL for the npm registry
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// File name of the server log inside the data directory
pub const LOG_FILE_NAME: &str = "depwatch-lsp.log";

/// Server configuration, parsed from LSP `initializationOptions`
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LspConfig {
    pub registry: RegistryConfig,
    pub prewarm: PrewarmConfig,
    pub cache: CacheConfig,
}

/// Registry endpoint configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Base URL of the npm registry
    pub url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.to_string(),
        }
    }
}

/// Prewarm scheduler configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PrewarmConfig {
    /// Worker pool size for bulk latest-version lookups
    pub concurrency: usize,
}

impl Default for PrewarmConfig {
    fn default() -> Self {
        Self {
            concurrency: PREWARM_CONCURRENCY,
        }
    }
}

/// Cache lifecycle configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Interval between full cache resets in milliseconds
    pub reset_interval: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            reset_interval: CACHE_RESET_INTERVAL_MS,
        }
    }
}

/// Returns the path to the data directory for depwatch-lsp.
/// Uses $XDG_DATA_HOME/depwatch-lsp if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/depwatch-lsp,
/// or ./depwatch-lsp if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join(LOG_FILE_NAME)
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("depwatch-lsp")
}
