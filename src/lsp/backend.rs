//! LSP backend wiring the scan engine to the editor

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::{debug, info, warn};

use crate::config::LspConfig;
use crate::lsp::activity::{EditorActivity, PendingRequests};
use crate::lsp::code_action::build_quick_fixes;
use crate::lsp::diagnostics::DiagnosticsPublisher;
use crate::lsp::documents::{DocumentSnapshot, DocumentStore};
use crate::lsp::workspace::collect_dependency_names;
use crate::parser::package_json::parse_dependencies;
use crate::parser::types::is_package_manifest;
use crate::version::cache::QueryCache;
use crate::version::npm::NpmRegistry;
use crate::version::prewarm::prewarm_packages;
use crate::version::scanner::scan_dependencies;

pub struct Backend {
    client: Client,
    config: OnceLock<LspConfig>,
    cache: OnceLock<QueryCache>,
    documents: Arc<DocumentStore>,
    workspace_roots: Mutex<Vec<PathBuf>>,
    pending: Arc<PendingRequests>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            config: OnceLock::new(),
            cache: OnceLock::new(),
            documents: Arc::new(DocumentStore::default()),
            workspace_roots: Mutex::new(Vec::new()),
            pending: Arc::new(PendingRequests::default()),
        }
    }

    fn config(&self) -> LspConfig {
        self.config.get().cloned().unwrap_or_default()
    }

    pub fn server_capabilities() -> ServerCapabilities {
        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                    ..Default::default()
                },
            )),
            code_action_provider: Some(CodeActionProviderCapability::Options(
                CodeActionOptions {
                    code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
                    ..Default::default()
                },
            )),
            ..Default::default()
        }
    }

    /// One-shot workspace prewarm, spawned after initialization.
    fn spawn_prewarm(&self) {
        let Some(cache) = self.cache.get().cloned() else {
            return;
        };
        let roots = self
            .workspace_roots
            .lock()
            .expect("workspace roots mutex poisoned")
            .clone();
        if roots.is_empty() {
            return;
        }
        let concurrency = self.config().prewarm.concurrency;

        tokio::spawn(async move {
            let names = tokio::task::spawn_blocking(move || collect_dependency_names(&roots))
                .await
                .unwrap_or_default();
            if names.is_empty() {
                return;
            }
            info!("prewarming {} workspace dependencies", names.len());
            prewarm_packages(&cache, &names, concurrency).await;
        });
    }

    /// Periodic full refresh: clear both caches, prewarm again, rescan
    /// every open manifest. Bounds staleness without cancelling anything.
    fn spawn_periodic_refresh(&self) {
        let Some(cache) = self.cache.get().cloned() else {
            return;
        };
        let client = self.client.clone();
        let documents = self.documents.clone();
        let roots = self
            .workspace_roots
            .lock()
            .expect("workspace roots mutex poisoned")
            .clone();
        let config = self.config();

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(config.cache.reset_interval));
            // The first tick fires immediately; skip it, the initial
            // prewarm already ran.
            interval.tick().await;

            loop {
                interval.tick().await;
                info!("periodic refresh: clearing caches and rescanning");
                cache.clear();

                let roots = roots.clone();
                let names = tokio::task::spawn_blocking(move || collect_dependency_names(&roots))
                    .await
                    .unwrap_or_default();
                prewarm_packages(&cache, &names, config.prewarm.concurrency).await;

                for uri in documents.uris() {
                    scan_manifest_document(&client, &cache, &documents, uri).await;
                }
            }
        });
    }
}

/// Scans one open manifest document and streams diagnostics as findings
/// settle. A malformed manifest clears whatever was previously shown.
async fn scan_manifest_document(
    client: &Client,
    cache: &QueryCache,
    documents: &Arc<DocumentStore>,
    uri: Url,
) {
    let Some((text, generation)) = documents.snapshot(&uri) else {
        return;
    };

    let Some(dependencies) = parse_dependencies(&text) else {
        client.publish_diagnostics(uri, Vec::new(), None).await;
        return;
    };

    // A fresh pass replaces the previous set before findings stream in.
    client
        .publish_diagnostics(uri.clone(), Vec::new(), None)
        .await;

    if dependencies.is_empty() {
        return;
    }

    debug!("scanning {} dependencies in {}", dependencies.len(), uri);

    let guard = Arc::new(DocumentSnapshot::new(
        documents.clone(),
        uri.clone(),
        generation,
    ));
    let sink = Arc::new(DiagnosticsPublisher::new(client.clone(), uri, text));
    tokio::spawn(scan_dependencies(cache.clone(), dependencies, guard, sink));
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        if let Some(options) = params.initialization_options {
            match serde_json::from_value::<LspConfig>(options) {
                Ok(config) => {
                    let _ = self.config.set(config);
                }
                Err(e) => warn!("invalid initialization options: {}", e),
            }
        }

        let mut roots: Vec<PathBuf> = Vec::new();
        if let Some(folders) = params.workspace_folders {
            roots.extend(
                folders
                    .into_iter()
                    .filter_map(|folder| folder.uri.to_file_path().ok()),
            );
        }
        #[allow(deprecated)]
        if roots.is_empty()
            && let Some(root_uri) = params.root_uri
        {
            roots.extend(root_uri.to_file_path().ok());
        }
        *self
            .workspace_roots
            .lock()
            .expect("workspace roots mutex poisoned") = roots;

        let config = self.config();
        let activity = Arc::new(EditorActivity::new(
            self.client.clone(),
            self.pending.clone(),
        ));
        let registry = Arc::new(NpmRegistry::new(&config.registry.url, activity));
        let _ = self.cache.set(QueryCache::new(registry));

        Ok(InitializeResult {
            capabilities: Self::server_capabilities(),
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        info!("server initialized");
        self.spawn_prewarm();
        self.spawn_periodic_refresh();
    }

    async fn shutdown(&self) -> Result<()> {
        info!("server shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        if !is_package_manifest(uri.as_str()) {
            return;
        }

        self.documents.insert(uri.clone(), params.text_document.text);

        let Some(cache) = self.cache.get() else {
            warn!("query cache not initialized, skipping scan");
            return;
        };
        scan_manifest_document(&self.client, cache, &self.documents, uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        if !is_package_manifest(uri.as_str()) {
            return;
        }

        // FULL sync: the last change carries the complete document text.
        // Storing it bumps the generation, so results still in flight for
        // the previous content are dropped on arrival. The next scan runs
        // on save.
        let Some(text) = params.content_changes.into_iter().last().map(|c| c.text) else {
            return;
        };
        self.documents.insert(uri, text);
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        if !is_package_manifest(uri.as_str()) {
            return;
        }

        if let Some(text) = params.text {
            self.documents.insert(uri.clone(), text);
        }

        let Some(cache) = self.cache.get() else {
            return;
        };
        scan_manifest_document(&self.client, cache, &self.documents, uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.documents.close(&params.text_document.uri);
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let actions = build_quick_fixes(&params.text_document.uri, &params.context.diagnostics);
        Ok(Some(actions))
    }
}
