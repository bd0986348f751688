use std::net::SocketAddr;
use std::sync::Arc;

use rosetta_api::{Diagnostics, RecordStore};

use crate::config::{DiagnosticsConfig, RosettaConfig, StorageConfig, StorageKind};
use crate::coordinator::Coordinator;
use crate::diagnostics::{FanoutDiagnostics, FileDiagnostics, TracingDiagnostics};
use crate::error::EngineError;
use crate::listener::UdpListener;
use crate::storage::{FileRecordStore, MemoryRecordStore};

/// The running relay: listener, coordinator and their collaborators.
pub struct Engine {
    coordinator: Arc<Coordinator>,
    store: Arc<dyn RecordStore>,
    listener: UdpListener,
    config: RosettaConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("local_addr", &self.listener.local_addr())
            .field("config", &self.config)
            .finish()
    }
}

impl Engine {
    /// Bootstrap the engine from a parsed configuration.
    ///
    /// Opens the record store, builds the coordinator and starts the UDP
    /// listener. Must run inside a tokio runtime.
    pub async fn bootstrap(config: RosettaConfig) -> Result<Self, EngineError> {
        // --- 1. Collaborators ---
        let store = create_store(&config.storage)?;
        let diagnostics = create_diagnostics(&config.diagnostics);

        // --- 2. Coordinator ---
        let settings = config.pipeline_settings().map_err(|e| e.with_context("pipeline"))?;
        let destination = config.destination();
        tracing::info!(
            format = %settings.format,
            auto_forward = settings.auto_forward,
            destination = %destination,
            input_override = settings.input_override.is_some(),
            "pipeline configured"
        );
        let coordinator = Arc::new(
            Coordinator::new(settings, Some(destination), store.clone(), diagnostics)
                .with_connect_timeout(config.connect_timeout()),
        );

        // --- 3. Listener ---
        let listener = UdpListener::start(
            config.listener.bind,
            config.listener.port,
            config.listener_options(),
            coordinator.clone(),
        )?;

        Ok(Engine {
            coordinator,
            store,
            listener,
            config,
        })
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn config(&self) -> &RosettaConfig {
        &self.config
    }

    /// Address the listener actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Stop receiving, wait for the receive loop, then release the
    /// outbound connection.
    pub async fn shutdown(self) {
        tracing::info!("shutting down");
        self.listener.shutdown().await;
        self.coordinator.close();
        let m = self.coordinator.metrics().snapshot();
        tracing::info!(
            received = m.received,
            transformed = m.transformed,
            forwarded = m.forwarded,
            errors = m.errors,
            "engine stopped"
        );
    }
}

fn create_store(config: &StorageConfig) -> Result<Arc<dyn RecordStore>, EngineError> {
    match config.kind {
        StorageKind::Memory => {
            tracing::info!(max_records = config.max_records, "using memory record store");
            Ok(Arc::new(MemoryRecordStore::new(config.max_records)))
        }
        StorageKind::File => {
            let store = FileRecordStore::open_bounded(&config.path, config.max_records)?;
            Ok(Arc::new(store))
        }
    }
}

fn create_diagnostics(config: &DiagnosticsConfig) -> Arc<dyn Diagnostics> {
    let fanout = FanoutDiagnostics::new().with(Arc::new(TracingDiagnostics));
    if config.error_log.trim().is_empty() {
        return Arc::new(fanout);
    }
    tracing::info!(path = %config.error_log, "writing error log");
    Arc::new(fanout.with(Arc::new(FileDiagnostics::new(&config.error_log))))
}
