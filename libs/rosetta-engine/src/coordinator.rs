use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use rosetta_api::{
    Destination, Diagnostics, FieldOverrides, OutputFormat, Record, RecordStatus, RecordStore, TransformError,
};

use crate::forwarder::{DEFAULT_CONNECT_TIMEOUT, ForwardError, Forwarder};
use crate::listener::{InboundPacket, PacketHandler};
use crate::metrics::PipelineMetrics;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("no transformed message yet")]
    NothingToSend,

    #[error("no destination configured")]
    NoDestination,

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Forward(#[from] ForwardError),
}

/// Operator-adjustable pipeline state, read once per packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSettings {
    pub format: OutputFormat,
    pub overrides: FieldOverrides,
    pub auto_forward: bool,
    /// Document transformed in place of every inbound payload. The raw
    /// payload is still what gets recorded.
    pub input_override: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Coordinator
// ═══════════════════════════════════════════════════════════════

/// Drives each inbound packet through transform and forward, persisting
/// every status change and reporting every stage to diagnostics.
///
/// Keeps the last successfully transformed record for manual sends. One
/// [`Forwarder`] is cached per destination and replaced only when the
/// destination changes.
pub struct Coordinator {
    settings: RwLock<PipelineSettings>,
    forwarder: Mutex<Option<Arc<Forwarder>>>,
    connect_timeout: Duration,
    last: Mutex<Option<Record>>,
    store: Arc<dyn RecordStore>,
    diagnostics: Arc<dyn Diagnostics>,
    metrics: Arc<PipelineMetrics>,
}

impl Coordinator {
    pub fn new(
        settings: PipelineSettings,
        destination: Option<Destination>,
        store: Arc<dyn RecordStore>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            settings: RwLock::new(settings),
            forwarder: Mutex::new(destination.map(|d| Arc::new(Forwarder::new(d)))),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            last: Mutex::new(None),
            store,
            diagnostics,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Bound TCP connect and write time for every forwarder this
    /// coordinator creates.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        let destination = self.destination();
        *lock(&self.forwarder) = destination.map(|d| Arc::new(Forwarder::with_timeout(d, timeout)));
        self
    }

    // ── Pipeline ──

    /// Run one packet through the pipeline and return the record in its
    /// final state.
    ///
    /// Never fails: transform and transport problems end in `ERROR`,
    /// persistence problems are reported and the record carries on
    /// without an id.
    pub fn handle_packet(&self, packet: InboundPacket) -> Record {
        self.metrics.record_received();
        let mut record = Record::received(packet.source, packet.payload, packet.received_at);
        self.diagnostics
            .log_info(&format!("[Received] {} at {}", record.source(), record.received_at().to_rfc3339()));

        match self.store.insert(&record) {
            Ok(id) => record.assign_id(id),
            Err(e) => self.diagnostics.log_error(&format!("[Store Error] insert failed: {e}")),
        }

        let settings = self.settings();
        if settings.input_override.is_some() {
            self.diagnostics.log_info("[Override Mode] Using manual override for transform.");
        }
        let input = settings.input_override.as_deref().unwrap_or(record.raw_payload());
        let result = rosetta_format::transform(input, &settings.format, &settings.overrides);

        let rendered = match result {
            Ok(rendered) => rendered,
            Err(e) => {
                self.fail(&mut record);
                self.diagnostics.log_error(&format!("[Error] Transformation failed: {e}"));
                return record;
            }
        };

        if let Err(e) = record.render(rendered.as_str()) {
            self.diagnostics.log_error(&format!("[Error] {e}"));
            return record;
        }
        self.persist(&record, Some(&rendered));
        self.metrics.record_transformed();
        self.diagnostics.log_info(&format!("[Transformed] Format: {}", settings.format));

        if settings.auto_forward {
            self.auto_forward(&mut record, &rendered);
        }

        tracing::debug!(id = ?record.id(), status = %record.status(), "packet handled");
        *lock(&self.last) = Some(record.clone());
        record
    }

    fn auto_forward(&self, record: &mut Record, rendered: &str) {
        let Some(forwarder) = self.current_forwarder() else {
            self.diagnostics.log_error("[AutoForward Error] No destination configured");
            return;
        };

        match forwarder.try_send(rendered) {
            Ok(()) => {
                if let Err(e) = record.advance(RecordStatus::Forwarded) {
                    self.diagnostics.log_error(&format!("[Error] {e}"));
                    return;
                }
                self.persist(record, None);
                self.metrics.record_forwarded();
                self.diagnostics.log_info(&format!("[AutoSent] {}", forwarder.destination()));
            }
            Err(e) => {
                // The rendered payload stays on the record for a manual retry.
                self.fail(record);
                self.diagnostics.log_error(&format!("[AutoSend Error] {e}"));
            }
        }
    }

    fn fail(&self, record: &mut Record) {
        if let Err(e) = record.advance(RecordStatus::Error) {
            self.diagnostics.log_error(&format!("[Error] {e}"));
            return;
        }
        self.persist(record, None);
        self.metrics.record_error();
    }

    fn persist(&self, record: &Record, rendered: Option<&str>) {
        let Some(id) = record.id() else {
            return;
        };
        if let Err(e) = self.store.update_status(id, record.status(), rendered) {
            self.diagnostics
                .log_error(&format!("[Store Error] {id} -> {}: {e}", record.status()));
        }
    }

    // ── Manual operations ──

    /// Send the last rendered payload again. Outcome is reported to the
    /// caller only; no record status changes.
    pub fn send_last(&self) -> Result<(), CoordinatorError> {
        let payload = self.last_rendered().ok_or(CoordinatorError::NothingToSend)?;
        let forwarder = self.current_forwarder().ok_or(CoordinatorError::NoDestination)?;

        let result = forwarder.try_send(&payload);
        self.metrics.record_manual_send(result.is_ok());
        match result {
            Ok(()) => {
                self.diagnostics.log_info(&format!("[Sent] {}", forwarder.destination()));
                Ok(())
            }
            Err(e) => {
                let transport = forwarder.destination().transport;
                self.diagnostics.log_error(&format!("[Error] Failed to send via {transport}: {e}"));
                Err(e.into())
            }
        }
    }

    /// Re-render the last transformed record with the current settings,
    /// replacing its rendered payload. Status is unchanged.
    pub fn retransform_last(&self) -> Result<String, CoordinatorError> {
        let mut last = lock(&self.last);
        let record = last.as_mut().ok_or(CoordinatorError::NothingToSend)?;

        let settings = self.settings();
        let input = settings.input_override.as_deref().unwrap_or(record.raw_payload());
        let rendered = rosetta_format::transform(input, &settings.format, &settings.overrides).inspect_err(|e| {
            self.diagnostics.log_error(&format!("[Error] Retransform failed: {e}"));
        })?;

        if let Err(e) = record.render(rendered.as_str()) {
            self.diagnostics.log_error(&format!("[Error] {e}"));
        } else {
            self.persist(record, Some(&rendered));
            self.diagnostics.log_info(&format!("[Retransformed] Format: {}", settings.format));
        }
        Ok(rendered)
    }

    // ── Settings ──

    pub fn settings(&self) -> PipelineSettings {
        self.settings.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn update_settings(&self, f: impl FnOnce(&mut PipelineSettings)) {
        f(&mut self.settings.write().unwrap_or_else(|p| p.into_inner()));
    }

    pub fn set_format(&self, format: OutputFormat) {
        self.update_settings(|s| s.format = format);
    }

    pub fn set_overrides(&self, overrides: FieldOverrides) {
        self.update_settings(|s| s.overrides = overrides.normalized());
    }

    pub fn set_auto_forward(&self, enabled: bool) {
        self.update_settings(|s| s.auto_forward = enabled);
    }

    /// Returns the new state.
    pub fn toggle_auto_forward(&self) -> bool {
        let mut enabled = false;
        self.update_settings(|s| {
            s.auto_forward = !s.auto_forward;
            enabled = s.auto_forward;
        });
        enabled
    }

    pub fn set_input_override(&self, document: Option<String>) {
        self.update_settings(|s| s.input_override = document.filter(|d| !d.trim().is_empty()));
    }

    /// Replace the destination. The previous forwarder is closed.
    pub fn set_destination(&self, destination: Option<Destination>) {
        let next = destination.map(|d| Arc::new(Forwarder::with_timeout(d, self.connect_timeout)));
        let previous = std::mem::replace(&mut *lock(&self.forwarder), next);
        if let Some(previous) = previous {
            previous.close();
        }
    }

    pub fn destination(&self) -> Option<Destination> {
        self.current_forwarder().map(|f| f.destination().clone())
    }

    /// Close any open TCP connection. The destination is kept.
    pub fn close(&self) {
        if let Some(forwarder) = self.current_forwarder() {
            forwarder.close();
        }
    }

    // ── Inspection ──

    pub fn last_record(&self) -> Option<Record> {
        lock(&self.last).clone()
    }

    pub fn last_rendered(&self) -> Option<String> {
        lock(&self.last).as_ref().and_then(|r| r.rendered_payload().map(str::to_string))
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    fn current_forwarder(&self) -> Option<Arc<Forwarder>> {
        lock(&self.forwarder).clone()
    }
}

impl PacketHandler for Coordinator {
    fn on_packet(&self, packet: InboundPacket) {
        self.handle_packet(packet);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}
