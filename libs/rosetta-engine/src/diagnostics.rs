use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use rosetta_api::Diagnostics;

pub fn default_error_log() -> String {
    "rosetta_errors.log".to_string()
}

// ═══════════════════════════════════════════════════════════════
//  TracingDiagnostics
// ═══════════════════════════════════════════════════════════════

/// Routes pipeline diagnostics into the process-wide `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn log_error(&self, message: &str) {
        tracing::error!(target: "rosetta::pipeline", "{message}");
    }

    fn log_info(&self, message: &str) {
        tracing::info!(target: "rosetta::pipeline", "{message}");
    }
}

// ═══════════════════════════════════════════════════════════════
//  FileDiagnostics
// ═══════════════════════════════════════════════════════════════

/// Appends timestamped lines to an error log:
///
/// ```text
/// [2024-05-01 12:00:00] [Error] Transformation failed: ...
/// [2024-05-01 12:00:01] INFO: [Forwarded] Sent to TCP 127.0.0.1:50000
/// ```
///
/// The file is opened per line, so it may be rotated or removed while
/// the process runs.
pub struct FileDiagnostics {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileDiagnostics {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "[{stamp}] {line}"));
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "error log write failed");
        }
    }
}

impl Diagnostics for FileDiagnostics {
    fn log_error(&self, message: &str) {
        self.append(message);
    }

    fn log_info(&self, message: &str) {
        self.append(&format!("INFO: {message}"));
    }
}

// ═══════════════════════════════════════════════════════════════
//  FanoutDiagnostics
// ═══════════════════════════════════════════════════════════════

/// Sends every line to each sink in order.
#[derive(Default, Clone)]
pub struct FanoutDiagnostics {
    sinks: Vec<Arc<dyn Diagnostics>>,
}

impl FanoutDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn Diagnostics>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Diagnostics for FanoutDiagnostics {
    fn log_error(&self, message: &str) {
        for sink in &self.sinks {
            sink.log_error(message);
        }
    }

    fn log_info(&self, message: &str) {
        for sink in &self.sinks {
            sink.log_info(message);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use rosetta_api::Diagnostics;

    /// Captures lines as `ERROR <msg>` / `INFO <msg>`.
    #[derive(Default)]
    pub struct CaptureDiagnostics {
        pub lines: Mutex<Vec<String>>,
    }

    impl CaptureDiagnostics {
        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }

        pub fn contains(&self, needle: &str) -> bool {
            self.lines().iter().any(|l| l.contains(needle))
        }
    }

    impl Diagnostics for CaptureDiagnostics {
        fn log_error(&self, message: &str) {
            self.lines.lock().unwrap().push(format!("ERROR {message}"));
        }

        fn log_info(&self, message: &str) {
            self.lines.lock().unwrap().push(format!("INFO {message}"));
        }
    }
}
