pub mod bootstrap;
pub mod config;
pub mod coordinator;
pub mod diagnostics;
pub mod error;
pub mod forwarder;
pub mod listener;
pub mod metrics;
pub mod storage;

pub use bootstrap::Engine;
pub use config::RosettaConfig;
pub use coordinator::{Coordinator, CoordinatorError, PipelineSettings};
pub use diagnostics::{FanoutDiagnostics, FileDiagnostics, TracingDiagnostics};
pub use error::EngineError;
pub use forwarder::{ForwardError, Forwarder};
pub use listener::{InboundPacket, ListenerError, ListenerOptions, PacketHandler, UdpListener};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use storage::{FileRecordStore, MemoryRecordStore};
