use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use rosetta_api::{Destination, FieldOverrides, OutputFormat, Transport};

use crate::coordinator::PipelineSettings;
use crate::diagnostics::default_error_log;
use crate::error::EngineError;
use crate::listener::ListenerOptions;
use crate::storage::default_max_records;

/// Root configuration, parsed from TOML. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosettaConfig {
    #[serde(default)]
    pub listener: ListenerConfig,

    #[serde(default)]
    pub destination: DestinationConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    #[serde(default = "default_listen_port")]
    pub port: u16,
    /// Largest datagram accepted whole.
    #[serde(default = "default_recv_buffer")]
    pub recv_buffer: usize,
    /// Upper bound on stop latency.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}
fn default_listen_port() -> u16 {
    40000
}
fn default_recv_buffer() -> usize {
    65_535
}
fn default_poll_interval_ms() -> u64 {
    250
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_listen_port(),
            recv_buffer: default_recv_buffer(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinationConfig {
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_dest_host")]
    pub host: String,
    #[serde(default = "default_dest_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_dest_host() -> String {
    "127.0.0.1".to_string()
}
fn default_dest_port() -> u16 {
    50000
}
fn default_connect_timeout_ms() -> u64 {
    3000
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            host: default_dest_host(),
            port: default_dest_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// `simdis`, `cot`, `json`, `raw` or `template`.
    #[serde(default = "default_format")]
    pub format: String,
    /// Inline template text for `format = "template"`.
    #[serde(default)]
    pub template: Option<String>,
    /// Template read from disk. Ignored when `template` is set.
    #[serde(default)]
    pub template_file: Option<PathBuf>,
    #[serde(default)]
    pub auto_forward: bool,
    /// XML document transformed in place of every inbound payload.
    #[serde(default)]
    pub input_override_file: Option<PathBuf>,
    #[serde(default)]
    pub overrides: FieldOverrides,
}

fn default_format() -> String {
    "simdis".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            template: None,
            template_file: None,
            auto_forward: false,
            input_override_file: None,
            overrides: FieldOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub kind: StorageKind,
    /// Journal path for `kind = "file"`.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Records held in memory. For `kind = "file"` older ones stay on disk.
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("rosetta_records.jsonl")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::default(),
            path: default_storage_path(),
            max_records: default_max_records(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticsConfig {
    /// Timestamped error log. Empty disables it.
    #[serde(default = "default_error_log")]
    pub error_log: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            error_log: default_error_log(),
        }
    }
}

impl RosettaConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::parse(&content).map_err(|e| e.with_context(path.display()))
    }

    /// Parse configuration from a TOML string. The output format, and any
    /// template it names, is validated here.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))?;
        config.output_format()?;
        Ok(config)
    }

    /// Resolve `[pipeline] format` together with its template, if any.
    pub fn output_format(&self) -> Result<OutputFormat, EngineError> {
        let template = match (&self.pipeline.template, &self.pipeline.template_file) {
            (Some(text), _) => Some(text.clone()),
            (None, Some(path)) => Some(
                std::fs::read_to_string(path)
                    .map_err(|e| EngineError::Config(format!("template_file {}: {e}", path.display())))?,
            ),
            (None, None) => None,
        };

        let format = OutputFormat::from_name(&self.pipeline.format, template).map_err(EngineError::Config)?;
        if let OutputFormat::CustomTemplate(text) = &format {
            rosetta_format::Template::parse(text).map_err(|e| EngineError::Config(format!("template: {e}")))?;
        }
        Ok(format)
    }

    pub fn destination(&self) -> Destination {
        let d = &self.destination;
        Destination::new(d.transport, d.host.clone(), d.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.destination.connect_timeout_ms.max(1))
    }

    pub fn listener_options(&self) -> ListenerOptions {
        ListenerOptions {
            recv_buffer: self.listener.recv_buffer,
            poll_interval: Duration::from_millis(self.listener.poll_interval_ms.max(1)),
        }
    }

    pub fn input_override(&self) -> Result<Option<String>, EngineError> {
        let Some(path) = &self.pipeline.input_override_file else {
            return Ok(None);
        };
        std::fs::read_to_string(path)
            .map(Some)
            .map_err(|e| EngineError::Config(format!("input_override_file {}: {e}", path.display())))
    }

    pub fn pipeline_settings(&self) -> Result<PipelineSettings, EngineError> {
        Ok(PipelineSettings {
            format: self.output_format()?,
            overrides: self.pipeline.overrides.clone().normalized(),
            auto_forward: self.pipeline.auto_forward,
            input_override: self.input_override()?,
        })
    }
}
