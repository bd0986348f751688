use std::net::IpAddr;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use rosetta_api::{FieldOverrides, RecordStatus, Transport};
use rosetta_engine::RosettaConfig;

use crate::error::CliError;

/// Used when `--config` is not given; may be absent.
pub const DEFAULT_CONFIG: &str = "rosetta.toml";

#[derive(Parser)]
#[command(name = "rosetta-server", about = "UDP telemetry relay: XML events in, Simdis/CoT/JSON out")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Receive, transform and forward telemetry
    Serve(ServeArgs),
    /// Transform one document and print the result
    Transform(TransformArgs),
    /// List stored records
    History(HistoryArgs),
}

#[derive(Args, Clone, Debug, Default)]
pub struct OverrideArgs {
    /// Replace the event uid
    #[arg(long)]
    pub uid: Option<String>,

    /// Replace the point latitude
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<String>,

    /// Replace the point longitude
    #[arg(long, allow_hyphen_values = true)]
    pub lon: Option<String>,

    /// Replace the point altitude (hae)
    #[arg(long, allow_hyphen_values = true)]
    pub alt: Option<String>,
}

impl OverrideArgs {
    /// Flags layered over `base`; a flag that is not given keeps the base value.
    pub fn apply(&self, base: FieldOverrides) -> FieldOverrides {
        FieldOverrides {
            uid: self.uid.clone().or(base.uid),
            lat: self.lat.clone().or(base.lat),
            lon: self.lon.clone().or(base.lon),
            alt: self.alt.clone().or(base.alt),
            timestamp: base.timestamp,
        }
        .normalized()
    }
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Path to the TOML config file
    #[arg(long, env = "ROSETTA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listener bind address
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Listener UDP port
    #[arg(long, env = "ROSETTA_LISTEN_PORT")]
    pub listen_port: Option<u16>,

    /// Destination transport (tcp | udp)
    #[arg(long)]
    pub transport: Option<Transport>,

    /// Destination host
    #[arg(long, env = "ROSETTA_DEST_HOST")]
    pub dest_host: Option<String>,

    /// Destination port
    #[arg(long, env = "ROSETTA_DEST_PORT")]
    pub dest_port: Option<u16>,

    /// Output format (simdis | cot | json | raw | template)
    #[arg(long)]
    pub format: Option<String>,

    /// Template file for `--format template`
    #[arg(long)]
    pub template_file: Option<PathBuf>,

    /// Forward every transformed packet
    #[arg(long)]
    pub auto_forward: bool,

    /// Transform this document instead of each inbound payload
    #[arg(long)]
    pub input_override: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

impl ServeArgs {
    /// Config file values with command-line flags layered on top.
    pub fn resolve(&self) -> Result<RosettaConfig, CliError> {
        let mut config = load_config(self.config.as_deref())?;

        if let Some(bind) = self.bind {
            config.listener.bind = bind;
        }
        if let Some(port) = self.listen_port {
            config.listener.port = port;
        }
        if let Some(transport) = self.transport {
            config.destination.transport = transport;
        }
        if let Some(host) = &self.dest_host {
            config.destination.host = host.clone();
        }
        if let Some(port) = self.dest_port {
            config.destination.port = port;
        }
        if let Some(format) = &self.format {
            config.pipeline.format = format.clone();
        }
        if let Some(path) = &self.template_file {
            config.pipeline.template = None;
            config.pipeline.template_file = Some(path.clone());
        }
        if self.auto_forward {
            config.pipeline.auto_forward = true;
        }
        if let Some(path) = &self.input_override {
            config.pipeline.input_override_file = Some(path.clone());
        }
        config.pipeline.overrides = self.overrides.apply(config.pipeline.overrides);

        config.output_format()?;
        Ok(config)
    }
}

#[derive(Args, Clone, Debug)]
pub struct TransformArgs {
    /// Input XML file; stdin when omitted or `-`
    pub input: Option<PathBuf>,

    /// Output format (simdis | cot | json | raw | template)
    #[arg(long, default_value = "simdis")]
    pub format: String,

    /// Inline template for `--format template`
    #[arg(long, conflicts_with = "template_file")]
    pub template: Option<String>,

    /// Template file for `--format template`
    #[arg(long)]
    pub template_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

#[derive(Args, Clone, Debug)]
pub struct HistoryArgs {
    /// Path to the TOML config file (for `[storage] path`)
    #[arg(long, env = "ROSETTA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Record journal; overrides the config file
    #[arg(long)]
    pub journal: Option<PathBuf>,

    /// Only records in this status (received | transformed | forwarded | error)
    #[arg(long)]
    pub status: Option<RecordStatus>,

    /// Print records as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// An explicitly given config must exist; the default one may be absent.
pub fn load_config(path: Option<&Path>) -> Result<RosettaConfig, CliError> {
    match path {
        Some(path) => Ok(RosettaConfig::load(path)?),
        None if Path::new(DEFAULT_CONFIG).exists() => Ok(RosettaConfig::load(DEFAULT_CONFIG)?),
        None => {
            tracing::info!(config = DEFAULT_CONFIG, "no config file, using defaults");
            Ok(RosettaConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::CommandFactory;

    use super::*;

    fn serve(args: &[&str]) -> ServeArgs {
        let argv = ["rosetta-server", "serve"].into_iter().chain(args.iter().copied());
        let Commands::Serve(args) = Cli::try_parse_from(argv).unwrap().command else {
            unreachable!()
        };
        args
    }

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[destination]\nhost = \"10.0.0.1\"\nport = 7000\n[pipeline.overrides]\nuid = \"FILE\"\nlat = \"5\"").unwrap();
        let path = file.path().display().to_string();

        let config = serve(&[
            "--config", &path,
            "--transport", "udp",
            "--dest-port", "7100",
            "--format", "cot",
            "--uid", "CLI",
            "--lon", "-3.5",
            "--auto-forward",
        ])
        .resolve()
        .unwrap();

        assert_eq!(config.destination.host, "10.0.0.1");
        assert_eq!(config.destination.port, 7100);
        assert_eq!(config.destination.transport, Transport::Udp);
        assert_eq!(config.pipeline.format, "cot");
        assert!(config.pipeline.auto_forward);
        assert_eq!(config.pipeline.overrides.uid.as_deref(), Some("CLI"));
        assert_eq!(config.pipeline.overrides.lat.as_deref(), Some("5"));
        assert_eq!(config.pipeline.overrides.lon.as_deref(), Some("-3.5"));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let err = serve(&["--config", "/nonexistent/rosetta.toml"]).resolve().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rosetta.toml"), "{err}");
    }

    #[test]
    fn bad_format_flag_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();
        let path = path.display().to_string();
        assert!(serve(&["--config", &path, "--format", "yaml"]).resolve().is_err());
    }

    #[test]
    fn history_status_parses() {
        let cli = Cli::try_parse_from(["rosetta-server", "history", "--status", "forwarded", "--json"]).unwrap();
        let Commands::History(args) = cli.command else {
            unreachable!()
        };
        assert_eq!(args.status, Some(RecordStatus::Forwarded));
        assert!(args.json);
    }
}
