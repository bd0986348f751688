use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Outbound transport, fixed for the lifetime of a forwarder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp => f.write_str("TCP"),
            Transport::Udp => f.write_str("UDP"),
        }
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Transport::Tcp),
            "udp" => Ok(Transport::Udp),
            other => Err(format!("unsupported transport '{other}'")),
        }
    }
}

/// Where forwarded messages go.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub transport: Transport,
    pub host: String,
    pub port: u16,
}

impl Destination {
    pub fn new(transport: Transport, host: impl Into<String>, port: u16) -> Self {
        Self { transport, host: host.into(), port }
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new(Transport::Tcp, host, port)
    }

    pub fn udp(host: impl Into<String>, port: u16) -> Self {
        Self::new(Transport::Udp, host, port)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.transport, self.host, self.port)
    }
}
