use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use regex::Regex;

use crate::analysis::{DEFAULT_ANALYSIS_CLI, DEFAULT_ANALYSIS_TIMEOUT};
use crate::client::{ClientBuilder, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT};
use crate::error::FreeCadError;

const HOSTNAME_LABEL: &str = r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$";
const MAX_HOSTNAME_LEN: usize = 253;

/// Settings of one bridge process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    /// Never capture or attach screenshots.
    pub only_text_feedback: bool,
    pub analysis_cli: String,
    pub analysis_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            only_text_feedback: false,
            analysis_cli: DEFAULT_ANALYSIS_CLI.to_string(),
            analysis_timeout: DEFAULT_ANALYSIS_TIMEOUT,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), FreeCadError> {
        validate_host(&self.host).map_err(|reason| FreeCadError::Config { reason })?;
        if self.timeout.is_zero() {
            return Err(FreeCadError::Config {
                reason: "timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn client_builder(&self) -> ClientBuilder {
        ClientBuilder::new()
            .host(self.host.clone())
            .port(self.port)
            .timeout(self.timeout)
    }
}

/// Accepts an IPv4 address, an IPv6 address or an RFC 1123 hostname. Usable as a
/// `clap` value parser.
pub fn validate_host(value: &str) -> Result<String, String> {
    let invalid = || format!("Invalid host: '{value}'. Must be a valid IP address or hostname.");

    if value.parse::<Ipv4Addr>().is_ok() || value.parse::<Ipv6Addr>().is_ok() {
        return Ok(value.to_string());
    }

    let name = value.strip_suffix('.').unwrap_or(value);
    if name.is_empty() || name.len() > MAX_HOSTNAME_LEN {
        return Err(invalid());
    }

    let label = Regex::new(HOSTNAME_LABEL).map_err(|err| err.to_string())?;
    if name.split('.').all(|part| label.is_match(part)) {
        Ok(value.to_string())
    } else {
        Err(invalid())
    }
}
