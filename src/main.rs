//! `freecad-mcp` entrypoint: serves the FreeCAD tools over MCP on stdio.
//!
//! Logs go to stderr; stdout carries MCP framing only.

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use freecad_mcp_rs::config::validate_host;
use freecad_mcp_rs::mcp::FreeCadMcp;
use freecad_mcp_rs::{BridgeConfig, BridgeSession};

#[derive(Debug, Parser)]
#[command(name = "freecad-mcp")]
#[command(version)]
#[command(about = "MCP server bridging LLM agents to FreeCAD's XML-RPC addon")]
struct Cli {
    /// Host of the FreeCAD RPC server.
    #[arg(long, env = "FREECAD_MCP_HOST", default_value = "localhost", value_parser = validate_host)]
    host: String,

    /// Port of the FreeCAD RPC server.
    #[arg(long, env = "FREECAD_MCP_PORT", default_value_t = 9875)]
    port: u16,

    /// Only return text feedback; never capture or attach screenshots.
    #[arg(long)]
    only_text_feedback: bool,

    /// Timeout for each RPC call, in milliseconds.
    #[arg(long, default_value_t = 60_000, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: u64,

    /// Visual analysis executable, looked up on PATH.
    #[arg(long, env = "FREECAD_MCP_ANALYSIS_CLI", default_value = "gemini")]
    analysis_cli: String,

    /// Timeout for one visual analysis run, in seconds.
    #[arg(long, default_value_t = 30)]
    analysis_timeout_secs: u64,
}

impl Cli {
    fn into_config(self) -> BridgeConfig {
        BridgeConfig {
            host: self.host,
            port: self.port,
            timeout: Duration::from_millis(self.timeout_ms),
            only_text_feedback: self.only_text_feedback,
            analysis_cli: self.analysis_cli,
            analysis_timeout: Duration::from_secs(self.analysis_timeout_secs),
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli.into_config()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("freecad-mcp: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(config: BridgeConfig) -> Result<(), Box<dyn Error>> {
    config.validate()?;
    tracing::info!(only_text_feedback = config.only_text_feedback, "starting FreeCAD MCP bridge");
    tracing::info!(host = %config.host, port = config.port, "FreeCAD RPC server");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let mut signals = runtime.block_on(async { ShutdownSignals::install() })?;

    runtime.block_on(async {
        let session = Arc::new(BridgeSession::new(config));
        session.warm_up().await;

        let server = FreeCadMcp::new(Arc::clone(&session));
        let outcome = tokio::select! {
            served = server.serve_stdio() => served.map_err(|err| Box::new(err) as Box<dyn Error>),
            signal = signals.recv() => match signal {
                Ok(name) => {
                    tracing::info!(signal = name, "shutting down");
                    Ok(())
                }
                Err(err) => Err(Box::new(err) as Box<dyn Error>),
            },
        };

        session.shutdown().await;
        outcome
    })
}

/// Ctrl-C everywhere, plus SIGTERM on unix where MCP hosts stop servers with it.
struct ShutdownSignals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    /// Must be called from within a tokio runtime.
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            )?,
        })
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> std::io::Result<&'static str> {
        tokio::select! {
            interrupted = tokio::signal::ctrl_c() => interrupted.map(|()| "SIGINT"),
            _ = self.terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> std::io::Result<&'static str> {
        tokio::signal::ctrl_c().await.map(|()| "Ctrl-C")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;

    use super::{Cli, ShutdownSignals};

    #[test]
    fn cli_defaults_match_addon_defaults() {
        let config = Cli::try_parse_from(["freecad-mcp"])
            .expect("defaults should parse")
            .into_config();
        assert_eq!(config.port, 9875);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(!config.only_text_feedback);
    }

    #[test]
    fn cli_rejects_invalid_host() {
        let err = Cli::try_parse_from(["freecad-mcp", "--host", "bad_host!"])
            .expect_err("invalid host should be rejected");
        assert!(err.to_string().contains("Invalid host: 'bad_host!'"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sigterm_is_a_shutdown_signal() {
        let mut signals = ShutdownSignals::install().expect("install signal handlers");

        let status = std::process::Command::new("kill")
            .arg("-TERM")
            .arg(std::process::id().to_string())
            .status()
            .expect("run kill");
        assert!(status.success());

        let received = tokio::time::timeout(Duration::from_secs(5), signals.recv())
            .await
            .expect("signal should arrive in time")
            .expect("signal stream should stay open");
        assert_eq!(received, "SIGTERM");
    }
}
