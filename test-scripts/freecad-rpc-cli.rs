use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use freecad_mcp_rs::{ClientBuilder, FreeCadError, Screenshot, ScreenshotRequest, ViewName};

#[derive(Debug)]
struct CliConfig {
    host: Option<String>,
    port: Option<u16>,
    timeout_ms: u64,
}

#[derive(Debug)]
enum Command {
    Ping,
    Docs,
    Objects { doc: String, detailed: bool },
    Object { doc: String, name: String },
    Parts,
    Exec { code: String },
    Screenshot { view: ViewName, out: Option<PathBuf> },
    Smoke,
    Help,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            if err.is_connection_error() {
                eprintln!(
                    "hint: start FreeCAD, switch to the MCP Addon workbench and start the RPC server before rerunning this command."
                );
            }
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<(), FreeCadError> {
    let (config, command) = parse_args()?;

    if matches!(command, Command::Help) {
        print_help();
        return Ok(());
    }

    let mut builder = ClientBuilder::new().timeout(Duration::from_millis(config.timeout_ms));
    if let Some(host) = config
        .host
        .or_else(|| std::env::var("FREECAD_MCP_HOST").ok())
    {
        builder = builder.host(host);
    }
    if let Some(port) = config.port {
        builder = builder.port(port);
    }

    let client = builder.connect().await?;

    match command {
        Command::Ping => {
            let alive = client.ping().await?;
            println!("pong={alive} endpoint={}", client.endpoint());
        }
        Command::Docs => {
            let docs = client.list_documents().await?;
            if docs.is_empty() {
                println!("no open documents");
            } else {
                for (idx, doc) in docs.iter().enumerate() {
                    println!("[{idx}] {doc}");
                }
            }
        }
        Command::Objects { doc, detailed } => {
            let objects = client.get_objects(&doc, !detailed).await?;
            let count = objects.as_array().map_or(0, Vec::len);
            println!("objects={count}");
            println!("{objects:#}");
        }
        Command::Object { doc, name } => {
            let object = client.get_object(&doc, &name).await?;
            println!("{object:#}");
        }
        Command::Parts => {
            let parts = client.get_parts_list().await?;
            println!("parts={}", parts.len());
            for part in parts {
                println!("{part}");
            }
        }
        Command::Exec { code } => {
            let message = client.execute_code(&code).await?;
            println!("{message}");
        }
        Command::Screenshot { view, out } => {
            match client
                .get_active_screenshot(&ScreenshotRequest::new(view))
                .await
            {
                Screenshot::Captured(image) => {
                    let bytes = STANDARD
                        .decode(image.trim())
                        .map_err(|err| FreeCadError::Base64Decode(err.to_string()))?;
                    let out = out.unwrap_or_else(|| PathBuf::from(format!("{view}.webp")));
                    std::fs::write(&out, &bytes).map_err(|err| FreeCadError::Io {
                        path: out.display().to_string(),
                        reason: err.to_string(),
                    })?;
                    println!("view={view} bytes={} path={}", bytes.len(), out.display());
                }
                Screenshot::Unavailable(reason) => println!("view={view} unavailable: {reason}"),
            }
        }
        Command::Smoke => {
            let alive = client.ping().await?;
            let docs = client.list_documents().await?;
            let view = client.probe_active_view().await?;
            println!(
                "smoke ok: ping={alive} documents={} active_view={view:?}",
                docs.len()
            );
        }
        Command::Help => print_help(),
    }

    Ok(())
}

fn parse_args() -> Result<(CliConfig, Command), FreeCadError> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() {
        return Ok((default_config(), Command::Help));
    }

    let mut config = default_config();
    let mut index = 0;

    while index < args.len() {
        match args[index].as_str() {
            "--host" => {
                let value = option_value(&args, index, "--host")?;
                config.host = Some(value);
                args.drain(index..=index + 1);
            }
            "--port" => {
                let value = option_value(&args, index, "--port")?;
                config.port = Some(value.parse::<u16>().map_err(|err| FreeCadError::Config {
                    reason: format!("invalid --port value `{value}`: {err}"),
                })?);
                args.drain(index..=index + 1);
            }
            "--timeout-ms" => {
                let value = option_value(&args, index, "--timeout-ms")?;
                config.timeout_ms = value.parse::<u64>().map_err(|err| FreeCadError::Config {
                    reason: format!("invalid --timeout-ms value `{value}`: {err}"),
                })?;
                args.drain(index..=index + 1);
            }
            _ => {
                index += 1;
            }
        }
    }

    if args.is_empty() {
        return Ok((config, Command::Help));
    }

    let command = match args[0].as_str() {
        "help" | "--help" | "-h" => Command::Help,
        "ping" => Command::Ping,
        "docs" => Command::Docs,
        "parts" => Command::Parts,
        "smoke" => Command::Smoke,
        "objects" => {
            let doc = positional(&args, 1, "objects <doc>")?;
            let detailed = args.iter().skip(2).any(|arg| arg == "--detailed");
            Command::Objects { doc, detailed }
        }
        "object" => Command::Object {
            doc: positional(&args, 1, "object <doc> <name>")?,
            name: positional(&args, 2, "object <doc> <name>")?,
        },
        "exec" => Command::Exec {
            code: positional(&args, 1, "exec <code>")?,
        },
        "screenshot" => {
            let mut view = ViewName::Isometric;
            let mut out = None;
            let mut i = 1;
            while i < args.len() {
                match args[i].as_str() {
                    "--view" => {
                        let value = option_value(&args, i, "screenshot --view")?;
                        view = ViewName::from_str(&value)
                            .map_err(|err| FreeCadError::Config { reason: err })?;
                        i += 2;
                    }
                    "--out" => {
                        out = Some(PathBuf::from(option_value(&args, i, "screenshot --out")?));
                        i += 2;
                    }
                    _ => i += 1,
                }
            }
            Command::Screenshot { view, out }
        }
        other => {
            return Err(FreeCadError::Config {
                reason: format!("unknown command `{other}`"),
            });
        }
    };

    Ok((config, command))
}

fn option_value(args: &[String], index: usize, flag: &str) -> Result<String, FreeCadError> {
    args.get(index + 1)
        .cloned()
        .ok_or_else(|| FreeCadError::Config {
            reason: format!("missing value for {flag}"),
        })
}

fn positional(args: &[String], index: usize, usage: &str) -> Result<String, FreeCadError> {
    args.get(index)
        .filter(|value| !value.starts_with("--"))
        .cloned()
        .ok_or_else(|| FreeCadError::Config {
            reason: format!("usage: {usage}"),
        })
}

fn default_config() -> CliConfig {
    CliConfig {
        host: None,
        port: None,
        timeout_ms: 10_000,
    }
}

fn print_help() {
    println!(
        "freecad-rpc-cli\n\nUSAGE:\n  cargo run --bin freecad-rpc-cli -- [--host HOST] [--port N] [--timeout-ms N] <command> [command options]\n\nCOMMANDS:\n  ping                                   Check RPC connectivity\n  docs                                   List open documents\n  objects <doc> [--detailed]             Dump objects of a document (summary by default)\n  object <doc> <name>                    Dump one object with all properties\n  parts                                  List parts library entries\n  exec <code>                            Run Python inside FreeCAD\n  screenshot [--view V] [--out PATH]     Save the active view (default Isometric, ./<view>.webp)\n  smoke                                  ping + docs + active view probe\n  help                                   Show help\n\nVIEWS:\n  Isometric | Front | Top | Right | Back | Left | Bottom | Dimetric | Trimetric\n"
    );
}
