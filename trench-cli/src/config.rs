// SPDX-License-Identifier: Apache-2.0

use std::io::IsTerminal;

use crate::args::Args;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Nrepl,
    Prepl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAddr {
    Tcp { host: String, port: u16 },
    Unix { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Eval(String),
    File(String),
    Main(String),
    Interactive,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub protocol: Protocol,
    pub addr: ServerAddr,
    pub mode: Mode,
    pub init: Option<String>,
    pub init_ns: Option<String>,
    pub color: bool,
    pub debug: bool,
    pub trailing_args: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown protocol '{0}' (expected nrepl/n or prepl/p)")]
    UnknownProtocol(String),
    #[error("unknown color mode '{0}' (expected always, auto, or none)")]
    UnknownColor(String),
    #[error("could not determine server address: no --server, --port, or readable port file")]
    NoAddress,
    #[error("malformed --server value: {0}")]
    MalformedServer(String),
    #[error("could not read port file {path}: {source}")]
    PortFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl Config {
    pub fn resolve(args: Args) -> Result<Config, ConfigError> {
        let server_scheme = args.server.as_deref().and_then(server_scheme);
        let protocol = resolve_protocol(args.protocol.as_deref(), server_scheme)?;
        let addr = resolve_addr(&args, protocol)?;
        let color = resolve_color(&args.color)?;
        let mode = resolve_mode(&args);

        Ok(Config {
            protocol,
            addr,
            mode,
            init: args.init,
            init_ns: args.init_ns,
            color,
            debug: args.debug,
            trailing_args: args.args,
        })
    }
}

fn resolve_mode(args: &Args) -> Mode {
    if let Some(code) = &args.eval {
        Mode::Eval(code.clone())
    } else if let Some(file) = &args.file {
        Mode::File(file.clone())
    } else if let Some(ns) = &args.main {
        Mode::Main(ns.clone())
    } else {
        Mode::Interactive
    }
}

fn resolve_color(raw: &str) -> Result<bool, ConfigError> {
    match raw {
        "always" => Ok(true),
        "none" => Ok(false),
        "auto" => Ok(std::io::stdout().is_terminal()),
        other => Err(ConfigError::UnknownColor(other.to_string())),
    }
}

fn server_scheme(server: &str) -> Option<&'static str> {
    if server.starts_with("nrepl+unix:") {
        Some("nrepl")
    } else if server.starts_with("prepl://") {
        Some("prepl")
    } else if server.starts_with("nrepl://") {
        Some("nrepl")
    } else {
        None
    }
}

fn resolve_protocol(
    explicit: Option<&str>,
    inferred: Option<&str>,
) -> Result<Protocol, ConfigError> {
    let raw = explicit.or(inferred).unwrap_or("nrepl");
    match raw {
        "nrepl" | "n" => Ok(Protocol::Nrepl),
        "prepl" | "p" => Ok(Protocol::Prepl),
        other => Err(ConfigError::UnknownProtocol(other.to_string())),
    }
}

fn resolve_addr(args: &Args, protocol: Protocol) -> Result<ServerAddr, ConfigError> {
    if let Some(server) = &args.server {
        return parse_server(server);
    }
    if let Some(port) = args.port {
        return Ok(ServerAddr::Tcp {
            host: "localhost".to_string(),
            port,
        });
    }

    let default_name = match protocol {
        Protocol::Nrepl => ".nrepl-port",
        Protocol::Prepl => ".prepl-port",
    };
    let path = args
        .port_file
        .clone()
        .unwrap_or_else(|| default_name.to_string());
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let port: u16 = contents
                .trim()
                .parse()
                .map_err(|_| ConfigError::MalformedServer(format!("port file {path} is not an integer")))?;
            Ok(ServerAddr::Tcp {
                host: "localhost".to_string(),
                port,
            })
        }
        Err(source) if args.port_file.is_some() => Err(ConfigError::PortFile { path, source }),
        Err(_) => Err(ConfigError::NoAddress),
    }
}

fn parse_server(server: &str) -> Result<ServerAddr, ConfigError> {
    if let Some(path) = server.strip_prefix("nrepl+unix:") {
        return Ok(ServerAddr::Unix { path: path.to_string() });
    }
    let rest = server
        .strip_prefix("nrepl://")
        .or_else(|| server.strip_prefix("prepl://"))
        .unwrap_or(server);
    let (host, port) = rest
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::MalformedServer(server.to_string()))?;
    let port: u16 = port
        .parse()
        .map_err(|_| ConfigError::MalformedServer(server.to_string()))?;
    Ok(ServerAddr::Tcp {
        host: host.to_string(),
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            port: None,
            port_file: None,
            protocol: None,
            server: None,
            eval: None,
            file: None,
            main: None,
            init: None,
            init_ns: None,
            color: "auto".to_string(),
            debug: false,
            args: vec![],
        }
    }

    #[test]
    fn parses_a_bare_host_port_server() {
        assert_eq!(
            parse_server("example.com:7888").unwrap(),
            ServerAddr::Tcp {
                host: "example.com".to_string(),
                port: 7888
            }
        );
    }

    #[test]
    fn parses_an_nrepl_scheme_server() {
        assert_eq!(
            parse_server("nrepl://localhost:7888").unwrap(),
            ServerAddr::Tcp {
                host: "localhost".to_string(),
                port: 7888
            }
        );
    }

    #[test]
    fn parses_a_unix_socket_server() {
        assert_eq!(
            parse_server("nrepl+unix:/tmp/repl.sock").unwrap(),
            ServerAddr::Unix {
                path: "/tmp/repl.sock".to_string()
            }
        );
    }

    #[test]
    fn infers_protocol_from_server_scheme() {
        let mut args = base_args();
        args.server = Some("prepl://localhost:5555".to_string());
        let config = Config::resolve(args).unwrap();
        assert_eq!(config.protocol, Protocol::Prepl);
    }

    #[test]
    fn explicit_protocol_flag_wins_over_server_scheme() {
        let mut args = base_args();
        args.server = Some("prepl://localhost:5555".to_string());
        args.protocol = Some("n".to_string());
        let config = Config::resolve(args).unwrap();
        assert_eq!(config.protocol, Protocol::Nrepl);
    }

    #[test]
    fn eval_mode_takes_priority_over_interactive() {
        let mut args = base_args();
        args.server = Some("localhost:7888".to_string());
        args.eval = Some("(+ 1 2)".to_string());
        let config = Config::resolve(args).unwrap();
        assert_eq!(config.mode, Mode::Eval("(+ 1 2)".to_string()));
    }

    #[test]
    fn no_address_source_is_an_error() {
        let args = base_args();
        assert!(matches!(Config::resolve(args), Err(ConfigError::NoAddress)));
    }
}
