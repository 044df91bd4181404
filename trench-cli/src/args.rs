// SPDX-License-Identifier: Apache-2.0

use clap::Parser;

/// A terminal client for a Lisp-family evaluation service, speaking
/// either the B-proto (nREPL) or E-proto (prepl) wire protocol.
#[derive(Parser, Debug)]
#[command(name = "trench", version, about)]
pub struct Args {
    /// Port to connect to on localhost, when --server is not given.
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// File to read the port from (defaults to .nrepl-port / .prepl-port
    /// in the current directory, depending on --protocol).
    #[arg(long)]
    pub port_file: Option<String>,

    /// Wire protocol: "nrepl"/"n" or "prepl"/"p". Inferred from
    /// --server's scheme when omitted, else defaults to nrepl.
    #[arg(short = 'P', long)]
    pub protocol: Option<String>,

    /// Server address: "[(nrepl|prepl)://]host[:port]", or
    /// "nrepl+unix:<path>" for a Unix domain socket.
    #[arg(short = 's', long)]
    pub server: Option<String>,

    /// Evaluate this expression non-interactively and exit.
    #[arg(short = 'e', long)]
    pub eval: Option<String>,

    /// Load this file non-interactively and exit ("-" reads stdin).
    #[arg(short = 'f', long)]
    pub file: Option<String>,

    /// Require this namespace and invoke its -main with any trailing
    /// positional arguments, non-interactively.
    #[arg(short = 'm', long)]
    pub main: Option<String>,

    /// Load this file before the requested mode runs. Unlike --file,
    /// its results are always shown, even in non-interactive modes.
    #[arg(short = 'i', long)]
    pub init: Option<String>,

    /// Namespace to switch to once connected (E-proto only).
    #[arg(long)]
    pub init_ns: Option<String>,

    /// "always", "auto" (default; TTY-detected), or "none".
    #[arg(short = 'C', long, default_value = "auto")]
    pub color: String,

    /// Trace every sent/received wire frame.
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Forwarded to -main when --main is given.
    #[arg(trailing_var_arg = true)]
    pub args: Vec<String>,
}
