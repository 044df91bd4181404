// SPDX-License-Identifier: Apache-2.0

//! Entrypoint: parse arguments, resolve configuration, connect the
//! chosen protocol client, and dispatch into eval/file/main/interactive
//! mode.

mod args;
mod config;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use trench_client::client::EvalClient;
use trench_client::nrepl::{NreplClient, NreplOptions};
use trench_client::prepl::{PreplClient, PreplOptions};
use trench_client::transport::{connect_tcp, connect_unix};
use trench_repl::{InterruptibleReader, Printer, Repl};

use args::Args;
use config::{Config, Mode, Protocol, ServerAddr};

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("{}", format!("failed to start async runtime: {err}").red());
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", format!("{err:#}").red());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("trench=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let config = Config::resolve(args).context("could not resolve configuration")?;

    let printer = Printer::new(config.color);
    let sink: Arc<dyn trench_client::sink::OutputSink> = Arc::new(printer);

    let client = connect_with_retry(&config, sink.clone())
        .await
        .context("could not connect to the server")?;

    // Non-interactive modes hide a bare `nil` result; the interactive REPL
    // always shows it, since seeing what a form returned is the point.
    let hides_nil = !matches!(config.mode, Mode::Interactive);
    let mut repl = Repl::new(
        client.clone(),
        Arc::new(InterruptibleReader::new(std::io::stdin())),
        printer,
        hides_nil,
    );

    if let Some(init) = &config.init {
        // --init's results are always shown, even when the requested mode
        // would otherwise hide them.
        repl.load_file_with_visible_results(init).await?;
    }

    let result = match &config.mode {
        Mode::Eval(code) => repl.eval_once(code).await.map_err(anyhow::Error::from),
        Mode::File(path) => repl.load_file(path).await.map_err(anyhow::Error::from),
        Mode::Main(ns) => {
            let code = build_main_invocation(ns, &config.trailing_args);
            repl.eval_once(&code).await.map_err(anyhow::Error::from)
        }
        Mode::Interactive => {
            repl.spawn_interrupt_wiring();
            repl.run_interactive().await;
            Ok(())
        }
    };

    let _ = client.close().await;
    result
}

/// Connects once, retrying a single time after a short backoff if the
/// first attempt fails. A server that has just been started may not yet
/// be accepting connections.
async fn connect_with_retry(
    config: &Config,
    sink: Arc<dyn trench_client::sink::OutputSink>,
) -> Result<Arc<dyn EvalClient>, trench_client::ClientError> {
    match connect_once(config, sink.clone()).await {
        Ok(client) => Ok(client),
        Err(_) => {
            tokio::time::sleep(std::time::Duration::from_millis(250)).await;
            connect_once(config, sink).await
        }
    }
}

async fn connect_once(
    config: &Config,
    sink: Arc<dyn trench_client::sink::OutputSink>,
) -> Result<Arc<dyn EvalClient>, trench_client::ClientError> {
    match (&config.addr, config.protocol) {
        (ServerAddr::Tcp { host, port }, Protocol::Nrepl) => {
            let stream = connect_tcp(host, *port).await?;
            let options = NreplOptions {
                debug: config.debug,
                sink,
                ..Default::default()
            };
            let client = NreplClient::connect(stream, options).await?;
            Ok(Arc::new(client))
        }
        (ServerAddr::Tcp { host, port }, Protocol::Prepl) => {
            let stream = connect_tcp(host, *port).await?;
            let options = PreplOptions {
                debug: config.debug,
                sink,
                init_ns: config.init_ns.clone(),
            };
            let client = PreplClient::connect(stream, options).await?;
            Ok(Arc::new(client))
        }
        (ServerAddr::Unix { path }, Protocol::Nrepl) => {
            let stream = connect_unix(path).await?;
            let options = NreplOptions {
                debug: config.debug,
                sink,
                ..Default::default()
            };
            let client = NreplClient::connect(stream, options).await?;
            Ok(Arc::new(client))
        }
        (ServerAddr::Unix { path }, Protocol::Prepl) => {
            let stream = connect_unix(path).await?;
            let options = PreplOptions {
                debug: config.debug,
                sink,
                init_ns: config.init_ns.clone(),
            };
            let client = PreplClient::connect(stream, options).await?;
            Ok(Arc::new(client))
        }
    }
}

/// Builds the expression `--main` evaluates: requires the namespace, calls
/// its `-main` with the trailing positional args, and returns `nil` so the
/// (already-hidden, in non-interactive mode) result stays uninteresting.
fn build_main_invocation(ns: &str, args: &[String]) -> String {
    let rendered_args = args
        .iter()
        .map(|a| format!("{a:?}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!("(do (require '{ns}) ({ns}/-main {rendered_args}) nil)")
}
