// SPDX-License-Identifier: Apache-2.0

//! The REPL driver: prompt loop, multi-line continuation, result/stdin
//! multiplexing, and interrupt wiring.

use std::io::{self, Read};
use std::sync::Arc;

use tokio::sync::mpsc;
use trench_client::client::EvalClient;
use trench_client::result::EvalResult;

use crate::linebuf::{Feed, LineBuffer};
use crate::printer::Printer;
use crate::reader::{InterruptibleReader, ReadOutcome};

const QUIT: &str = ":repl/quit";

pub struct Repl<R> {
    client: Arc<dyn EvalClient>,
    reader: Arc<InterruptibleReader<R>>,
    printer: Printer,
    line_buffer: LineBuffer,
    hides_nil: bool,
}

impl<R> Repl<R>
where
    R: io::Read + Send + 'static,
{
    pub fn new(
        client: Arc<dyn EvalClient>,
        reader: Arc<InterruptibleReader<R>>,
        printer: Printer,
        hides_nil: bool,
    ) -> Self {
        Repl {
            client,
            reader,
            printer,
            line_buffer: LineBuffer::new(),
            hides_nil,
        }
    }

    /// Subscribes a background task to OS interrupt (Ctrl-C). On each
    /// signal, interrupts the client first so remote work begins
    /// aborting, then interrupts the local reader so an in-flight
    /// `read_line` unblocks.
    pub fn spawn_interrupt_wiring(&self) {
        let client = self.client.clone();
        let reader = self.reader.clone();
        tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                let _ = client.interrupt().await;
                reader.interrupt();
            }
        });
    }

    fn render_prompt(&self) -> String {
        let ns = self.client.current_ns();
        if self.line_buffer.is_empty() {
            format!("{ns}=> ")
        } else {
            format!("{}#_=> ", " ".repeat(ns.len()))
        }
    }

    pub async fn run_interactive(&mut self) {
        loop {
            self.printer.print_prompt(&self.render_prompt());

            let line = match self.reader.read_line().await {
                Ok(ReadOutcome::Line(line)) => line,
                Ok(ReadOutcome::Interrupted) => {
                    if self.line_buffer.is_empty() {
                        return;
                    }
                    self.line_buffer.reset();
                    println!();
                    continue;
                }
                Ok(ReadOutcome::Eof) | Err(_) => return,
            };

            let code = match self.line_buffer.feed(&line) {
                Ok(Feed::Continued) => continue,
                Ok(Feed::Completed(code)) => code,
                Err(err) => {
                    eprintln!("{err}");
                    self.line_buffer.reset();
                    continue;
                }
            };

            let trimmed = code.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed == QUIT {
                return;
            }

            match self.client.eval(trimmed).await {
                Ok(rx) => self.handle_results(rx).await,
                Err(err) => eprintln!("{err}"),
            }
        }
    }

    /// Non-interactive single evaluation; used by `--eval`.
    pub async fn eval_once(&mut self, code: &str) -> Result<(), trench_client::ClientError> {
        let rx = self.client.eval(code).await?;
        self.handle_results(rx).await;
        Ok(())
    }

    /// Non-interactive file load; used by `--file`. `filename == "-"`
    /// reads from stdin instead of opening a file.
    pub async fn load_file(&mut self, filename: &str) -> io::Result<()> {
        self.load_file_inner(filename, self.hides_nil).await
    }

    /// Loads `filename` for `--init`, whose results are always shown even
    /// when the active mode would otherwise hide a bare `nil`.
    pub async fn load_file_with_visible_results(&mut self, filename: &str) -> io::Result<()> {
        self.load_file_inner(filename, false).await
    }

    async fn load_file_inner(&mut self, filename: &str, hides_nil: bool) -> io::Result<()> {
        let content = if filename == "-" {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(filename)?
        };
        match self.client.load(filename, &content).await {
            Ok(rx) => self.handle_results_with_visibility(rx, hides_nil).await,
            Err(err) => eprintln!("{err}"),
        }
        Ok(())
    }

    /// Consumes one evaluation's result stream, printing successful
    /// values and forwarding reader lines as stdin until the channel
    /// closes. This multiplexing is what lets the user answer
    /// `(read-line)` prompts mid-evaluation.
    async fn handle_results(&mut self, rx: mpsc::Receiver<EvalResult>) {
        self.handle_results_with_visibility(rx, self.hides_nil).await
    }

    async fn handle_results_with_visibility(
        &mut self,
        mut rx: mpsc::Receiver<EvalResult>,
        hides_nil: bool,
    ) {
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Some(EvalResult::Value(value)) => {
                            if !(hides_nil && value == "nil") {
                                self.printer.print_result(&value);
                            }
                        }
                        Some(EvalResult::RuntimeError(_)) => {
                            // Already emitted on the stderr sink by the client.
                        }
                        None => return,
                    }
                }
                line = self.reader.read_line() => {
                    if let Ok(ReadOutcome::Line(s)) = line {
                        let _ = self.client.stdin(&s).await;
                    }
                    // EOF and Interrupted are absorbed silently; the
                    // client's own interrupt handling unblocks the eval.
                }
            }
        }
    }
}
