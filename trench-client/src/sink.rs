// SPDX-License-Identifier: Apache-2.0

/// Destination for a client's side-channel output (stdout/stderr chunks
/// and triage-formatted error text). Implemented by the REPL's printer;
/// kept as a trait here so the client crate never depends on `colored`
/// or any terminal concept.
pub trait OutputSink: Send + Sync {
    fn write_out(&self, chunk: &str);
    fn write_err(&self, chunk: &str);
}

/// A sink that discards everything. Useful for non-interactive one-shot
/// evaluations that only care about the returned `EvalResult`, and in
/// tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write_out(&self, _chunk: &str) {}
    fn write_err(&self, _chunk: &str) {}
}
