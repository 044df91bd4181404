// SPDX-License-Identifier: Apache-2.0

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::result::EvalResult;

/// Protocol-agnostic surface the REPL driver programs against. Both the
/// B-proto and E-proto clients implement this so `trench-repl` and
/// `trench-cli` never need to know which wire protocol is in play.
///
/// Methods return boxed futures rather than using `async fn` in the
/// trait because the entrypoint holds a `Box<dyn EvalClient>` (see
/// SPEC_FULL.md's entrypoint wiring), and `async fn` in traits is not
/// object-safe.
pub trait EvalClient: Send + Sync {
    fn eval<'a>(
        &'a self,
        code: &'a str,
    ) -> BoxFuture<'a, Result<mpsc::Receiver<EvalResult>, ClientError>>;

    fn load<'a>(
        &'a self,
        filename: &'a str,
        content: &'a str,
    ) -> BoxFuture<'a, Result<mpsc::Receiver<EvalResult>, ClientError>>;

    fn stdin<'a>(&'a self, input: &'a str) -> BoxFuture<'a, Result<(), ClientError>>;

    fn interrupt(&self) -> BoxFuture<'_, Result<(), ClientError>>;

    fn supports_op(&self, name: &str) -> bool;

    fn close(&self) -> BoxFuture<'_, Result<(), ClientError>>;

    /// Current namespace, for the REPL prompt.
    fn current_ns(&self) -> String;
}
