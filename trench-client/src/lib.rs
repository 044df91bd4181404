// SPDX-License-Identifier: Apache-2.0

//! Clients for the two Lisp-family evaluation wire protocols this tool
//! speaks: the length-delimited, bencode-framed B-proto (nREPL) and the
//! single-flight, EDN-framed E-proto (prepl).
//!
//! Both [`nrepl::NreplClient`] and [`prepl::PreplClient`] implement the
//! shared [`client::EvalClient`] trait so `trench-repl` and `trench-cli`
//! can stay generic over which protocol a session is using.

pub mod client;
pub mod error;
mod exception;
pub mod ids;
pub mod nrepl;
pub mod prepl;
pub mod result;
pub mod sink;
pub mod transport;

pub use client::EvalClient;
pub use error::ClientError;
pub use result::EvalResult;
