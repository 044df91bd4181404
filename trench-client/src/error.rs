// SPDX-License-Identifier: Apache-2.0

use std::io;

/// Errors surfaced by either protocol client. Kinds mirror the failure
/// taxonomy in the error-handling design: most are terminal for the
/// client's receive loop.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection closed by the server")]
    Disconnected,

    #[error("malformed frame on the wire: {0}")]
    MalformedFrame(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("illegal session: {0}")]
    IllegalSession(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl From<bencode::BencodeError> for ClientError {
    fn from(err: bencode::BencodeError) -> Self {
        ClientError::MalformedFrame(err.to_string())
    }
}

impl From<edn::EdnError> for ClientError {
    fn from(err: edn::EdnError) -> Self {
        ClientError::MalformedFrame(err.to_string())
    }
}
