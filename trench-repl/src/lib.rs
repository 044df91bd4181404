// SPDX-License-Identifier: Apache-2.0

//! The interactive and non-interactive drivers built on top of
//! `trench-client`'s `EvalClient`: an interruptible line reader, a
//! bracket/string-aware line buffer, a color-coded printer, and the
//! REPL loop that ties them together.

pub mod linebuf;
pub mod printer;
pub mod reader;
pub mod repl;

pub use linebuf::LineBuffer;
pub use printer::Printer;
pub use reader::InterruptibleReader;
pub use repl::Repl;
