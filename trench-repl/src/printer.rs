// SPDX-License-Identifier: Apache-2.0

//! Color-attributed writes to stdout/stderr: out chunks in yellow, err
//! chunks in red, successful results in green. Matches the original
//! tool's scheme.

use colored::{Color, Colorize};
use std::io::Write;
use trench_client::sink::OutputSink;

#[derive(Debug, Clone, Copy)]
pub struct Printer {
    color: bool,
}

impl Printer {
    pub fn new(color: bool) -> Self {
        Printer { color }
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    /// Prints a successfully-evaluated result to stdout in the success
    /// color, followed by a newline.
    pub fn print_result(&self, value: &str) {
        println!("{}", self.paint(value, Color::Green));
    }

    pub fn print_prompt(&self, prompt: &str) {
        print!("{prompt}");
        let _ = std::io::stdout().flush();
    }
}

impl OutputSink for Printer {
    fn write_out(&self, chunk: &str) {
        print!("{}", self.paint(chunk, Color::Yellow));
        let _ = std::io::stdout().flush();
    }

    fn write_err(&self, chunk: &str) {
        eprint!("{}", self.paint(chunk, Color::Red));
        let _ = std::io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paint_is_a_no_op_when_color_is_disabled() {
        let printer = Printer::new(false);
        assert_eq!(printer.paint("hi", Color::Red), "hi");
    }

    #[test]
    fn paint_wraps_with_ansi_codes_when_color_is_enabled() {
        let printer = Printer::new(true);
        assert_ne!(printer.paint("hi", Color::Red), "hi");
        assert!(printer.paint("hi", Color::Red).contains("hi"));
    }
}
