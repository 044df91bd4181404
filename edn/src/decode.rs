// SPDX-License-Identifier: Apache-2.0

use crate::{EdnError, Value};

/// Attempts to decode one EDN value from the front of `buf`, skipping
/// leading whitespace/commas. Returns `Ok(None)` if `buf` does not yet
/// hold a complete value.
pub fn decode(buf: &[u8]) -> std::result::Result<Option<(Value, usize)>, EdnError> {
    let mut cursor = Cursor { buf, pos: 0 };
    cursor.skip_whitespace();
    if cursor.pos >= cursor.buf.len() {
        return Ok(None);
    }
    match cursor.parse_value() {
        Ok(value) => Ok(Some((value, cursor.pos))),
        Err(Error::Incomplete) => Ok(None),
        Err(Error::Invalid(msg)) => Err(EdnError::Malformed(msg)),
    }
}

enum Error {
    Incomplete,
    Invalid(String),
}

type Result<T> = std::result::Result<T, Error>;

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'\t' | b'\n' | b'\r' | b',' | b'(' | b')' | b'[' | b']' | b'{' | b'}' | b'"' | b';'
    )
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Result<u8> {
        self.buf.get(self.pos).copied().ok_or(Error::Incomplete)
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.buf.get(self.pos) {
                Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') | Some(b',') => {
                    self.pos += 1;
                }
                Some(b';') => {
                    while let Some(&b) = self.buf.get(self.pos) {
                        self.pos += 1;
                        if b == b'\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        match self.peek()? {
            b'{' => self.parse_map(),
            b'[' => self.parse_seq(b']').map(Value::Vector),
            b'(' => self.parse_seq(b')').map(Value::List),
            b'#' => self.parse_dispatch(),
            b'"' => self.parse_string().map(Value::Str),
            b':' => self.parse_keyword(),
            b'-' | b'0'..=b'9' => self.parse_number_or_symbol(),
            _ => self.parse_symbol_like(),
        }
    }

    fn parse_dispatch(&mut self) -> Result<Value> {
        self.pos += 1; // '#'
        match self.peek()? {
            b'{' => self.parse_seq(b'}').map(Value::Set),
            b'_' => {
                self.pos += 1;
                self.skip_whitespace();
                self.parse_value()?; // discard
                self.skip_whitespace();
                self.parse_value()
            }
            _ => {
                // Tagged literal: #tag value — skip the tag, keep the value.
                self.parse_symbol_like()?;
                self.skip_whitespace();
                self.parse_value()
            }
        }
    }

    fn parse_seq(&mut self, close: u8) -> Result<Vec<Value>> {
        self.pos += 1; // opening delimiter
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek()? == close {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.parse_value()?);
        }
    }

    fn parse_map(&mut self) -> Result<Value> {
        self.pos += 1; // '{'
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek()? == b'}' {
                self.pos += 1;
                return Ok(Value::Map(entries));
            }
            let key = self.parse_value()?;
            self.skip_whitespace();
            let value = self.parse_value()?;
            entries.push((key, value));
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        self.pos += 1; // opening quote
        let mut out = String::new();
        loop {
            let b = self.peek()?;
            self.pos += 1;
            match b {
                b'"' => return Ok(out),
                b'\\' => {
                    let esc = self.peek()?;
                    self.pos += 1;
                    out.push(match esc {
                        b'n' => '\n',
                        b't' => '\t',
                        b'r' => '\r',
                        b'"' => '"',
                        b'\\' => '\\',
                        other => other as char,
                    });
                }
                other => out.push(other as char),
            }
        }
    }

    fn parse_keyword(&mut self) -> Result<Value> {
        self.pos += 1; // ':'
        let name = self.take_token()?;
        if name.is_empty() {
            return Err(Error::Invalid("empty keyword".into()));
        }
        Ok(Value::Keyword(name))
    }

    fn parse_number_or_symbol(&mut self) -> Result<Value> {
        let start = self.pos;
        if self.peek()? == b'-' {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while let Ok(b) = self.peek() {
            if b.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == digits_start {
            // Not actually numeric (e.g. the symbol `-main`); backtrack.
            self.pos = start;
            return self.parse_symbol_like();
        }
        // Trailing non-delimiter characters (like a decimal point) mean this
        // is not a plain integer; treat the whole token as a symbol instead.
        if matches!(self.buf.get(self.pos), Some(b) if !is_delimiter(*b)) {
            self.pos = start;
            return self.parse_symbol_like();
        }
        let text = std::str::from_utf8(&self.buf[start..self.pos]).unwrap();
        text.parse::<i64>()
            .map(Value::Int)
            .map_err(|_| Error::Invalid(format!("invalid number literal: {text}")))
    }

    fn take_token(&mut self) -> Result<String> {
        let start = self.pos;
        loop {
            match self.buf.get(self.pos) {
                Some(b) if !is_delimiter(*b) => self.pos += 1,
                Some(_) => break,
                None => break,
            }
        }
        if self.pos == start {
            return Err(Error::Incomplete);
        }
        Ok(String::from_utf8_lossy(&self.buf[start..self.pos]).into_owned())
    }

    fn parse_symbol_like(&mut self) -> Result<Value> {
        let token = self.take_token()?;
        match token.as_str() {
            "nil" => Ok(Value::Nil),
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Ok(Value::Symbol(token)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalars() {
        assert_eq!(decode(b"nil").unwrap().unwrap().0, Value::Nil);
        assert_eq!(decode(b"true").unwrap().unwrap().0, Value::Bool(true));
        assert_eq!(decode(b"42").unwrap().unwrap().0, Value::Int(42));
        assert_eq!(decode(b"-42").unwrap().unwrap().0, Value::Int(-42));
        assert_eq!(
            decode(br#""hi\n""#).unwrap().unwrap().0,
            Value::Str("hi\n".into())
        );
        assert_eq!(
            decode(b":foo/bar").unwrap().unwrap().0,
            Value::Keyword("foo/bar".into())
        );
    }

    #[test]
    fn parses_symbol_starting_with_a_dash() {
        assert_eq!(
            decode(b"-main").unwrap().unwrap().0,
            Value::Symbol("-main".into())
        );
    }

    #[test]
    fn reports_incomplete_for_unterminated_collections() {
        assert!(matches!(decode(b"{:a 1"), Ok(None)));
        assert!(matches!(decode(b"[1 2"), Ok(None)));
        assert!(matches!(decode(b"\"unterminated"), Err(_) | Ok(None)));
    }

    #[test]
    fn decode_reports_consumed_length_only_for_the_first_value() {
        let (_, consumed) = decode(b"1 2 3").unwrap().unwrap();
        assert_eq!(consumed, 1);
    }
}
