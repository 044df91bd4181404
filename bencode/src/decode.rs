// SPDX-License-Identifier: Apache-2.0

use crate::{BencodeError, Datum};
use std::collections::BTreeMap;

/// Attempts to decode one datum from the front of `buf`.
///
/// Returns `Ok(None)` if `buf` does not yet hold a complete datum (the
/// caller should read more bytes and retry with a larger buffer), or
/// `Ok(Some((datum, consumed)))` where `consumed` is the number of bytes
/// that made up the datum.
pub fn decode(buf: &[u8]) -> std::result::Result<Option<(Datum, usize)>, BencodeError> {
    let mut cursor = Cursor { buf, pos: 0 };
    match cursor.decode_datum() {
        Ok(datum) => Ok(Some((datum, cursor.pos))),
        Err(Error::Incomplete) => Ok(None),
        Err(Error::Invalid(msg)) => Err(BencodeError::Malformed(msg)),
    }
}

enum Error {
    Incomplete,
    Invalid(String),
}

type Result<T> = std::result::Result<T, Error>;

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Result<u8> {
        self.buf.get(self.pos).copied().ok_or(Error::Incomplete)
    }

    fn advance(&mut self) -> Result<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(Error::Incomplete);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn decode_datum(&mut self) -> Result<Datum> {
        match self.peek()? {
            b'i' => self.decode_int(),
            b'l' => self.decode_list(),
            b'd' => self.decode_dict(),
            b'0'..=b'9' => self.decode_bytes().map(Datum::Bytes),
            other => Err(Error::Invalid(format!(
                "unexpected leading byte '{}'",
                other as char
            ))),
        }
    }

    /// Reads a run of ASCII digits terminated by `delim`, without a sign.
    fn decode_digits(&mut self, delim: u8) -> Result<i64> {
        let start = self.pos;
        let mut saw_digit = false;
        loop {
            match self.peek()? {
                b'0'..=b'9' => {
                    saw_digit = true;
                    self.pos += 1;
                }
                b if b == delim => break,
                other => {
                    return Err(Error::Invalid(format!(
                        "expected digit or '{}', got '{}'",
                        delim as char, other as char
                    )))
                }
            }
        }
        if !saw_digit {
            return Err(Error::Invalid("empty numeric field".into()));
        }
        let digits = &self.buf[start..self.pos];
        if digits.len() > 1 && digits[0] == b'0' {
            return Err(Error::Invalid("leading zero in numeric field".into()));
        }
        self.pos += 1; // consume delim
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| Error::Invalid("numeric field overflow".into()))
    }

    fn decode_int(&mut self) -> Result<Datum> {
        self.advance()?; // 'i'
        let negative = self.peek()? == b'-';
        if negative {
            self.pos += 1;
            if self.peek()? == b'0' {
                return Err(Error::Invalid("negative zero is not allowed".into()));
            }
        }
        let n = self.decode_digits(b'e')?;
        Ok(Datum::Int(if negative { -n } else { n }))
    }

    fn decode_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.decode_digits(b':')? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn decode_list(&mut self) -> Result<Datum> {
        self.advance()?; // 'l'
        let mut items = Vec::new();
        loop {
            if self.peek()? == b'e' {
                self.pos += 1;
                return Ok(Datum::List(items));
            }
            items.push(self.decode_datum()?);
        }
    }

    fn decode_dict(&mut self) -> Result<Datum> {
        self.advance()?; // 'd'
        let mut map = BTreeMap::new();
        loop {
            if self.peek()? == b'e' {
                self.pos += 1;
                return Ok(Datum::Dict(map));
            }
            let key = self.decode_bytes()?;
            let value = self.decode_datum()?;
            map.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(s: &str) -> Datum {
        let (datum, consumed) = decode(s.as_bytes()).unwrap().unwrap();
        assert_eq!(consumed, s.len());
        datum
    }

    #[test]
    fn decodes_positive_integer() {
        assert_eq!(decode_all("i42e"), Datum::Int(42));
    }

    #[test]
    fn decodes_negative_integer() {
        assert_eq!(decode_all("i-42e"), Datum::Int(-42));
    }

    #[test]
    fn rejects_negative_zero() {
        assert!(decode(b"i-0e").is_err());
    }

    #[test]
    fn decodes_byte_string() {
        assert_eq!(decode_all("6:foobar"), Datum::Bytes(b"foobar".to_vec()));
    }

    #[test]
    fn decodes_list() {
        assert_eq!(
            decode_all("l3:foo3:bar3:baze"),
            Datum::List(vec![
                Datum::from("foo"),
                Datum::from("bar"),
                Datum::from("baz"),
            ])
        );
    }

    #[test]
    fn decodes_dict_regardless_of_key_order() {
        let datum = decode_all("d3:fooi100e3:bari200e3:bazi300ee");
        let dict = datum.as_dict().unwrap();
        assert_eq!(dict.get(&b"foo"[..]), Some(&Datum::Int(100)));
        assert_eq!(dict.get(&b"bar"[..]), Some(&Datum::Int(200)));
        assert_eq!(dict.get(&b"baz"[..]), Some(&Datum::Int(300)));
    }

    #[test]
    fn reports_incomplete_frames_without_erroring() {
        assert!(matches!(decode(b"d3:foo"), Ok(None)));
        assert!(matches!(decode(b"l3:foo3:bar"), Ok(None)));
        assert!(matches!(decode(b"6:foo"), Ok(None)));
    }

    #[test]
    fn decodes_a_list_of_dicts() {
        let datum = decode_all("ld4:name5:alice3:agei20eed4:name3:bob3:agei30eee");
        let list = datum.as_list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].get("name").and_then(Datum::as_str), Some("alice"));
        assert_eq!(list[1].get("age"), Some(&Datum::Int(30)));
    }

    #[test]
    fn rejects_invalid_leading_byte() {
        assert!(decode(b"x").is_err());
    }
}
