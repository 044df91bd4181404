// SPDX-License-Identifier: Apache-2.0

//! A minimal bencode codec: integers, byte-strings, lists and dicts.
//!
//! The decoder is incremental — [`decode`] reports [`Ok(None)`] when the
//! supplied buffer does not yet contain a complete datum, so callers can
//! feed it growing buffers off a byte stream without re-parsing from
//! scratch. [`encode`] always emits dict keys in lexicographic byte
//! order, matching the wire contract regardless of insertion order.

use std::collections::BTreeMap;
use std::fmt;

mod decode;
mod encode;

pub use decode::decode;
pub use encode::encode;

/// A bencode value: integer, byte-string, ordered list, or byte-string-keyed
/// dict. There are no floats, booleans, or null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datum {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<Datum>),
    Dict(BTreeMap<Vec<u8>, Datum>),
}

impl Datum {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Datum]> {
        match self {
            Datum::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, Datum>> {
        match self {
            Datum::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn into_dict(self) -> Option<BTreeMap<Vec<u8>, Datum>> {
        match self {
            Datum::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Datum> {
        self.as_dict().and_then(|d| d.get(key.as_bytes()))
    }

    /// Builds a dict `Datum` from `(key, value)` pairs. Keys may be given as
    /// `&str` and are stored as raw bytes; [`encode`] sorts them.
    pub fn dict<I, K>(entries: I) -> Datum
    where
        I: IntoIterator<Item = (K, Datum)>,
        K: Into<Vec<u8>>,
    {
        Datum::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Int(n) => write!(f, "{n}"),
            Datum::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => write!(f, "{s:?}"),
                Err(_) => write!(f, "{b:?}"),
            },
            Datum::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Datum::Dict(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", String::from_utf8_lossy(k), v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for Datum {
    fn from(n: i64) -> Self {
        Datum::Int(n)
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::Bytes(s.as_bytes().to_vec())
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::Bytes(s.into_bytes())
    }
}

impl From<Vec<Datum>> for Datum {
    fn from(items: Vec<Datum>) -> Self {
        Datum::List(items)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BencodeError {
    #[error("malformed bencode frame: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_nested_structure() {
        let datum = Datum::dict([
            ("foo", Datum::from(100)),
            ("bar", Datum::from("hello")),
            (
                "baz",
                Datum::List(vec![Datum::from(1), Datum::from(2), Datum::from(-3)]),
            ),
        ]);
        let encoded = encode(&datum);
        let (decoded, consumed) = decode(&encoded).unwrap().unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, datum);
    }

    #[test]
    fn dict_encodes_keys_in_byte_order() {
        let datum = Datum::dict([
            ("foo", Datum::from(1)),
            ("bar", Datum::from(2)),
            ("baz", Datum::from(3)),
        ]);
        let encoded = encode(&datum);
        assert_eq!(
            String::from_utf8_lossy(&encoded),
            "d3:bari2e3:bazi3e3:fooi1ee"
        );
    }
}
