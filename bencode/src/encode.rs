// SPDX-License-Identifier: Apache-2.0

use crate::Datum;

/// Encodes `datum` to its canonical bencode representation. Dict keys are
/// always emitted in lexicographic byte order ([`Datum::Dict`] is a
/// `BTreeMap`, so iteration order already matches the wire contract).
pub fn encode(datum: &Datum) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(datum, &mut out);
    out
}

fn encode_into(datum: &Datum, out: &mut Vec<u8>) {
    match datum {
        Datum::Int(n) => {
            out.push(b'i');
            out.extend_from_slice(n.to_string().as_bytes());
            out.push(b'e');
        }
        Datum::Bytes(bytes) => {
            out.extend_from_slice(bytes.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(bytes);
        }
        Datum::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        Datum::Dict(map) => {
            out.push(b'd');
            for (key, value) in map {
                encode_into(&Datum::Bytes(key.clone()), out);
                encode_into(value, out);
            }
            out.push(b'e');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;

    #[test]
    fn encodes_primitives() {
        assert_eq!(encode(&Datum::Int(42)), b"i42e");
        assert_eq!(encode(&Datum::Int(-42)), b"i-42e");
        assert_eq!(encode(&Datum::from("foobar")), b"6:foobar");
    }

    #[test]
    fn encode_decode_round_trips_sorted_dicts() {
        let original = "d3:bari2e3:bazi3e3:fooi1ee";
        let (datum, _) = decode(original.as_bytes()).unwrap().unwrap();
        assert_eq!(encode(&datum), original.as_bytes());
    }
}
