//! Cursor encoding and decoding.
//!
//! Two cursor shapes are supported:
//!
//! - key cursors, `hex(pk)`, e.g. `0x1f`
//! - indexed cursors, `hex(index),hex(pk)`, e.g. `0x2,0x1f`
//!
//! Cursors are only meaningful for the ordering and snapshot that
//! produced them.

use crate::error::{PaginationError, PaginationResult};
use crate::models::{MAX_KEY, Record};
use crate::ports::Cursor;

/// Which cursor shape a codec reads and writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorKind {
    /// `hex(pk)`.
    #[default]
    Key,
    /// `hex(index),hex(pk)`.
    Indexed,
}

/// Position decoded from a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedCursor {
    pub pk: u64,
    /// Absolute row offset, for indexed cursors.
    pub index: Option<usize>,
}

/// Encoder/decoder for one [`CursorKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorCodec {
    kind: CursorKind,
}

impl CursorCodec {
    pub const KEY: CursorCodec = CursorCodec {
        kind: CursorKind::Key,
    };
    pub const INDEXED: CursorCodec = CursorCodec {
        kind: CursorKind::Indexed,
    };

    pub fn kind(&self) -> CursorKind {
        self.kind
    }

    /// Cursor for `record`, located at `index` for indexed cursors.
    ///
    /// Key cursors ignore `index`; indexed cursors without one use 0.
    pub fn encode(&self, record: &Record, index: Option<usize>) -> Cursor {
        match self.kind {
            CursorKind::Key => Cursor::new(format!("{:#x}", record.pk)),
            CursorKind::Indexed => Cursor::new(format!(
                "{:#x},{:#x}",
                index.unwrap_or_default(),
                record.pk
            )),
        }
    }

    pub fn decode(&self, cursor: &Cursor) -> PaginationResult<DecodedCursor> {
        let raw = cursor.value.trim();
        match self.kind {
            CursorKind::Key => {
                if raw.contains(',') {
                    return Err(invalid(raw, "expected a single key"));
                }
                Ok(DecodedCursor {
                    pk: parse_key(raw)?,
                    index: None,
                })
            }
            CursorKind::Indexed => {
                let (index, pk) = raw
                    .split_once(',')
                    .ok_or_else(|| invalid(raw, "expected `index,key`"))?;
                if pk.contains(',') {
                    return Err(invalid(raw, "expected exactly two parts"));
                }
                let index = usize::try_from(parse_hex(index)?)
                    .map_err(|_| invalid(raw, "index out of range"))?;
                Ok(DecodedCursor {
                    pk: parse_key(pk)?,
                    index: Some(index),
                })
            }
        }
    }
}

fn parse_hex(part: &str) -> PaginationResult<u64> {
    let part = part.trim();
    let digits = part
        .strip_prefix("0x")
        .or_else(|| part.strip_prefix("0X"))
        .unwrap_or(part);

    // from_str_radix tolerates a leading sign, cursors do not
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid(part, "not a hexadecimal number"));
    }

    u64::from_str_radix(digits, 16).map_err(|e| invalid(part, &e.to_string()))
}

fn parse_key(part: &str) -> PaginationResult<u64> {
    let pk = parse_hex(part)?;
    if pk > MAX_KEY {
        return Err(invalid(part.trim(), "key out of range"));
    }
    Ok(pk)
}

fn invalid(raw: &str, reason: &str) -> PaginationError {
    PaginationError::InvalidCursor(format!("`{}`: {}", raw, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_cursor_format_and_roundtrip() {
        let record = Record::new(31);
        let cursor = CursorCodec::KEY.encode(&record, Some(99));
        assert_eq!(cursor.value, "0x1f");

        let decoded = CursorCodec::KEY.decode(&cursor).unwrap();
        assert_eq!(decoded, DecodedCursor { pk: 31, index: None });
    }

    #[test]
    fn test_indexed_cursor_format_and_roundtrip() {
        let record = Record::new(255);
        let cursor = CursorCodec::INDEXED.encode(&record, Some(10));
        assert_eq!(cursor.value, "0xa,0xff");

        let decoded = CursorCodec::INDEXED.decode(&cursor).unwrap();
        assert_eq!(decoded, DecodedCursor { pk: 255, index: Some(10) });
    }

    #[test]
    fn test_decode_accepts_unprefixed_and_uppercase() {
        let decoded = CursorCodec::KEY.decode(&Cursor::new("FF")).unwrap();
        assert_eq!(decoded.pk, 255);
        let decoded = CursorCodec::INDEXED.decode(&Cursor::new("0X1, 0x2")).unwrap();
        assert_eq!((decoded.index, decoded.pk), (Some(1), 2));
    }

    // Test critique: les curseurs mal formés sont rejetés, jamais de panic
    #[test]
    fn test_decode_rejects_malformed() {
        let bad_keys = ["", "0x", "zz", "-1", "+1", "0x1,0x2", "ffffffffffffffffff"];
        for raw in bad_keys {
            let err = CursorCodec::KEY.decode(&Cursor::new(raw)).unwrap_err();
            assert!(matches!(err, PaginationError::InvalidCursor(_)), "raw = {:?}", raw);
        }

        let bad_indexed = ["0x1", "0x1,", ",0x1", "0x1,0x2,0x3", "g,1"];
        for raw in bad_indexed {
            assert!(CursorCodec::INDEXED.decode(&Cursor::new(raw)).is_err(), "raw = {:?}", raw);
        }
    }

    // Test critique: une clé au-delà de i64::MAX ne peut pas être comparée,
    // le curseur est refusé au décodage
    #[test]
    fn test_decode_rejects_key_above_bigint_range() {
        let max = CursorCodec::KEY.decode(&Cursor::new("0x7fffffffffffffff")).unwrap();
        assert_eq!(max.pk, MAX_KEY);

        for raw in ["0x8000000000000000", "0xffffffffffffffff"] {
            let err = CursorCodec::KEY.decode(&Cursor::new(raw)).unwrap_err();
            assert!(err.to_string().contains("key out of range"), "raw = {:?}", raw);
        }

        let err = CursorCodec::INDEXED
            .decode(&Cursor::new("0x0,0x8000000000000005"))
            .unwrap_err();
        assert!(matches!(err, PaginationError::InvalidCursor(_)));
    }
}
