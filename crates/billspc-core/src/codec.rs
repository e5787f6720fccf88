//! Bit-packed payload codec.
//!
//! A write payload is the ASCII decimal rendering of an unsigned 64-bit
//! integer. The integer carries up to [`MAX_FIELDS`] fields of
//! [`FIELD_WIDTH`] bits each, starting at bit 0:
//!
//! ```text
//!  bit  59        50 49        40  ...  19        10 9  8 7           0
//!      | op | index | op | index |     | op | index | op |   index     |
//!        field 5      field 4             field 1       field 0
//! ```
//!
//! Within a field the low 8 bits are the record index and the next 2 bits are
//! the operation. An index above [`MAX_INDEX`] terminates the stream.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of one packed field in bits.
pub const FIELD_WIDTH: u32 = 10;

/// Width of the index sub-field in bits.
pub const INDEX_WIDTH: u32 = 8;

/// Width of the operation sub-field in bits.
pub const OPCODE_WIDTH: u32 = 2;

/// Maximum number of fields scanned in one payload.
pub const MAX_FIELDS: usize = 6;

/// Highest index that is a record. Anything above ends the stream.
pub const MAX_INDEX: u8 = 151;

/// Operation value that marks a record as confirmed and shown to the user.
pub const VISIBLE_OPERATION: u8 = 2;

/// Errors produced while decoding or encoding a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The payload bytes are not ASCII text.
    #[error("payload is not ASCII text")]
    NotAscii,

    /// The payload text is not an unsigned 64-bit decimal integer.
    #[error("payload '{0}' is not an unsigned 64-bit decimal integer")]
    InvalidNumber(String),

    /// More records were given than fit in one payload.
    #[error("cannot pack {0} records, at most {MAX_FIELDS} fit in one payload")]
    TooManyRecords(usize),

    /// An operation does not fit in the 2-bit operation field.
    #[error("operation {0} does not fit in {OPCODE_WIDTH} bits")]
    OperationOutOfRange(u8),
}

impl CodecError {
    /// Returns `true` for the failures a writer causes by sending a payload
    /// that cannot be parsed at all.
    #[must_use]
    pub const fn is_parse_error(&self) -> bool {
        matches!(self, Self::NotAscii | Self::InvalidNumber(_))
    }
}

/// A single decoded entry: an operation plus an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// 2-bit operation code. [`VISIBLE_OPERATION`] marks a confirmed entry.
    pub operation: u8,

    /// 8-bit index, never above [`MAX_INDEX`] once decoded.
    pub index: u8,
}

impl Record {
    /// Create a record.
    #[must_use]
    pub const fn new(operation: u8, index: u8) -> Self {
        Self { operation, index }
    }

    /// Whether this record belongs in the visible list.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.operation == VISIBLE_OPERATION
    }

    /// Display name for this record's index, empty when the index is unnamed.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        display_name(self.index)
    }
}

/// Display name for an index.
///
/// Only a handful of indices carry a name; all others (including 0) map to
/// the empty string.
#[must_use]
pub const fn display_name(index: u8) -> &'static str {
    match index {
        151 => "MEW",
        150 => "MEWTWO",
        149 => "DRAGONITE",
        145 => "ZAPDOS",
        143 => "SNORLAX",
        130 => "GYRADOS",
        _ => "",
    }
}

/// Extract `width` bits of `value` starting at bit `offset`.
#[inline]
const fn extract_bits(value: u64, offset: u32, width: u32) -> u64 {
    (value >> offset) & ((1 << width) - 1)
}

/// Decode an already-parsed payload integer.
///
/// Scans fields at bit offsets `0, 10, .., 50` and stops at the first field
/// whose index exceeds [`MAX_INDEX`]. Records already collected are kept.
#[must_use]
pub fn decode_value(value: u64) -> Vec<Record> {
    let mut records = Vec::with_capacity(MAX_FIELDS);

    for field in 0..MAX_FIELDS {
        #[allow(clippy::cast_possible_truncation)]
        let offset = field as u32 * FIELD_WIDTH;

        let index = extract_bits(value, offset, INDEX_WIDTH);
        if index > u64::from(MAX_INDEX) {
            break;
        }
        let operation = extract_bits(value, offset + INDEX_WIDTH, OPCODE_WIDTH);

        // Both values are masked to at most 8 bits above.
        #[allow(clippy::cast_possible_truncation)]
        let record = Record::new(operation as u8, index as u8);
        records.push(record);
    }

    records
}

/// Parse the textual payload into its integer.
///
/// Accepts what the platform integer parser accepts: an optional leading `+`
/// followed by decimal digits, with no surrounding whitespace.
///
/// # Errors
///
/// Returns [`CodecError::InvalidNumber`] if the text is not a `u64`.
pub fn parse_payload(payload: &str) -> Result<u64, CodecError> {
    payload
        .parse::<u64>()
        .map_err(|_| CodecError::InvalidNumber(payload.to_string()))
}

/// Decode a textual payload into its records.
///
/// # Errors
///
/// Returns [`CodecError::InvalidNumber`] if the text is not a `u64`. Nothing
/// is decoded in that case.
pub fn decode(payload: &str) -> Result<Vec<Record>, CodecError> {
    parse_payload(payload).map(decode_value)
}

/// Decode the raw bytes of a characteristic write.
///
/// # Errors
///
/// Returns [`CodecError::NotAscii`] if the bytes are not ASCII, or
/// [`CodecError::InvalidNumber`] if the text is not a `u64`.
pub fn decode_bytes(payload: &[u8]) -> Result<Vec<Record>, CodecError> {
    if !payload.is_ascii() {
        return Err(CodecError::NotAscii);
    }
    let text = std::str::from_utf8(payload).map_err(|_| CodecError::NotAscii)?;
    decode(text)
}

/// Pack records into a payload integer, field `k` at bit offset `10k`.
///
/// This is the writer's side of the format. It does not check indices: an
/// index above [`MAX_INDEX`] is packed as-is and acts as a terminator.
///
/// # Errors
///
/// Returns [`CodecError::TooManyRecords`] for more than [`MAX_FIELDS`]
/// records and [`CodecError::OperationOutOfRange`] for an operation that
/// does not fit in two bits.
pub fn encode(records: &[Record]) -> Result<u64, CodecError> {
    if records.len() > MAX_FIELDS {
        return Err(CodecError::TooManyRecords(records.len()));
    }

    let mut value = 0u64;
    for (field, record) in records.iter().enumerate() {
        if u64::from(record.operation) >= 1 << OPCODE_WIDTH {
            return Err(CodecError::OperationOutOfRange(record.operation));
        }
        #[allow(clippy::cast_possible_truncation)]
        let offset = field as u32 * FIELD_WIDTH;
        let bits = (u64::from(record.operation) << INDEX_WIDTH) | u64::from(record.index);
        value |= bits << offset;
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pack `(operation, index)` pairs the long way, independent of `encode`.
    fn pack(fields: &[(u64, u64)]) -> u64 {
        fields
            .iter()
            .enumerate()
            .fold(0, |acc, (k, (op, idx))| acc | (((op << 8) | idx) << (10 * k)))
    }

    #[test]
    fn test_zero_decodes_to_six_blank_records() {
        let records = decode("0").unwrap();
        assert_eq!(records, vec![Record::new(0, 0); 6]);
        assert!(records.iter().all(|r| r.display_name().is_empty()));
    }

    #[test]
    fn test_first_field_terminator_yields_empty() {
        assert!(decode("200").unwrap().is_empty());
        assert!(decode("152").unwrap().is_empty());
        assert_eq!(decode("151").unwrap().len(), 6);
    }

    #[test]
    fn test_stops_at_third_field() {
        let value = pack(&[(1, 10), (3, 20), (2, 200), (2, 5)]);
        let records = decode(&value.to_string()).unwrap();
        assert_eq!(records, vec![Record::new(1, 10), Record::new(3, 20)]);
    }

    #[test]
    fn test_field_position_matches_bit_offset() {
        let value = pack(&[(0, 1), (1, 2), (2, 3), (3, 4), (0, 5), (1, 6)]);
        let records = decode_value(value);
        for (k, record) in records.iter().enumerate() {
            assert_eq!(u64::from(record.index), (value >> (10 * k)) & 0xff);
            assert_eq!(u64::from(record.operation), (value >> (10 * k + 8)) & 0b11);
        }
        assert_eq!(records[5], Record::new(1, 6));
    }

    #[test]
    fn test_bits_above_sixtieth_are_ignored() {
        let value = pack(&[(2, 151); 6]) | (0b1111 << 60);
        assert_eq!(decode_value(value), vec![Record::new(2, 151); 6]);
    }

    #[test]
    fn test_u64_max_terminates_immediately() {
        assert!(decode(&u64::MAX.to_string()).unwrap().is_empty());
    }

    #[test]
    fn test_mew_and_mewtwo_batch() {
        let value = pack(&[(2, 151), (2, 150), (0, 5), (0, 5), (0, 5), (0, 5)]);
        let records = decode(&value.to_string()).unwrap();
        assert_eq!(records.len(), 6);
        let names: Vec<_> = records
            .iter()
            .filter(|r| r.is_visible())
            .map(Record::display_name)
            .collect();
        assert_eq!(names, ["MEW", "MEWTWO"]);
    }

    #[test]
    fn test_invalid_text_is_parse_error() {
        for bad in ["abc", "", "-1", " 12", "12 ", "1.5", "18446744073709551616"] {
            let err = decode(bad).unwrap_err();
            assert!(err.is_parse_error(), "{bad:?} gave {err:?}");
        }
    }

    #[test]
    fn test_plus_sign_is_accepted() {
        assert_eq!(decode("+0").unwrap().len(), 6);
    }

    #[test]
    fn test_non_ascii_bytes_rejected() {
        assert_eq!(decode_bytes("１２".as_bytes()), Err(CodecError::NotAscii));
        assert_eq!(decode_bytes(&[0xff, 0x30]), Err(CodecError::NotAscii));
        assert_eq!(decode_bytes(b"0").unwrap().len(), 6);
    }

    #[test]
    fn test_decode_is_pure() {
        let payload = pack(&[(2, 143), (1, 130), (2, 99)]).to_string();
        assert_eq!(decode(&payload), decode(&payload));
    }

    #[test]
    fn test_encode_matches_manual_packing() {
        let records = [Record::new(2, 151), Record::new(2, 150), Record::new(0, 5)];
        assert_eq!(
            encode(&records).unwrap(),
            pack(&[(2, 151), (2, 150), (0, 5)])
        );
    }

    #[test]
    fn test_encode_rejects_bad_input() {
        assert_eq!(
            encode(&[Record::new(0, 1); 7]),
            Err(CodecError::TooManyRecords(7))
        );
        assert_eq!(
            encode(&[Record::new(4, 1)]),
            Err(CodecError::OperationOutOfRange(4))
        );
    }

    #[test]
    fn test_display_names() {
        assert_eq!(display_name(151), "MEW");
        assert_eq!(display_name(130), "GYRADOS");
        assert_eq!(display_name(1), "");
        assert_eq!(display_name(0), "");
    }
}
