// Serialization utilities for the fixed-layout block and transaction records

use crate::error::{Error, Result};
use num_bigint::BigUint;
use std::io::{self, Read};

/// Width of every fixed byte field in a record
pub const FIELD_WIDTH: usize = 32;

/// Types with a canonical binary record
pub trait Serializable {
    fn encode(&self) -> Result<Vec<u8>>;
    fn decode(data: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// Encode `bytes` into exactly `N` bytes: zero-padded on the right when
/// shorter, truncated when longer. Truncation is lossy; records persisted
/// in this format cannot carry more than `N` bytes per field.
pub fn fit_to_width<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let len = bytes.len().min(N);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// Strip the zero padding added by `fit_to_width`
pub fn trim_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Big-endian magnitude with no leading zeros; zero is empty
pub fn magnitude_bytes(value: &BigUint) -> Vec<u8> {
    if value.bits() == 0 {
        Vec::new()
    } else {
        value.to_bytes_be()
    }
}

/// Read exactly `N` bytes; a short read becomes `TruncatedRecord`
pub fn read_array<R: Read + ?Sized, const N: usize>(
    reader: &mut R,
    field: &'static str,
) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::TruncatedRecord { field },
        _ => Error::Io(e),
    })?;
    Ok(buf)
}

pub fn read_i32_le<R: Read + ?Sized>(reader: &mut R, field: &'static str) -> Result<i32> {
    Ok(i32::from_le_bytes(read_array(reader, field)?))
}

pub fn read_i64_le<R: Read + ?Sized>(reader: &mut R, field: &'static str) -> Result<i64> {
    Ok(i64::from_le_bytes(read_array(reader, field)?))
}

/// Read an 8-byte slot declared as a signed 64-bit integer into a `u64`
/// (two's-complement reinterpretation, bit-identical on disk)
pub fn read_u64_le<R: Read + ?Sized>(reader: &mut R, field: &'static str) -> Result<u64> {
    Ok(u64::from_le_bytes(read_array(reader, field)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_fit_pads_short_input() {
        let out: [u8; 4] = fit_to_width(b"ab");
        assert_eq!(out, [b'a', b'b', 0, 0]);
    }

    #[test]
    fn test_fit_truncates_long_input() {
        let out: [u8; 2] = fit_to_width(b"abcd");
        assert_eq!(out, [b'a', b'b']);
    }

    #[test]
    fn test_trim_padding() {
        assert_eq!(trim_padding(b"12\0\0"), b"12");
        assert_eq!(trim_padding(&[0u8; 4]), b"");
        assert_eq!(trim_padding(b"1\x002"), b"1\x002");
    }

    #[test]
    fn test_magnitude_bytes() {
        assert!(magnitude_bytes(&BigUint::default()).is_empty());
        assert_eq!(magnitude_bytes(&BigUint::from(0x0100u32)), vec![1, 0]);
    }

    #[test]
    fn test_short_read_is_truncated_record() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3]);
        let err = read_i64_le(&mut cursor, "nonce").unwrap_err();
        assert!(matches!(err, Error::TruncatedRecord { field: "nonce" }));
    }

    #[test]
    fn test_read_little_endian() {
        let mut cursor = Cursor::new(vec![0x01, 0x02, 0x00, 0x00]);
        assert_eq!(read_i32_le(&mut cursor, "version").unwrap(), 0x0201);
    }
}
