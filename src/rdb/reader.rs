//! Byte-level read primitives for the snapshot stream.
//!
//! These decode the building blocks every token is made of: the
//! variable-width length prefix, strings (raw, integer-encoded, or
//! LZF-compressed), length-prefixed ASCII doubles, expiries, and the file
//! envelope. All functions read from any `AsyncRead`, so the same code path
//! decodes the cache file and in-memory fixtures.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};
use crate::rdb::{length, lzf, opcode, string_encoding, MAGIC, VERSION_MAX, VERSION_MIN};

/// A decoded length prefix: either a plain length or a special string
/// encoding selected by the low six bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// A plain element or byte count.
    Plain(u32),
    /// A special encoding escape (see [`string_encoding`]).
    Encoded(u8),
}

/// Read exactly `n` bytes.
pub async fn read_bytes<R: AsyncRead + Unpin>(r: &mut R, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    r.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Read the variable-width length prefix.
///
/// The top two bits of the first byte select the width: `00` six bits, `01`
/// fourteen bits (big-endian), `10` a four-byte big-endian length, `11` a
/// special string encoding.
pub async fn read_length<R: AsyncRead + Unpin>(r: &mut R) -> Result<Length> {
    let prefix = r.read_u8().await?;
    match (prefix & 0xC0) >> 6 {
        length::LEN_6BIT => Ok(Length::Plain((prefix & 0x3F) as u32)),
        length::LEN_14BIT => {
            let next = r.read_u8().await?;
            Ok(Length::Plain((((prefix & 0x3F) as u32) << 8) | next as u32))
        }
        length::LEN_32BIT => Ok(Length::Plain(r.read_u32().await?)),
        _ => Ok(Length::Encoded(prefix & 0x3F)),
    }
}

/// Read a length prefix that must be a plain length.
pub async fn read_plain_length<R: AsyncRead + Unpin>(r: &mut R) -> Result<u32> {
    match read_length(r).await? {
        Length::Plain(len) => Ok(len),
        Length::Encoded(enc) => Err(Error::protocol(format!(
            "expected plain length but got encoding {enc}"
        ))),
    }
}

/// Read an encoded string.
///
/// Integer encodings render as their signed decimal ASCII form, preserving
/// the representation the packed encodings round-trip through. LZF blobs are
/// decompressed in memory; a mismatch against the declared uncompressed
/// length is a protocol error.
pub async fn read_string<R: AsyncRead + Unpin>(r: &mut R) -> Result<Bytes> {
    match read_length(r).await? {
        Length::Plain(len) => {
            let data = read_bytes(r, len as usize).await?;
            Ok(Bytes::from(data))
        }
        Length::Encoded(string_encoding::INT8) => {
            let n = r.read_i8().await?;
            Ok(Bytes::from(n.to_string()))
        }
        Length::Encoded(string_encoding::INT16) => {
            let n = r.read_i16_le().await?;
            Ok(Bytes::from(n.to_string()))
        }
        Length::Encoded(string_encoding::INT32) => {
            let n = r.read_i32_le().await?;
            Ok(Bytes::from(n.to_string()))
        }
        Length::Encoded(string_encoding::LZF) => {
            let compressed_len = read_plain_length(r).await?;
            let uncompressed_len = read_plain_length(r).await?;
            let compressed = read_bytes(r, compressed_len as usize).await?;
            let data = lzf::decompress(&compressed, uncompressed_len as usize)?;
            Ok(Bytes::from(data))
        }
        Length::Encoded(other) => Err(Error::protocol(format!(
            "unknown string encoding {other}"
        ))),
    }
}

/// Read a length-prefixed ASCII double. Lengths 253, 254 and 255 are the
/// NaN, +infinity and −infinity sentinels.
pub async fn read_double<R: AsyncRead + Unpin>(r: &mut R) -> Result<f64> {
    let len = r.read_u8().await?;
    match len {
        253 => Ok(f64::NAN),
        254 => Ok(f64::INFINITY),
        255 => Ok(f64::NEG_INFINITY),
        _ => {
            let raw = read_bytes(r, len as usize).await?;
            std::str::from_utf8(&raw)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| {
                    Error::protocol(format!(
                        "invalid double {:?}",
                        String::from_utf8_lossy(&raw)
                    ))
                })
        }
    }
}

/// Read the file envelope: the `REDIS` signature and a 4-digit ASCII
/// version in the accepted range.
pub async fn read_magic<R: AsyncRead + Unpin>(r: &mut R) -> Result<u32> {
    let signature = read_bytes(r, 5).await?;
    if signature != MAGIC {
        return Err(Error::protocol(format!(
            "invalid file signature {:?}",
            String::from_utf8_lossy(&signature)
        )));
    }
    let raw = read_bytes(r, 4).await?;
    let version = std::str::from_utf8(&raw)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| Error::protocol("non-numeric format version"))?;
    if !(VERSION_MIN..=VERSION_MAX).contains(&version) {
        return Err(Error::protocol(format!(
            "unsupported format version {version}"
        )));
    }
    Ok(version)
}

/// Read an expiry given its opcode, normalized to milliseconds since epoch.
pub async fn read_expiry<R: AsyncRead + Unpin>(r: &mut R, op: u8) -> Result<u64> {
    match op {
        opcode::EXPIRY_SECONDS => Ok(r.read_u32_le().await? as u64 * 1000),
        opcode::EXPIRY_MS => Ok(r.read_u64_le().await?),
        other => Err(Error::protocol(format!(
            "unexpected expiry opcode {other:#04x}"
        ))),
    }
}

/// Read the 8-byte little-endian checksum that trails the EOF opcode. The
/// value is surfaced but not verified; servers with checksumming disabled
/// send zero.
pub async fn read_checksum<R: AsyncRead + Unpin>(r: &mut R) -> Result<u64> {
    Ok(r.read_u64_le().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdb::encode;

    async fn string_from(input: &[u8]) -> Result<Bytes> {
        read_string(&mut &input[..]).await
    }

    #[tokio::test]
    async fn test_length_widths() {
        assert_eq!(read_length(&mut &[0x0A][..]).await.unwrap(), Length::Plain(10));
        assert_eq!(
            read_length(&mut &[0x41, 0x00][..]).await.unwrap(),
            Length::Plain(256)
        );
        assert_eq!(
            read_length(&mut &[0x80, 0x00, 0x01, 0x00, 0x00][..])
                .await
                .unwrap(),
            Length::Plain(65536)
        );
        assert_eq!(
            read_length(&mut &[0xC3][..]).await.unwrap(),
            Length::Encoded(string_encoding::LZF)
        );
    }

    #[tokio::test]
    async fn test_length_roundtrip() {
        for len in [0u32, 1, 63, 64, 16383, 16384, 1 << 20, u32::MAX] {
            let encoded = encode::encode_length(len);
            let decoded = read_plain_length(&mut &encoded[..]).await.unwrap();
            assert_eq!(decoded, len, "length {len}");
        }
    }

    #[tokio::test]
    async fn test_string_plain() {
        let input = encode::encode_string(b"hello");
        assert_eq!(string_from(&input).await.unwrap(), Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_string_int_encodings() {
        assert_eq!(string_from(&[0xC0, 42]).await.unwrap(), Bytes::from("42"));
        assert_eq!(string_from(&[0xC0, 0xFF]).await.unwrap(), Bytes::from("-1"));

        let mut input = vec![0xC1];
        input.extend_from_slice(&1000i16.to_le_bytes());
        assert_eq!(string_from(&input).await.unwrap(), Bytes::from("1000"));

        let mut input = vec![0xC2];
        input.extend_from_slice(&(-123456i32).to_le_bytes());
        assert_eq!(string_from(&input).await.unwrap(), Bytes::from("-123456"));
    }

    #[tokio::test]
    async fn test_string_lzf() {
        // 0xC3, compressed len 7, uncompressed len 5, literal run "hello".
        let input = [0xC3, 0x06, 0x05, 0x04, b'h', b'e', b'l', b'l', b'o'];
        assert_eq!(string_from(&input).await.unwrap(), Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_string_lzf_length_mismatch() {
        // Declared uncompressed length 9 but the stream expands to 5.
        let input = [0xC3, 0x06, 0x09, 0x04, b'h', b'e', b'l', b'l', b'o'];
        assert!(string_from(&input).await.is_err());
    }

    #[tokio::test]
    async fn test_double_sentinels_and_ascii() {
        assert!(read_double(&mut &[253u8][..]).await.unwrap().is_nan());
        assert_eq!(
            read_double(&mut &[254u8][..]).await.unwrap(),
            f64::INFINITY
        );
        assert_eq!(
            read_double(&mut &[255u8][..]).await.unwrap(),
            f64::NEG_INFINITY
        );

        let input = [4u8, b'1', b'.', b'2', b'5'];
        assert_eq!(read_double(&mut &input[..]).await.unwrap(), 1.25);
    }

    #[tokio::test]
    async fn test_float_roundtrip() {
        for value in [0.0, -1.5, 1e300, 0.1, std::f64::consts::PI] {
            let encoded = encode::encode_float(value);
            let decoded = read_double(&mut &encoded[..]).await.unwrap();
            assert_eq!(decoded, value, "float {value}");
        }
        assert_eq!(encode::encode_float(f64::NAN), vec![253]);
        assert_eq!(encode::encode_float(f64::INFINITY), vec![254]);
        assert_eq!(encode::encode_float(f64::NEG_INFINITY), vec![255]);
    }

    #[tokio::test]
    async fn test_magic() {
        let input = encode::magic(7);
        assert_eq!(read_magic(&mut &input[..]).await.unwrap(), 7);

        assert!(read_magic(&mut &b"RUBIS0007"[..]).await.is_err());
        assert!(read_magic(&mut &b"REDIS0011"[..]).await.is_err());
        assert!(read_magic(&mut &b"REDISxxxx"[..]).await.is_err());
    }

    #[tokio::test]
    async fn test_expiry_normalization() {
        let mut input = Vec::new();
        input.extend_from_slice(&1_700_000_000u32.to_le_bytes());
        assert_eq!(
            read_expiry(&mut &input[..], opcode::EXPIRY_SECONDS)
                .await
                .unwrap(),
            1_700_000_000_000
        );

        let mut input = Vec::new();
        input.extend_from_slice(&1_700_000_000_123u64.to_le_bytes());
        assert_eq!(
            read_expiry(&mut &input[..], opcode::EXPIRY_MS).await.unwrap(),
            1_700_000_000_123
        );
    }

    #[tokio::test]
    async fn test_short_read_is_io_error() {
        let input = encode::encode_length(10);
        let mut stream: &[u8] = &input;
        let err = read_string(&mut stream).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
