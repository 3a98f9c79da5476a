//! Incremental RESP parser.
//!
//! [`parse_frame`] consumes at most one complete frame from the front of a
//! [`BytesMut`] buffer. When the buffer holds only a prefix of a frame it
//! returns `Ok(None)` and leaves the buffer untouched, so callers can read
//! more bytes from the socket and retry — the check phase walks the frame
//! with a cursor before anything is committed.

use std::io::Cursor;

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::Frame;

/// Parser ceilings guarding against oversized frames.
#[derive(Debug, Clone)]
pub struct ParserLimits {
    /// Maximum bulk string payload in bytes.
    pub max_bulk_len: usize,
    /// Maximum number of elements in an array.
    pub max_array_elements: usize,
    /// Maximum nesting depth of arrays.
    pub max_depth: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            // Matches the server-side proto-max-bulk-len default.
            max_bulk_len: 512 * 1024 * 1024,
            max_array_elements: 1_048_576,
            max_depth: 64,
        }
    }
}

/// Parse one frame from the buffer with default limits.
pub fn parse_frame(buf: &mut BytesMut) -> Result<Option<Frame>> {
    parse_frame_with_limits(buf, &ParserLimits::default())
}

/// Parse one frame from the buffer, enforcing the given limits.
pub fn parse_frame_with_limits(
    buf: &mut BytesMut,
    limits: &ParserLimits,
) -> Result<Option<Frame>> {
    if buf.is_empty() {
        return Ok(None);
    }

    let mut cursor = Cursor::new(&buf[..]);
    match check_frame(&mut cursor, limits, 0)? {
        None => Ok(None),
        Some(len) => {
            cursor.set_position(0);
            let frame = parse_complete(&mut cursor, limits)?;
            buf.advance(len);
            Ok(Some(frame))
        }
    }
}

/// Walk one frame without materializing it. Returns the frame's total length
/// in bytes, or `None` when the buffer ends mid-frame.
fn check_frame(
    cursor: &mut Cursor<&[u8]>,
    limits: &ParserLimits,
    depth: usize,
) -> Result<Option<usize>> {
    if depth > limits.max_depth {
        return Err(Error::protocol(format!(
            "array nesting depth exceeds limit {}",
            limits.max_depth
        )));
    }

    let Some(first) = peek_byte(cursor) else {
        return Ok(None);
    };
    match first {
        b'+' | b'-' | b':' => {
            if skip_line(cursor) {
                Ok(Some(cursor.position() as usize))
            } else {
                Ok(None)
            }
        }
        b'$' => {
            cursor.advance(1);
            let Some(len) = read_decimal(cursor)? else {
                return Ok(None);
            };
            if len == -1 {
                return Ok(Some(cursor.position() as usize));
            }
            if len < 0 {
                return Err(Error::protocol("negative bulk string length"));
            }
            let len = len as usize;
            if len > limits.max_bulk_len {
                return Err(Error::protocol(format!(
                    "bulk string of {len} bytes exceeds limit {}",
                    limits.max_bulk_len
                )));
            }
            let total = cursor.position() as usize + len + 2;
            if cursor.get_ref().len() < total {
                Ok(None)
            } else {
                cursor.set_position(total as u64);
                Ok(Some(total))
            }
        }
        b'*' => {
            cursor.advance(1);
            let Some(count) = read_decimal(cursor)? else {
                return Ok(None);
            };
            if count == -1 {
                return Ok(Some(cursor.position() as usize));
            }
            if count < 0 {
                return Err(Error::protocol("negative array length"));
            }
            let count = count as usize;
            if count > limits.max_array_elements {
                return Err(Error::protocol(format!(
                    "array of {count} elements exceeds limit {}",
                    limits.max_array_elements
                )));
            }
            for _ in 0..count {
                if check_frame(cursor, limits, depth + 1)?.is_none() {
                    return Ok(None);
                }
            }
            Ok(Some(cursor.position() as usize))
        }
        other => Err(Error::protocol(format!("unexpected frame byte {other:#04x}"))),
    }
}

/// Parse a frame the check phase has already verified to be complete.
fn parse_complete(cursor: &mut Cursor<&[u8]>, limits: &ParserLimits) -> Result<Frame> {
    let first = get_byte(cursor)?;
    match first {
        b'+' => Ok(Frame::Simple(read_line_bytes(cursor)?)),
        b'-' => Ok(Frame::Error(read_line_bytes(cursor)?)),
        b':' => {
            let line = read_line_bytes(cursor)?;
            let n = ascii_i64(&line)?;
            Ok(Frame::Integer(n))
        }
        b'$' => {
            let len = read_decimal(cursor)?.ok_or_else(incomplete_after_check)?;
            if len == -1 {
                return Ok(Frame::Bulk(None));
            }
            let data = read_exact(cursor, len as usize)?;
            expect_crlf(cursor)?;
            Ok(Frame::Bulk(Some(data)))
        }
        b'*' => {
            let count = read_decimal(cursor)?.ok_or_else(incomplete_after_check)?;
            if count == -1 {
                return Ok(Frame::Array(None));
            }
            let mut frames = Vec::with_capacity((count as usize).min(limits.max_array_elements));
            for _ in 0..count {
                frames.push(parse_complete(cursor, limits)?);
            }
            Ok(Frame::Array(Some(frames)))
        }
        other => Err(Error::protocol(format!("unexpected frame byte {other:#04x}"))),
    }
}

fn incomplete_after_check() -> Error {
    Error::protocol("frame truncated after completeness check")
}

fn peek_byte(cursor: &Cursor<&[u8]>) -> Option<u8> {
    let pos = cursor.position() as usize;
    cursor.get_ref().get(pos).copied()
}

fn get_byte(cursor: &mut Cursor<&[u8]>) -> Result<u8> {
    let byte = peek_byte(cursor).ok_or_else(incomplete_after_check)?;
    cursor.advance(1);
    Ok(byte)
}

/// Advance the cursor past the next CRLF. Returns false when no full line is
/// buffered yet.
fn skip_line(cursor: &mut Cursor<&[u8]>) -> bool {
    let start = cursor.position() as usize;
    let data = cursor.get_ref();
    for i in start..data.len().saturating_sub(1) {
        if data[i] == b'\r' && data[i + 1] == b'\n' {
            cursor.set_position((i + 2) as u64);
            return true;
        }
    }
    false
}

/// The bytes of the current line, excluding its CRLF.
fn read_line_bytes(cursor: &mut Cursor<&[u8]>) -> Result<Bytes> {
    let start = cursor.position() as usize;
    if !skip_line(cursor) {
        return Err(incomplete_after_check());
    }
    let end = cursor.position() as usize - 2;
    Ok(Bytes::copy_from_slice(&cursor.get_ref()[start..end]))
}

/// Read an ASCII decimal terminated by CRLF. `Ok(None)` when the line is not
/// fully buffered yet.
fn read_decimal(cursor: &mut Cursor<&[u8]>) -> Result<Option<i64>> {
    let start = cursor.position() as usize;
    if !skip_line(cursor) {
        return Ok(None);
    }
    let end = cursor.position() as usize - 2;
    let n = ascii_i64(&cursor.get_ref()[start..end])?;
    Ok(Some(n))
}

fn ascii_i64(raw: &[u8]) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            Error::protocol(format!(
                "invalid integer {:?}",
                String::from_utf8_lossy(raw)
            ))
        })
}

fn read_exact(cursor: &mut Cursor<&[u8]>, n: usize) -> Result<Bytes> {
    let start = cursor.position() as usize;
    if cursor.get_ref().len() < start + n {
        return Err(incomplete_after_check());
    }
    let result = Bytes::copy_from_slice(&cursor.get_ref()[start..start + n]);
    cursor.set_position((start + n) as u64);
    Ok(result)
}

fn expect_crlf(cursor: &mut Cursor<&[u8]>) -> Result<()> {
    let a = get_byte(cursor)?;
    let b = get_byte(cursor)?;
    if a != b'\r' || b != b'\n' {
        return Err(Error::protocol(format!(
            "expected CRLF but got {a:#04x} {b:#04x}"
        )));
    }
    Ok(())
}
