//! Zipmap decoding: the legacy packed hash-map encoding, superseded by the
//! ziplist hash but still present in older snapshots.
//!
//! Layout: `<zmlen> <entry>* 0xFF` where each entry is
//! `<klen><key><vlen><free><value>`. `zmlen` below 254 is the entry count;
//! otherwise the count is unknown and entries are consumed until the
//! terminator. Key and value lengths use their own scheme: one byte below
//! 253, or 253 followed by a four-byte little-endian length. `free` counts
//! trailing padding bytes to drop from the value.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::{Error, Result};

const LEN_EXTENDED: u8 = 253;
const TERMINATOR: u8 = 0xFF;

/// Decode a zipmap blob into its field map.
pub fn fields(blob: &[u8]) -> Result<HashMap<Bytes, Bytes>> {
    let mut cursor = blob;
    let zmlen = take_byte(&mut cursor)?;

    let mut out = HashMap::new();
    if zmlen < 254 {
        for _ in 0..zmlen {
            let (field, value) = read_entry(&mut cursor)?;
            out.insert(field, value);
        }
        match take_byte(&mut cursor)? {
            TERMINATOR => Ok(out),
            other => Err(Error::protocol(format!(
                "expected zipmap terminator but got {other:#04x}"
            ))),
        }
    } else {
        // Count unknown: scan entries until the terminator.
        loop {
            if peek_byte(&cursor)? == TERMINATOR {
                return Ok(out);
            }
            let (field, value) = read_entry(&mut cursor)?;
            out.insert(field, value);
        }
    }
}

fn read_entry(cursor: &mut &[u8]) -> Result<(Bytes, Bytes)> {
    let klen = read_length(cursor)?;
    let key = take(cursor, klen as usize)?;

    let vlen = read_length(cursor)?;
    let free = take_byte(cursor)? as usize;
    let value = take(cursor, vlen as usize)?;
    if free > value.len() {
        return Err(Error::protocol(format!(
            "zipmap free bytes {free} exceed value length {}",
            value.len()
        )));
    }
    let value = &value[..value.len() - free];

    Ok((Bytes::copy_from_slice(key), Bytes::copy_from_slice(value)))
}

/// String length: one byte below 253, else 253 plus four little-endian
/// bytes. 254 and 255 never introduce a length.
fn read_length(cursor: &mut &[u8]) -> Result<u32> {
    match take_byte(cursor)? {
        len if len < LEN_EXTENDED => Ok(len as u32),
        LEN_EXTENDED => {
            let raw = take(cursor, 4)?;
            Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
        }
        other => Err(Error::protocol(format!(
            "unexpected zipmap length byte {other:#04x}"
        ))),
    }
}

fn peek_byte(cursor: &[u8]) -> Result<u8> {
    cursor
        .first()
        .copied()
        .ok_or_else(|| Error::protocol("zipmap truncated"))
}

fn take_byte(cursor: &mut &[u8]) -> Result<u8> {
    let byte = peek_byte(cursor)?;
    *cursor = &cursor[1..];
    Ok(byte)
}

fn take<'a>(cursor: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if cursor.len() < n {
        return Err(Error::protocol("zipmap truncated"));
    }
    let (taken, rest) = cursor.split_at(n);
    *cursor = rest;
    Ok(taken)
}

#[cfg(test)]
pub(crate) mod build {
    //! Zipmap fixture builder shared by the rdb test modules.

    pub fn zipmap(zmlen: u8, entries: &[(&[u8], &[u8], u8)]) -> Vec<u8> {
        let mut out = vec![zmlen];
        for &(key, value, free) in entries {
            out.push(key.len() as u8);
            out.extend_from_slice(key);
            out.push((value.len() + free as usize) as u8);
            out.push(free);
            out.extend_from_slice(value);
            out.extend_from_slice(&vec![0u8; free as usize]);
        }
        out.push(super::TERMINATOR);
        out
    }
}
