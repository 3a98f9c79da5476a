//! Intset decoding: the compact binary format for sets whose members are
//! all integers.
//!
//! Layout: `<u32 element-size LE> <u32 count LE> <elements>`. The element
//! size is 2, 4, or 8 bytes; anything else is malformed. Elements are
//! little-endian and sign-extended into the uniform 64-bit representation
//! used by the model layer.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// Decode an intset blob into its member set.
pub fn members(blob: &[u8]) -> Result<HashSet<u64>> {
    let mut cursor = blob;
    let element_size = take_u32_le(&mut cursor)?;
    let count = take_u32_le(&mut cursor)?;

    match element_size {
        2 | 4 | 8 => {}
        other => {
            return Err(Error::protocol(format!(
                "expected intset element size 2, 4 or 8 but got {other}"
            )));
        }
    }

    let mut out = HashSet::with_capacity(count as usize);
    for _ in 0..count {
        let raw = take(&mut cursor, element_size as usize)?;
        let value: i64 = match element_size {
            2 => i16::from_le_bytes([raw[0], raw[1]]) as i64,
            4 => i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64,
            _ => i64::from_le_bytes([
                raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
            ]),
        };
        out.insert(value as u64);
    }
    Ok(out)
}

fn take<'a>(cursor: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if cursor.len() < n {
        return Err(Error::protocol("intset truncated"));
    }
    let (taken, rest) = cursor.split_at(n);
    *cursor = rest;
    Ok(taken)
}

fn take_u32_le(cursor: &mut &[u8]) -> Result<u32> {
    let raw = take(cursor, 4)?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}
