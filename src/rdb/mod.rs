//! Streaming decoder for the RDB snapshot format.
//!
//! The format is a 9-byte envelope (`REDIS` magic plus a 4-digit ASCII
//! version), a token stream of structural opcodes and typed key/value
//! entries, and a trailing EOF opcode with an 8-byte checksum. The decoder
//! is layered the way the format is: byte-level primitives
//! ([`reader`]), self-contained packed encodings decoded from string blobs
//! ([`ziplist`], [`zipmap`], [`intset`], [`lzf`]), and the opcode state
//! machine ([`decoder`]) on top.

pub mod decoder;
pub mod encode;
pub mod intset;
pub mod lzf;
pub mod reader;
pub mod ziplist;
pub mod zipmap;

pub use decoder::{Decoder, Token};

/// Mandatory file signature.
pub const MAGIC: &[u8] = b"REDIS";

/// Lowest accepted format version.
pub const VERSION_MIN: u32 = 3;
/// Highest accepted format version.
pub const VERSION_MAX: u32 = 9;

/// Structural opcodes.
pub mod opcode {
    /// File-scoped auxiliary field (version 7+).
    pub const AUX: u8 = 0xFA;
    /// Database resize hint (version 7+).
    pub const RESIZEDB: u8 = 0xFB;
    /// Key expiry in milliseconds, 8 bytes little-endian.
    pub const EXPIRY_MS: u8 = 0xFC;
    /// Key expiry in seconds, 4 bytes little-endian.
    pub const EXPIRY_SECONDS: u8 = 0xFD;
    /// Database selector.
    pub const SELECTDB: u8 = 0xFE;
    /// End of file; followed by an 8-byte checksum (version 5+, zeroed when
    /// disabled on the server).
    pub const EOF: u8 = 0xFF;
}

/// Value-type opcodes.
pub mod value_type {
    pub const STRING: u8 = 0x00;
    pub const LIST: u8 = 0x01;
    pub const SET: u8 = 0x02;
    pub const SORTED_SET: u8 = 0x03;
    pub const HASH: u8 = 0x04;
    pub const HASH_ZIPMAP: u8 = 0x09;
    pub const LIST_ZIPLIST: u8 = 0x0A;
    pub const SET_INTSET: u8 = 0x0B;
    pub const SORTED_SET_ZIPLIST: u8 = 0x0C;
    pub const HASH_ZIPLIST: u8 = 0x0D;
    pub const LIST_QUICKLIST: u8 = 0x0E;
}

/// Length-prefix discriminators (top two bits of the first byte).
pub mod length {
    pub const LEN_6BIT: u8 = 0;
    pub const LEN_14BIT: u8 = 1;
    pub const LEN_32BIT: u8 = 2;
    pub const LEN_ENCODED: u8 = 3;
}

/// Special string encodings selected by the low six bits of an encoded
/// length prefix.
pub mod string_encoding {
    pub const INT8: u8 = 0;
    pub const INT16: u8 = 1;
    pub const INT32: u8 = 2;
    pub const LZF: u8 = 3;
}
