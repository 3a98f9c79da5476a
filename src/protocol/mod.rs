//! RESP wire protocol: frame types, an incremental parser, and an encoder.
//!
//! Only the RESP2 subset the replication stream uses is implemented: simple
//! strings, errors, integers, bulk strings, and arrays. The bare line-feed
//! keepalive and the top-level bulk-string snapshot header are handled one
//! layer up, in [`crate::replica::connection`], because both break the
//! framing rules (the keepalive has no type byte, the snapshot payload is
//! raw bytes with no trailing CRLF).

pub mod encoder;
pub mod frame;
pub mod parser;

pub use encoder::{encode_frame, encode_to_bytes};
pub use frame::Frame;
pub use parser::{parse_frame, parse_frame_with_limits, ParserLimits};
