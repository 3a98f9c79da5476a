//! RESP frame types.

use bytes::Bytes;

/// A RESP2 protocol frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Simple string: `+OK\r\n`
    Simple(Bytes),

    /// Error: `-ERR message\r\n`
    Error(Bytes),

    /// Integer: `:1000\r\n`
    Integer(i64),

    /// Bulk string: `$5\r\nhello\r\n`, or `$-1\r\n` for null
    Bulk(Option<Bytes>),

    /// Array: `*2\r\n...`, or `*-1\r\n` for null
    Array(Option<Vec<Frame>>),
}

impl Frame {
    /// Create a simple string frame.
    pub fn simple(s: impl Into<Bytes>) -> Self {
        Frame::Simple(s.into())
    }

    /// Create an error frame.
    pub fn error(s: impl Into<Bytes>) -> Self {
        Frame::Error(s.into())
    }

    /// Create a bulk string frame.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Frame::Bulk(Some(data.into()))
    }

    /// Create a null bulk string frame.
    pub fn null() -> Self {
        Frame::Bulk(None)
    }

    /// Create an array frame.
    pub fn array(frames: Vec<Frame>) -> Self {
        Frame::Array(Some(frames))
    }

    /// Create a null array frame.
    pub fn null_array() -> Self {
        Frame::Array(None)
    }

    /// True for null bulk strings and null arrays.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Bulk(None) | Frame::Array(None))
    }

    /// The string value of a simple or bulk frame.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Frame::Simple(b) | Frame::Bulk(Some(b)) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Flatten this frame into argv-style byte strings, in order.
    ///
    /// Bulk and simple strings contribute their bytes, integers their
    /// decimal rendering, errors their message, and nested arrays flatten
    /// recursively. Null frames contribute nothing.
    pub fn flatten_into(&self, args: &mut Vec<Bytes>) {
        match self {
            Frame::Simple(b) | Frame::Error(b) => args.push(b.clone()),
            Frame::Integer(n) => args.push(Bytes::from(n.to_string())),
            Frame::Bulk(Some(b)) => args.push(b.clone()),
            Frame::Bulk(None) => {}
            Frame::Array(Some(frames)) => {
                for frame in frames {
                    frame.flatten_into(args);
                }
            }
            Frame::Array(None) => {}
        }
    }
}

impl From<&str> for Frame {
    fn from(s: &str) -> Self {
        Frame::bulk(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<i64> for Frame {
    fn from(n: i64) -> Self {
        Frame::Integer(n)
    }
}

impl From<Bytes> for Frame {
    fn from(b: Bytes) -> Self {
        Frame::bulk(b)
    }
}
