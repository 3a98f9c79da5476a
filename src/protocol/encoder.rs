//! RESP frame encoder.

use bytes::{BufMut, BytesMut};

use crate::protocol::Frame;

/// Encode a frame into the buffer.
pub fn encode_frame(frame: &Frame, buf: &mut BytesMut) {
    match frame {
        Frame::Simple(s) => {
            buf.put_u8(b'+');
            buf.put_slice(s);
            buf.put_slice(b"\r\n");
        }
        Frame::Error(s) => {
            buf.put_u8(b'-');
            buf.put_slice(s);
            buf.put_slice(b"\r\n");
        }
        Frame::Integer(n) => {
            buf.put_u8(b':');
            buf.put_slice(n.to_string().as_bytes());
            buf.put_slice(b"\r\n");
        }
        Frame::Bulk(None) => {
            buf.put_slice(b"$-1\r\n");
        }
        Frame::Bulk(Some(data)) => {
            buf.put_u8(b'$');
            buf.put_slice(data.len().to_string().as_bytes());
            buf.put_slice(b"\r\n");
            buf.put_slice(data);
            buf.put_slice(b"\r\n");
        }
        Frame::Array(None) => {
            buf.put_slice(b"*-1\r\n");
        }
        Frame::Array(Some(frames)) => {
            buf.put_u8(b'*');
            buf.put_slice(frames.len().to_string().as_bytes());
            buf.put_slice(b"\r\n");
            for frame in frames {
                encode_frame(frame, buf);
            }
        }
    }
}

/// Encode a frame into a fresh buffer.
pub fn encode_to_bytes(frame: &Frame) -> BytesMut {
    let mut buf = BytesMut::new();
    encode_frame(frame, &mut buf);
    buf
}

/// Encode an argv as an array of bulk strings, the form the master uses for
/// every live command.
pub fn encode_command<'a, I>(args: I) -> BytesMut
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let frames = args
        .into_iter()
        .map(|arg| Frame::bulk(bytes::Bytes::copy_from_slice(arg)))
        .collect();
    encode_to_bytes(&Frame::array(frames))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_frame;

    #[test]
    fn test_encode_simple() {
        assert_eq!(&encode_to_bytes(&Frame::simple("OK"))[..], b"+OK\r\n");
    }

    #[test]
    fn test_encode_bulk() {
        assert_eq!(
            &encode_to_bytes(&Frame::bulk("hello"))[..],
            b"$5\r\nhello\r\n"
        );
        assert_eq!(&encode_to_bytes(&Frame::null())[..], b"$-1\r\n");
    }

    #[test]
    fn test_encode_array() {
        let frame = Frame::array(vec![Frame::bulk("SELECT"), Frame::bulk("0")]);
        assert_eq!(
            &encode_to_bytes(&frame)[..],
            b"*2\r\n$6\r\nSELECT\r\n$1\r\n0\r\n"
        );
    }

    #[test]
    fn test_encode_command() {
        let buf = encode_command([b"DEL".as_ref(), b"k"]);
        assert_eq!(&buf[..], b"*2\r\n$3\r\nDEL\r\n$1\r\nk\r\n");
    }

    #[test]
    fn test_roundtrip_through_parser() {
        let original = Frame::array(vec![
            Frame::simple("a"),
            Frame::Integer(-7),
            Frame::bulk("payload"),
            Frame::null(),
        ]);
        let mut buf = encode_to_bytes(&original);
        let parsed = parse_frame(&mut buf).unwrap().unwrap();
        assert_eq!(parsed, original);
    }
}
