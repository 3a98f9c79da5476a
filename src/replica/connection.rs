//! The wire connection: turns the raw socket into a stream of replication
//! messages and handles the framing-mode switch around the snapshot
//! payload.
//!
//! Three things on this wire do not follow RESP framing rules, so they are
//! handled here rather than in the protocol parser: the bare line-feed
//! keepalive, the top-level bulk-string header announcing the snapshot
//! (whose payload is raw bytes with no trailing CRLF), and the snapshot
//! payload itself, which is streamed straight into the cache file.

use std::path::{Path, PathBuf};

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::command::Command;
use crate::protocol::{parse_frame_with_limits, ParserLimits};

/// One message from the master.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A framed command (possibly empty, for ignored frame types).
    Command(Command),
    /// The master announced a snapshot payload of this many raw bytes; the
    /// caller must stream exactly that many next.
    Snapshot(u64),
    /// A bare line-feed keepalive.
    Keepalive,
}

/// Buffered reader/writer over the replication socket.
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    buf: BytesMut,
    limits: ParserLimits,
    dump_dir: Option<PathBuf>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(16 * 1024),
            limits: ParserLimits::default(),
            dump_dir: None,
        }
    }

    /// Enable the protocol dump: bytes of a command that fails to parse are
    /// written to a timestamped file under `dir`. Purely an observability
    /// aid.
    pub fn enable_debug_dump(&mut self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        self.dump_dir = Some(dir.to_path_buf());
        Ok(())
    }

    /// Send the bootstrap sync directive. This is the only outbound traffic
    /// the replication session produces.
    pub async fn send_sync(&mut self) -> Result<()> {
        self.stream.write_all(b"SYNC\r\n").await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next message, blocking until one is fully buffered.
    pub async fn next_message(&mut self) -> Result<Message> {
        loop {
            match self.try_parse_message() {
                Ok(Some(message)) => return Ok(message),
                Ok(None) => {}
                Err(err) => {
                    self.dump_failed_command(&err);
                    return Err(err);
                }
            }
            let n = self.stream.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(Error::Io("connection closed by server".into()));
            }
        }
    }

    /// Attempt to parse one message from the buffer; `None` means more
    /// bytes are needed.
    fn try_parse_message(&mut self) -> Result<Option<Message>> {
        let Some(&first) = self.buf.first() else {
            return Ok(None);
        };
        match first {
            b'\n' => {
                self.buf.advance(1);
                Ok(Some(Message::Keepalive))
            }
            b'$' => {
                let Some(line) = self.take_line() else {
                    return Ok(None);
                };
                let len = ascii_u64(&line[1..]).ok_or_else(|| {
                    Error::protocol(format!(
                        "invalid snapshot header {:?}",
                        String::from_utf8_lossy(&line)
                    ))
                })?;
                Ok(Some(Message::Snapshot(len)))
            }
            b'*' => match parse_frame_with_limits(&mut self.buf, &self.limits)? {
                None => Ok(None),
                Some(frame) => {
                    let mut args = Vec::new();
                    frame.flatten_into(&mut args);
                    Ok(Some(Message::Command(Command::new(args))))
                }
            },
            b'+' | b':' => {
                // Consumed and ignored; surfaces as an empty command.
                if self.take_line().is_none() {
                    return Ok(None);
                }
                Ok(Some(Message::Command(Command::default())))
            }
            b'-' => {
                let Some(line) = self.take_line() else {
                    return Ok(None);
                };
                Err(Error::Server(
                    String::from_utf8_lossy(trim_ascii(&line[1..])).into_owned(),
                ))
            }
            other => Err(Error::protocol(format!(
                "unexpected wire byte {other:#04x}"
            ))),
        }
    }

    /// Stream exactly `len` raw payload bytes into `writer`, starting with
    /// whatever is already buffered. A short count is an error.
    pub async fn copy_snapshot<W>(&mut self, len: u64, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut remaining = len;

        let buffered = (self.buf.len() as u64).min(remaining) as usize;
        if buffered > 0 {
            writer.write_all(&self.buf[..buffered]).await?;
            self.buf.advance(buffered);
            remaining -= buffered as u64;
        }

        let mut chunk = vec![0u8; 16 * 1024];
        while remaining > 0 {
            let want = (chunk.len() as u64).min(remaining) as usize;
            let n = self.stream.read(&mut chunk[..want]).await?;
            if n == 0 {
                return Err(Error::Io(format!(
                    "snapshot truncated: {remaining} of {len} bytes missing"
                )));
            }
            writer.write_all(&chunk[..n]).await?;
            remaining -= n as u64;
        }
        writer.flush().await?;
        Ok(())
    }

    /// Consume one `\n`-terminated line, stripping the line ending.
    fn take_line(&mut self) -> Option<Bytes> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line = self.buf.split_to(pos + 1);
        line.truncate(pos);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Some(line.freeze())
    }

    /// Write the unparsed buffer to a dump file for offline inspection.
    fn dump_failed_command(&self, err: &Error) {
        let Some(dir) = &self.dump_dir else {
            return;
        };
        if self.buf.is_empty() {
            return;
        }
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let path = dir.join(format!("{stamp}-command.dump"));
        match std::fs::write(&path, &self.buf[..self.buf.len().min(64 * 1024)]) {
            Ok(()) => debug!(path = %path.display(), %err, "wrote protocol dump"),
            Err(io_err) => warn!(%io_err, "failed to write protocol dump"),
        }
    }
}

fn ascii_u64(raw: &[u8]) -> Option<u64> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}

fn trim_ascii(raw: &[u8]) -> &[u8] {
    let Some(start) = raw.iter().position(|b| !b.is_ascii_whitespace()) else {
        return &[];
    };
    let end = raw.iter().rposition(|b| !b.is_ascii_whitespace()).unwrap_or(start) + 1;
    &raw[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::io::AsyncWriteExt;

    async fn scripted(bytes: &'static [u8]) -> Connection<tokio::io::DuplexStream> {
        let (client, mut server) = tokio::io::duplex(64 * 1024);
        server.write_all(bytes).await.unwrap();
        Connection::new(client)
    }

    #[tokio::test]
    async fn test_keepalive() {
        let mut conn = scripted(b"\n").await;
        assert_eq!(conn.next_message().await.unwrap(), Message::Keepalive);
    }

    #[tokio::test]
    async fn test_array_command() {
        let mut conn = scripted(b"*3\r\n$4\r\nZADD\r\n$1\r\nk\r\n:42\r\n").await;
        match conn.next_message().await.unwrap() {
            Message::Command(cmd) => {
                let args: Vec<&[u8]> = cmd.args().iter().map(|b| b.as_ref()).collect();
                assert_eq!(args, vec![b"ZADD".as_ref(), b"k", b"42"]);
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_snapshot_header_leaves_payload_buffered() {
        let mut conn = scripted(b"$5\r\nREDISrest").await;
        assert_eq!(conn.next_message().await.unwrap(), Message::Snapshot(5));

        let mut cache = Vec::new();
        conn.copy_snapshot(5, &mut cache).await.unwrap();
        assert_eq!(cache, b"REDIS");

        // Bytes after the payload still belong to the framed stream.
        assert_eq!(&conn.buf[..], b"rest");
    }

    #[tokio::test]
    async fn test_snapshot_short_count_is_error() {
        let (client, mut server) = tokio::io::duplex(1024);
        server.write_all(b"$10\r\nabc").await.unwrap();
        drop(server);

        let mut conn = Connection::new(client);
        assert_eq!(conn.next_message().await.unwrap(), Message::Snapshot(10));
        let mut cache = Vec::new();
        let err = conn.copy_snapshot(10, &mut cache).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_simple_string_and_integer_ignored() {
        let mut conn = scripted(b"+OK\r\n:12\r\n").await;
        for _ in 0..2 {
            match conn.next_message().await.unwrap() {
                Message::Command(cmd) => assert!(cmd.is_empty()),
                other => panic!("expected empty command, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_server_error_frame() {
        let mut conn = scripted(b"-LOADING server is busy\r\n").await;
        let err = conn.next_message().await.unwrap_err();
        assert_eq!(err, Error::Server("LOADING server is busy".into()));
    }

    #[tokio::test]
    async fn test_unexpected_byte() {
        let mut conn = scripted(b"?\r\n").await;
        assert!(matches!(
            conn.next_message().await.unwrap_err(),
            Error::Protocol(_)
        ));
    }

    #[tokio::test]
    async fn test_connection_close_is_io_error() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let mut conn = Connection::new(client);
        assert!(matches!(
            conn.next_message().await.unwrap_err(),
            Error::Io(_)
        ));
    }

    #[tokio::test]
    async fn test_message_split_across_reads() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut conn = Connection::new(client);

        let reader = tokio::spawn(async move {
            let msg = conn.next_message().await.unwrap();
            (conn, msg)
        });

        server.write_all(b"*1\r\n$4\r\nPI").await.unwrap();
        tokio::task::yield_now().await;
        server.write_all(b"NG\r\n").await.unwrap();

        let (_conn, msg) = reader.await.unwrap();
        assert_eq!(
            msg,
            Message::Command(Command::new(vec![Bytes::from("PING")]))
        );
    }

    #[tokio::test]
    async fn test_debug_dump_written_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let (client, mut server) = tokio::io::duplex(1024);
        server.write_all(b"*1\r\n$3\r\nabcd\r\n").await.unwrap();

        let mut conn = Connection::new(client);
        conn.enable_debug_dump(dir.path()).unwrap();
        assert!(conn.next_message().await.is_err());

        let dumps: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(dumps.len(), 1);
    }
}
