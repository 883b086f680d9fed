//! Readable byte sources handed out with payloads

use std::io::Cursor;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

/// Bytes of a resolved payload, either streamed from the cache or held in
/// memory. Dropping the source releases the underlying file handle.
#[derive(Debug)]
pub enum ByteSource {
    File(File),
    Memory(Cursor<Vec<u8>>),
}

impl ByteSource {
    /// Wrap in-memory bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Memory(Cursor::new(bytes.into()))
    }

    /// Read the remaining bytes, consuming the source
    pub async fn read_all(self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Memory(cursor) => {
                let position = cursor.position() as usize;
                let mut bytes = cursor.into_inner();
                bytes.drain(..position.min(bytes.len()));
                Ok(bytes)
            }
            Self::File(mut file) => {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf).await?;
                Ok(buf)
            }
        }
    }
}

impl AsyncRead for ByteSource {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::File(file) => Pin::new(file).poll_read(cx, buf),
            Self::Memory(cursor) => Pin::new(cursor).poll_read(cx, buf),
        }
    }
}
