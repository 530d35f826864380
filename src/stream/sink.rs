use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{Result, StubError};

/// Growable, append-only byte buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteSink {
    buf: Vec<u8>,
}

impl ByteSink {
    pub fn new() -> Self {
        Self::with_capacity(32)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Appends `length` bytes of `src` starting at `offset`.
    ///
    /// Fails with [`StubError::OutOfBounds`] when the range does not fit in
    /// `src`; nothing is appended in that case.
    pub fn write_slice(&mut self, src: &[u8], offset: usize, length: usize) -> Result<()> {
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= src.len())
            .ok_or(StubError::OutOfBounds {
                offset,
                length,
                len: src.len(),
            })?;

        self.buf.extend_from_slice(&src[offset..end]);
        Ok(())
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub fn write_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Lossy UTF-8 view of the contents.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discards the contents, keeping the allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Copies the whole contents into `out`.
    pub fn write_to<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.buf)
    }
}

impl io::Write for ByteSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl async_std::io::Write for ByteSink {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.buf.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_slice_appends_requested_range() {
        let mut sink = ByteSink::new();
        sink.write_slice(b"hello world", 6, 5).unwrap();
        sink.write_byte(b'!');

        assert_eq!(sink.as_bytes(), b"world!");
        assert_eq!(sink.len(), 6);
    }

    #[test]
    fn write_slice_rejects_out_of_range() {
        let mut sink = ByteSink::new();

        let err = sink.write_slice(b"abc", 2, 5).unwrap_err();
        assert!(matches!(err, StubError::OutOfBounds { offset: 2, length: 5, len: 3 }));

        let err = sink.write_slice(b"abc", usize::MAX, 2).unwrap_err();
        assert!(matches!(err, StubError::OutOfBounds { .. }));
        assert!(sink.is_empty());
    }

    #[test]
    fn io_write_and_write_to() {
        use std::io::Write;

        let mut sink = ByteSink::new();
        write!(sink, "{}-{}", 1, 2).unwrap();

        let mut out = Vec::new();
        sink.write_to(&mut out).unwrap();
        assert_eq!(out, b"1-2");

        sink.reset();
        assert!(sink.is_empty());
    }

    #[test]
    fn async_write() {
        use async_std::prelude::*;

        let mut sink = ByteSink::new();
        async_std::task::block_on(async {
            sink.write_all(b"async body").await.unwrap();
            sink.flush().await.unwrap();
        });

        assert_eq!(sink.to_string_lossy(), "async body");
    }
}
