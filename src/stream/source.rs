use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Readable view over an owned byte buffer, with mark/reset support.
///
/// The source may be restricted to a window of the buffer (see
/// [`ByteSource::with_window`]). The mark starts at the beginning of the
/// window; once more than `read_ahead_limit` bytes are consumed past the mark,
/// the mark falls back to the window start.
#[derive(Debug, Clone, Default)]
pub struct ByteSource {
    buf: Vec<u8>,
    start: usize,
    pos: usize,
    end: usize,
    mark: usize,
    read_ahead_limit: usize,
}

impl ByteSource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let buf = bytes.into();
        let end = buf.len();
        Self {
            buf,
            start: 0,
            pos: 0,
            end,
            mark: 0,
            read_ahead_limit: end,
        }
    }

    /// Reads at most `length` bytes starting at `offset`. Both bounds are clamped to the buffer.
    pub fn with_window(bytes: impl Into<Vec<u8>>, offset: usize, length: usize) -> Self {
        let buf = bytes.into();
        let start = offset.min(buf.len());
        let end = offset.saturating_add(length).min(buf.len());
        Self {
            buf,
            start,
            pos: start,
            end,
            mark: start,
            read_ahead_limit: length,
        }
    }

    /// Next byte, or `None` at the end of the stream.
    pub fn read_byte(&mut self) -> Option<u8> {
        if self.pos >= self.end {
            return None;
        }

        let byte = self.buf[self.pos];
        self.pos += 1;
        self.check_mark_limit();
        Some(byte)
    }

    /// Copies as many bytes as fit into `out` and returns the count; 0 at the end.
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.available());
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        self.check_mark_limit();
        n
    }

    /// Skips up to `n` bytes and returns how many were actually skipped.
    pub fn skip(&mut self, n: usize) -> usize {
        let skipped = n.min(self.available());
        self.pos += skipped;
        self.check_mark_limit();
        skipped
    }

    pub fn available(&self) -> usize {
        self.end - self.pos
    }

    pub fn mark(&mut self, read_ahead_limit: usize) {
        self.read_ahead_limit = read_ahead_limit;
        self.mark = self.pos;
    }

    /// Moves the cursor back to the mark.
    pub fn reset(&mut self) {
        self.pos = self.mark;
    }

    fn check_mark_limit(&mut self) {
        if self.pos - self.mark > self.read_ahead_limit {
            self.mark = self.start;
        }
    }
}

impl io::Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf))
    }
}

impl async_std::io::Read for ByteSource {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(self.get_mut().read_into(buf)))
    }
}
