//! Response buffering and the one-shot commit.
//!
//! A [`ResponseBuffer`] collects everything a handler sets on a response
//! (status, headers, errors, redirect, body) and turns it into a textual
//! envelope exactly once, when [`ResponseBuffer::commit`] is called. The
//! envelope has one of three mutually exclusive shapes, picked by precedence:
//!
//! ```text
//! error:    <code>\n<message>\n               (once per recorded error)
//! redirect: 302 \nContent-Length: <len>\n<location>
//! normal:   <status>\n<content type>\nContent-Length: <len>\n(<name>: <value>\n)*\n
//! ```
//!
//! The buffer itself does not refuse mutations after commit. That rule belongs
//! to the container facade ([`FakeResponse`](crate::http::response::FakeResponse)),
//! which checks [`ResponseBuffer::is_committed`] before forwarding calls.

use indexmap::{IndexMap, IndexSet};
use std::fmt::Display;
use std::io;

use crate::error::Result;
use crate::http::multimap::OrderedMultiMap;
use crate::http::status::HttpStatus;
use crate::stream::ByteSink;

pub const DEFAULT_BUFFER_SIZE: usize = 1024;
pub const DEFAULT_CHARACTER_ENCODING: &str = "ISO-8859-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Fresh,
    Writing,
    Committed,
}

/// Which serialization branch a commit takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Error,
    Redirect,
    Normal,
}

#[derive(Debug, Clone)]
pub struct ResponseBuffer {
    state: BufferState,
    status: u16,
    headers: OrderedMultiMap,
    errors: IndexMap<u16, String>,
    redirect: Option<String>,
    body: ByteSink,

    content_type: Option<String>,
    character_encoding: Option<String>,
    content_length: usize,
    buffer_size: usize,

    stream_loaded: bool,
    output: String,
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            state: BufferState::Fresh,
            status: HttpStatus::Ok.code(),
            headers: OrderedMultiMap::new(),
            errors: IndexMap::new(),
            redirect: None,
            body: ByteSink::with_capacity(buffer_size),

            content_type: None,
            character_encoding: None,
            content_length: 0,
            buffer_size,

            stream_loaded: false,
            output: String::new(),
        }
    }

    fn touch(&mut self) {
        if self.state == BufferState::Fresh {
            self.state = BufferState::Writing;
        }
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    pub fn is_committed(&self) -> bool {
        self.state == BufferState::Committed
    }

    pub fn write_status(&mut self, code: u16) {
        self.touch();
        self.status = code;
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Records an error. Several errors may be recorded; a repeated code
    /// replaces its message but keeps its original position.
    pub fn write_error(&mut self, code: u16, message: &str) {
        self.touch();
        self.errors.insert(code, message.to_string());
    }

    pub fn errors(&self) -> &IndexMap<u16, String> {
        &self.errors
    }

    /// Sets the redirect target. The last call wins.
    pub fn write_redirect(&mut self, location: &str) {
        self.touch();
        self.redirect = Some(location.to_string());
    }

    pub fn redirect(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    pub fn outcome(&self) -> Outcome {
        if !self.errors.is_empty() {
            Outcome::Error
        } else if self.redirect.is_some() {
            Outcome::Redirect
        } else {
            Outcome::Normal
        }
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        self.content_type = Some(content_type.to_string());
    }

    /// Content type with the charset appended when an encoding was set explicitly.
    pub fn content_type(&self) -> Option<String> {
        let content_type = self.content_type.as_deref()?;
        match &self.character_encoding {
            Some(encoding) => Some(format!("{content_type}; charset={encoding}")),
            None => Some(content_type.to_string()),
        }
    }

    /// Sets the character encoding. Values outside `[a-zA-Z0-9\-:_]+` are ignored.
    pub fn set_character_encoding(&mut self, encoding: &str) {
        if !is_valid_encoding(encoding) {
            tracing::debug!(encoding, "ignoring malformed character encoding");
            return;
        }

        self.character_encoding = Some(encoding.to_string());
    }

    pub fn has_character_encoding(&self) -> bool {
        self.character_encoding.is_some()
    }

    /// Explicit encoding, or `ISO-8859-1` when none was set.
    pub fn character_encoding(&self) -> &str {
        self.character_encoding
            .as_deref()
            .unwrap_or(DEFAULT_CHARACTER_ENCODING)
    }

    pub fn set_content_length(&mut self, length: usize) {
        self.content_length = length;
    }

    pub fn content_length(&self) -> usize {
        self.content_length
    }

    pub fn set_buffer_size(&mut self, size: usize) {
        self.buffer_size = size;
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Adds a header, replacing any previous values unless `allow_multiple` is set.
    pub fn add_header(&mut self, name: &str, value: &str, allow_multiple: bool) {
        self.touch();
        if allow_multiple {
            self.headers.add(name, value);
        } else {
            self.headers.add_unique(name, value);
        }
    }

    pub fn contains_header(&self, name: &str) -> bool {
        self.headers.find_key(name, 0).is_some()
    }

    pub fn header(&self, name: &str, offset: usize) -> Option<&str> {
        self.headers.get(name, offset)
    }

    pub fn headers(&self) -> &OrderedMultiMap {
        &self.headers
    }

    /// Appends `length` bytes of `bytes` starting at `offset` to the body.
    pub fn write(&mut self, bytes: &[u8], offset: usize, length: usize) -> Result<()> {
        self.body.write_slice(bytes, offset, length)?;
        self.touch();
        Ok(())
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.touch();
        self.body.write_byte(byte);
    }

    pub fn print(&mut self, value: impl Display) {
        self.touch();
        self.body.write_str(&value.to_string());
    }

    pub fn println(&mut self, value: impl Display) {
        self.print(value);
        self.body.write_byte(b'\n');
    }

    pub fn body(&self) -> &[u8] {
        self.body.as_bytes()
    }

    /// Hands the buffer out as the response's output stream and remembers it did.
    pub fn stream(&mut self) -> &mut Self {
        self.stream_loaded = true;
        self
    }

    pub fn has_loaded(&self) -> bool {
        self.stream_loaded
    }

    /// Serializes the response and latches the buffer as committed.
    ///
    /// Calling it again on a committed buffer does not serialize twice: the
    /// envelope produced by the first call is returned unchanged.
    pub fn commit(&mut self) -> &str {
        if self.is_committed() {
            tracing::debug!("response already committed, replaying envelope");
            return &self.output;
        }

        let outcome = self.outcome();
        tracing::debug!(status = self.status, ?outcome, "committing response");

        self.output = match outcome {
            Outcome::Error => self.serialize_errors(),
            Outcome::Redirect => self.serialize_redirect(),
            Outcome::Normal => self.serialize_normal(),
        };
        self.state = BufferState::Committed;
        &self.output
    }

    /// The committed envelope; empty before [`commit`](Self::commit).
    pub fn output(&self) -> &str {
        &self.output
    }

    fn serialize_errors(&self) -> String {
        let mut out = String::new();
        for (code, message) in &self.errors {
            out.push_str(&format!("{code}\n{message}\n"));
        }
        out
    }

    fn serialize_redirect(&self) -> String {
        let location = self.redirect.as_deref().unwrap_or_default();
        format!("302 \nContent-Length: {}\n{}", location.len(), location)
    }

    fn serialize_normal(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{}\n{}\nContent-Length: {}\n",
            self.status,
            self.content_type().unwrap_or_default(),
            self.content_length,
        ));

        // names once each in first-seen order, then every live value of that name
        let names: IndexSet<&str> = self.headers.keys().collect();
        for name in names {
            let mut pos = self.headers.find_key(name, 0);
            while let Some(i) = pos {
                if let Some(value) = self.headers.value_at(i) {
                    out.push_str(&format!("{name}: {value}\n"));
                }
                pos = self.headers.find_key(name, i + 1);
            }
        }

        out.push('\n');
        out
    }

    /// Clears the body only; status, headers and outcome are kept.
    pub fn reset_buffer(&mut self) {
        self.body.reset();
    }

    /// Back to a fresh buffer: headers, errors, redirect, status, body and
    /// the commit latch are cleared. Content type, encoding, content length
    /// and buffer size survive.
    pub fn reset(&mut self) {
        self.headers.clear();
        self.errors.clear();
        self.redirect = None;
        self.status = HttpStatus::Ok.code();
        self.output.clear();
        self.state = BufferState::Fresh;
        self.reset_buffer();
    }
}

impl io::Write for ResponseBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ResponseBuffer::write(self, buf, 0, buf.len())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn is_valid_encoding(encoding: &str) -> bool {
    !encoding.is_empty()
        && encoding
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | ':' | '_'))
}
