use std::time::SystemTime;

use crate::config::StubConfig;
use crate::error::{Result, StubError};
use crate::http::buffer::ResponseBuffer;
use crate::http::cookie::Cookie;
use crate::http::status::HttpStatus;

const PROTOCOLS: [&str; 3] = ["http://", "https://", "file:"];
const ABSOLUTE_PREFIXES: [&str; 3] = ["http", "ftp", "file"];

/// Container-side fake of an HTTP response.
///
/// Wraps a [`ResponseBuffer`] and enforces the rules a real container applies
/// around it. Once the response is committed every mutator (headers, cookies,
/// status, errors, redirects, content metadata, body streams, resets) fails
/// with [`StubError::InvalidState`]. A writer may only be taken once, and
/// relative redirects are made absolute.
///
/// A committed response cannot be reused: [`reset`](Self::reset) is refused
/// like any other mutation. Harnesses that run several exchanges build a fresh
/// `FakeResponse` per cycle, or call `reset` before committing.
#[derive(Debug, Clone)]
pub struct FakeResponse {
    buffer: ResponseBuffer,
    cookies: Vec<Cookie>,

    protocol: String,
    server: String,
    context: String,

    encode_urls: bool,
    session_id: Option<String>,
}

impl Default for FakeResponse {
    fn default() -> Self {
        Self::new(&StubConfig::default())
    }
}

impl FakeResponse {
    pub fn new(config: &StubConfig) -> Self {
        let mut buffer = ResponseBuffer::with_buffer_size(config.buffer_size);
        buffer.set_content_type(&config.default_content_type);

        Self {
            buffer,
            cookies: Vec::new(),

            protocol: config.protocol.clone(),
            server: config.server_name.clone(),
            context: config.context_path.clone(),

            encode_urls: config.encode_urls,
            session_id: config.session_id.clone(),
        }
    }

    pub fn buffer(&self) -> &ResponseBuffer {
        &self.buffer
    }

    fn ensure_not_committed(&self, action: &str) -> Result<()> {
        if self.buffer.is_committed() {
            return Err(StubError::InvalidState(format!(
                "cannot {action}: response already committed"
            )));
        }
        Ok(())
    }

    pub fn set_server(&mut self, server: &str) {
        self.server = server.to_string();
    }

    /// Only `http://`, `https://` and `file:` are accepted; anything else is ignored.
    pub fn set_protocol(&mut self, protocol: &str) {
        if PROTOCOLS.contains(&protocol) {
            self.protocol = protocol.to_string();
        } else {
            tracing::debug!(protocol, "ignoring unsupported protocol");
        }
    }

    pub fn set_context_path(&mut self, path: &str) -> Result<()> {
        if path.ends_with('/') || (!path.is_empty() && !path.starts_with('/')) {
            return Err(StubError::InvalidArgument(format!("context {path} is invalid")));
        }

        self.context = path.to_string();
        Ok(())
    }

    pub fn set_session_id(&mut self, session_id: &str, encode_urls: bool) {
        self.session_id = Some(session_id.to_string());
        self.encode_urls = encode_urls;
    }

    pub fn add_cookie(&mut self, cookie: Cookie) -> Result<()> {
        self.ensure_not_committed("add cookie")?;
        self.cookies.push(cookie);
        Ok(())
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn contains_header(&self, name: &str) -> bool {
        self.buffer.contains_header(name)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.buffer.header(name, 0)
    }

    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.buffer.headers().get_all(name)
    }

    /// Adds a value, keeping any previous ones.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.put_header(name, value, true)
    }

    /// Replaces every previous value.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.put_header(name, value, false)
    }

    fn put_header(&mut self, name: &str, value: &str, allow_multiple: bool) -> Result<()> {
        self.ensure_not_committed("change headers")?;
        self.buffer.add_header(name, value, allow_multiple);
        Ok(())
    }

    pub fn add_int_header(&mut self, name: &str, value: i64) -> Result<()> {
        self.put_header(name, &value.to_string(), true)
    }

    pub fn set_int_header(&mut self, name: &str, value: i64) -> Result<()> {
        self.put_header(name, &value.to_string(), false)
    }

    pub fn int_header(&self, name: &str) -> Result<Option<i64>> {
        self.header(name)
            .map(|value| {
                value.parse::<i64>().map_err(|_| {
                    StubError::InvalidArgument(format!("header {name} is not an integer: {value}"))
                })
            })
            .transpose()
    }

    pub fn add_date_header(&mut self, name: &str, date: SystemTime) -> Result<()> {
        self.put_header(name, &httpdate::fmt_http_date(date), true)
    }

    pub fn set_date_header(&mut self, name: &str, date: SystemTime) -> Result<()> {
        self.put_header(name, &httpdate::fmt_http_date(date), false)
    }

    pub fn date_header(&self, name: &str) -> Result<Option<SystemTime>> {
        self.header(name)
            .map(|value| {
                httpdate::parse_http_date(value).map_err(|_| {
                    StubError::InvalidArgument(format!("header {name} is not a date: {value}"))
                })
            })
            .transpose()
    }

    /// Appends `sessionID=<id>` to the query when URL encoding is on.
    pub fn encode_url(&self, url: &str) -> String {
        match (&self.session_id, self.encode_urls) {
            (Some(id), true) => {
                let separator = if url.contains('?') { '&' } else { '?' };
                format!("{url}{separator}sessionID={id}")
            }
            _ => url.to_string(),
        }
    }

    pub fn encode_redirect_url(&self, url: &str) -> String {
        self.encode_url(url)
    }

    pub fn send_error(&mut self, code: u16, message: &str) -> Result<()> {
        self.ensure_not_committed("send error")?;
        self.buffer.write_error(code, message);
        Ok(())
    }

    pub fn send_error_code(&mut self, code: u16) -> Result<()> {
        self.send_error(code, "")
    }

    /// Records a redirect. Locations not starting with `http`, `ftp` or `file`
    /// are resolved against the configured protocol, server and context path.
    pub fn send_redirect(&mut self, location: &str) -> Result<()> {
        self.ensure_not_committed("send redirect")?;

        let location = if ABSOLUTE_PREFIXES.iter().any(|p| location.starts_with(p)) {
            location.to_string()
        } else if location.starts_with('/') {
            format!("{}{}{}", self.protocol, self.server, location)
        } else {
            format!("{}{}{}/{}", self.protocol, self.server, self.context, location)
        };

        self.buffer.write_redirect(&location);
        Ok(())
    }

    pub fn set_status(&mut self, code: u16) -> Result<()> {
        self.ensure_not_committed("set status")?;
        self.buffer.write_status(code);
        Ok(())
    }

    /// Deprecated two-argument form: non-error codes set the status, every
    /// other code is recorded as an error carrying `message`.
    #[deprecated(note = "use set_status or send_error")]
    pub fn set_status_with_message(&mut self, code: u16, message: &str) -> Result<()> {
        tracing::warn!(code, "set_status_with_message is deprecated, use set_status");

        if HttpStatus::is_non_error(code) {
            self.set_status(code)
        } else {
            self.send_error(code, message)
        }
    }

    pub fn status(&self) -> u16 {
        self.buffer.status()
    }

    /// Malformed encodings are ignored, like on the buffer. Only a committed
    /// response is an error.
    pub fn set_character_encoding(&mut self, encoding: &str) -> Result<()> {
        self.ensure_not_committed("set character encoding")?;
        self.buffer.set_character_encoding(encoding);
        Ok(())
    }

    pub fn character_encoding(&self) -> &str {
        self.buffer.character_encoding()
    }

    pub fn set_content_type(&mut self, content_type: &str) -> Result<()> {
        self.ensure_not_committed("set content type")?;
        self.buffer.set_content_type(content_type);
        Ok(())
    }

    pub fn content_type(&self) -> Option<String> {
        self.buffer.content_type()
    }

    pub fn set_content_length(&mut self, length: usize) -> Result<()> {
        self.ensure_not_committed("set content length")?;
        self.buffer.set_content_length(length);
        Ok(())
    }

    /// Binary output stream. May be requested any number of times before commit.
    pub fn output_stream(&mut self) -> Result<&mut ResponseBuffer> {
        self.ensure_not_committed("open output stream")?;
        Ok(self.buffer.stream())
    }

    /// Character output. Fails once any stream or writer was handed out, or
    /// once the response is committed.
    pub fn writer(&mut self) -> Result<&mut ResponseBuffer> {
        self.ensure_not_committed("open writer")?;
        if self.buffer.has_loaded() {
            return Err(StubError::InvalidState("output stream already in use".to_string()));
        }

        if !self.buffer.has_character_encoding() {
            self.buffer.set_character_encoding("ISO-8859-1");
        }
        Ok(self.buffer.stream())
    }

    pub fn set_buffer_size(&mut self, size: usize) -> Result<()> {
        self.ensure_not_committed("set buffer size")?;
        self.buffer.set_buffer_size(size);
        Ok(())
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.buffer_size()
    }

    /// Commits the response and returns the serialized envelope.
    pub fn flush_buffer(&mut self) -> &str {
        self.buffer.commit()
    }

    pub fn output(&self) -> &str {
        self.buffer.output()
    }

    pub fn body(&self) -> &[u8] {
        self.buffer.body()
    }

    pub fn reset_buffer(&mut self) -> Result<()> {
        self.ensure_not_committed("reset buffer")?;
        self.buffer.reset_buffer();
        Ok(())
    }

    pub fn is_committed(&self) -> bool {
        self.buffer.is_committed()
    }

    pub fn reset(&mut self) -> Result<()> {
        self.ensure_not_committed("reset")?;
        self.buffer.reset();
        Ok(())
    }
}
