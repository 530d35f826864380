use std::io::BufReader;
use std::time::SystemTime;

use indexmap::IndexMap;

use crate::config::StubConfig;
use crate::error::{Result, StubError};
use crate::http::cookie::Cookie;
use crate::http::multimap::{OrderedMultiMap, ReadOnlyMultiMap};
use crate::http::{HttpMethod, http_method_from_str};
use crate::stream::ByteSource;

/// Fake of an incoming HTTP request, filled in by the test before the
/// handler under test reads it.
///
/// Header names are lower-cased on the way in and on lookup, so header access
/// is case-insensitive. Parameters keep their exact names. Both allow
/// repeated names.
#[derive(Debug, Clone)]
pub struct FakeRequest {
    method: HttpMethod,
    protocol: String,
    server_name: String,
    server_port: u16,
    context_path: String,
    path_info: Option<String>,
    query: Option<String>,
    remote_addr: String,
    remote_port: u16,

    attributes: IndexMap<String, String>,
    headers: OrderedMultiMap,
    parameters: OrderedMultiMap,
    cookies: Vec<Cookie>,

    character_encoding: Option<String>,
    content_type: Option<String>,
    body: Option<Vec<u8>>,
    body_loaded: bool,
}

impl Default for FakeRequest {
    fn default() -> Self {
        Self::new(&StubConfig::default())
    }
}

impl FakeRequest {
    pub fn new(config: &StubConfig) -> Self {
        Self {
            method: HttpMethod::Get,
            protocol: config.protocol.clone(),
            server_name: config.server_name.clone(),
            server_port: config.server_port,
            context_path: config.context_path.clone(),
            path_info: None,
            query: None,
            remote_addr: "127.0.0.1".to_string(),
            remote_port: 4000,

            attributes: IndexMap::new(),
            headers: OrderedMultiMap::new(),
            parameters: OrderedMultiMap::new(),
            cookies: Vec::new(),

            character_encoding: None,
            content_type: None,
            body: None,
            body_loaded: false,
        }
    }

    /// Accepts GET, POST and PUT; other methods are ignored.
    pub fn set_method(&mut self, method: &str) {
        match http_method_from_str(method) {
            m @ (HttpMethod::Get | HttpMethod::Post | HttpMethod::Put) => self.method = m,
            _ => tracing::debug!(method, "ignoring unsupported request method"),
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.add(&name.to_ascii_lowercase(), value);
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase(), 0)
    }

    /// Every value sent for `name`, in order. Empty when absent.
    pub fn headers(&self, name: &str) -> Vec<&str> {
        self.headers.get_all(&name.to_ascii_lowercase())
    }

    pub fn header_names(&self) -> impl Iterator<Item = &str> {
        self.headers.keys()
    }

    pub fn int_header(&self, name: &str) -> Result<Option<i64>> {
        self.header(name)
            .map(|value| {
                value.trim().parse::<i64>().map_err(|_| {
                    StubError::InvalidArgument(format!("header {name} is not an integer: {value}"))
                })
            })
            .transpose()
    }

    pub fn date_header(&self, name: &str) -> Result<Option<SystemTime>> {
        self.header(name)
            .map(|value| {
                httpdate::parse_http_date(value.trim()).map_err(|_| {
                    StubError::InvalidArgument(format!("header {name} is not a date: {value}"))
                })
            })
            .transpose()
    }

    /// Stores an attribute; `None` removes it.
    pub fn set_attribute(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                self.attributes.insert(name.to_string(), value.to_string());
            }
            None => self.remove_attribute(name),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.shift_remove(name);
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn add_parameter(&mut self, name: &str, value: &str) {
        self.parameters.add(name, value);
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name, 0)
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys()
    }

    /// All values of a parameter, or `None` when it was never added.
    pub fn parameter_values(&self, name: &str) -> Option<Vec<&str>> {
        let values = self.parameters.get_all(name);
        if values.is_empty() { None } else { Some(values) }
    }

    pub fn parameter_map(&self) -> ReadOnlyMultiMap {
        self.parameters.as_map()
    }

    pub fn add_cookie(&mut self, cookie: Cookie) {
        self.cookies.push(cookie);
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Only `http://`, `https://` and `file:` are accepted.
    pub fn set_protocol(&mut self, protocol: &str) {
        if matches!(protocol, "http://" | "https://" | "file:") {
            self.protocol = protocol.to_string();
        }
    }

    pub fn is_secure(&self) -> bool {
        self.protocol.contains("https")
    }

    pub fn scheme(&self) -> &str {
        self.protocol.trim_end_matches("://").trim_end_matches(':')
    }

    pub fn protocol(&self) -> String {
        format!("{}/1.1", self.scheme().to_ascii_uppercase())
    }

    pub fn set_server(&mut self, name: &str, port: u16) {
        self.server_name = name.to_string();
        if port > 0 {
            self.server_port = port;
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    /// Must start with `/` (or be empty) and must not end with `/`.
    pub fn set_context_path(&mut self, path: &str) -> Result<()> {
        if path.ends_with('/') || (!path.is_empty() && !path.starts_with('/')) {
            return Err(StubError::InvalidArgument(format!("context {path} is invalid")));
        }

        self.context_path = path.to_string();
        Ok(())
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    pub fn set_path_info(&mut self, path: &str) {
        self.path_info = Some(path.to_string());
    }

    pub fn path_info(&self) -> Option<&str> {
        self.path_info.as_deref()
    }

    /// An empty query string is stored as no query string.
    pub fn set_query_string(&mut self, query: &str) {
        self.query = (!query.is_empty()).then(|| query.to_string());
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn request_uri(&self) -> String {
        format!("{}{}", self.context_path, self.path_info.as_deref().unwrap_or("/"))
    }

    /// Scheme, host, non-default port and path; the query string is left out.
    pub fn request_url(&self) -> String {
        let mut url = format!("{}{}", self.protocol, self.server_name);
        if self.server_port != 80 {
            url.push_str(&format!(":{}", self.server_port));
        }
        url.push_str(&self.request_uri());
        url
    }

    pub fn set_remote_addr(&mut self, addr: &str) {
        self.remote_addr = addr.to_string();
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// No name resolution happens, the host is the address.
    pub fn remote_host(&self) -> &str {
        &self.remote_addr
    }

    /// Port 0 is ignored.
    pub fn set_client_port(&mut self, port: u16) {
        if port > 0 {
            self.remote_port = port;
        }
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// Unlike the response side, a malformed encoding is reported to the caller.
    pub fn set_character_encoding(&mut self, encoding: &str) -> Result<()> {
        let valid = encoding.starts_with(|c: char| c.is_ascii_alphanumeric())
            && encoding
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | ':' | '_'));
        if !valid {
            return Err(StubError::InvalidArgument(format!("encoding {encoding} is not valid")));
        }

        self.character_encoding = Some(encoding.to_string());
        Ok(())
    }

    pub fn character_encoding(&self) -> Option<&str> {
        self.character_encoding.as_deref()
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>, content_type: &str) {
        self.body = Some(body.into());
        self.content_type = Some(content_type.to_string());
        self.body_loaded = false;
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Length of the body, `None` when no body was set.
    pub fn content_length(&self) -> Option<usize> {
        self.body.as_ref().map(Vec::len)
    }

    /// Opens the body for reading. The body can be opened once, either through
    /// this stream or through [`reader`](Self::reader).
    pub fn input_stream(&mut self) -> Result<ByteSource> {
        let body = self
            .body
            .as_ref()
            .ok_or_else(|| StubError::InvalidState("request has no body".to_string()))?;
        if self.body_loaded {
            return Err(StubError::InvalidState("request body already read".to_string()));
        }

        self.body_loaded = true;
        Ok(ByteSource::new(body.clone()))
    }

    /// Buffered text view of the body, for line-oriented reads.
    pub fn reader(&mut self) -> Result<BufReader<ByteSource>> {
        self.input_stream().map(BufReader::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, Read};

    #[test]
    fn headers_are_case_insensitive_and_repeatable() {
        let mut request = FakeRequest::default();
        request.set_header("Accept", "text/html");
        request.set_header("ACCEPT", "application/json");
        request.set_header("Content-Length", "42");

        assert_eq!(request.header("accept"), Some("text/html"));
        assert_eq!(request.headers("Accept"), vec!["text/html", "application/json"]);
        assert_eq!(
            request.header_names().collect::<Vec<_>>(),
            vec!["accept", "accept", "content-length"]
        );
        assert_eq!(request.int_header("content-length").unwrap(), Some(42));
        assert_eq!(request.int_header("missing").unwrap(), None);
        assert!(request.headers("missing").is_empty());
    }

    #[test]
    fn date_header_parses_http_dates() {
        let mut request = FakeRequest::default();
        request.set_header("If-Modified-Since", "Sun, 06 Nov 1994 08:49:37 GMT");
        request.set_header("Broken", "yesterday");

        let date = request.date_header("if-modified-since").unwrap().unwrap();
        assert_eq!(httpdate::fmt_http_date(date), "Sun, 06 Nov 1994 08:49:37 GMT");
        assert!(matches!(request.date_header("broken"), Err(StubError::InvalidArgument(_))));
    }

    #[test]
    fn parameters_keep_every_value() {
        let mut request = FakeRequest::default();
        request.add_parameter("tag", "a");
        request.add_parameter("page", "2");
        request.add_parameter("tag", "b");

        assert_eq!(request.parameter("tag"), Some("a"));
        assert_eq!(request.parameter_values("tag"), Some(vec!["a", "b"]));
        assert_eq!(request.parameter_values("nope"), None);

        let map = request.parameter_map();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["tag", "page"]);
        assert_eq!(map.get("tag").unwrap().len(), 2);
    }

    #[test]
    fn method_accepts_only_get_post_put() {
        let mut request = FakeRequest::default();
        request.set_method("POST");
        assert_eq!(request.method(), HttpMethod::Post);

        request.set_method("DELETE");
        assert_eq!(request.method().as_str(), "POST");
    }

    #[test]
    fn urls_are_rebuilt_from_parts() {
        let mut request = FakeRequest::default();
        request.set_context_path("/shop").unwrap();
        request.set_path_info("/cart");
        request.set_query_string("id=1");
        request.set_server("example.org", 8080);

        assert_eq!(request.request_uri(), "/shop/cart");
        assert_eq!(request.request_url(), "http://example.org:8080/shop/cart");
        assert_eq!(request.query_string(), Some("id=1"));
        assert_eq!(request.scheme(), "http");
        assert_eq!(request.protocol(), "HTTP/1.1");

        request.set_query_string("");
        assert_eq!(request.query_string(), None);
        assert!(request.set_context_path("shop/").is_err());
    }

    #[test]
    fn character_encoding_is_validated() {
        let mut request = FakeRequest::default();
        assert!(request.set_character_encoding("UTF-8").is_ok());
        assert!(matches!(
            request.set_character_encoding("-utf8"),
            Err(StubError::InvalidArgument(_))
        ));
        assert!(request.set_character_encoding("").is_err());
        assert_eq!(request.character_encoding(), Some("UTF-8"));
    }

    #[test]
    fn body_can_be_read_once() {
        let mut request = FakeRequest::default();
        assert!(matches!(request.input_stream(), Err(StubError::InvalidState(_))));

        request.set_body("a=1&b=2", "application/x-www-form-urlencoded");
        assert_eq!(request.content_length(), Some(7));

        let mut body = String::new();
        request.input_stream().unwrap().read_to_string(&mut body).unwrap();
        assert_eq!(body, "a=1&b=2");
        assert!(matches!(request.input_stream(), Err(StubError::InvalidState(_))));
    }

    #[test]
    fn reader_shares_the_body_latch() {
        let mut request = FakeRequest::default();
        request.set_body("first\nsecond\n", "text/plain");

        let lines: Vec<String> = request.reader().unwrap().lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["first", "second"]);
        assert!(matches!(request.input_stream(), Err(StubError::InvalidState(_))));
        assert!(matches!(request.reader(), Err(StubError::InvalidState(_))));

        // a new body re-arms both
        request.set_body("again", "text/plain");
        let mut body = String::new();
        request.input_stream().unwrap().read_to_string(&mut body).unwrap();
        assert_eq!(body, "again");
        assert!(request.reader().is_err());
    }

    #[test]
    fn attributes_are_set_replaced_and_removed() {
        let mut request = FakeRequest::default();
        request.set_attribute("user", Some("ada"));
        request.set_attribute("role", Some("admin"));
        request.set_attribute("user", Some("grace"));

        assert_eq!(request.attribute("user"), Some("grace"));
        assert_eq!(request.attribute_names().collect::<Vec<_>>(), vec!["user", "role"]);

        request.set_attribute("user", None);
        assert_eq!(request.attribute("user"), None);
        request.remove_attribute("role");
        request.remove_attribute("missing");
        assert_eq!(request.attribute_names().count(), 0);
    }

    #[test]
    fn client_side_details() {
        let mut request = FakeRequest::default();
        assert_eq!(request.remote_port(), 4000);
        assert_eq!(request.remote_host(), "127.0.0.1");
        assert!(!request.is_secure());

        request.set_client_port(0);
        assert_eq!(request.remote_port(), 4000);
        request.set_client_port(52100);
        request.set_remote_addr("10.0.0.7");
        request.set_protocol("https://");

        assert_eq!(request.remote_port(), 52100);
        assert_eq!(request.remote_host(), "10.0.0.7");
        assert!(request.is_secure());
        assert_eq!(request.scheme(), "https");
    }
}
