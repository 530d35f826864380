/// Status codes the fakes know by name.
///
/// Buffers store plain `u16` codes so tests can use any value; this enum is
/// a convenience for the common ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Continue = 100,
    SwitchingProtocols = 101,

    Ok = 200,
    Created = 201,

    MovedPermanently = 301,
    Found = 302,
    SeeOther = 303,
    NotModified = 304,
    TemporaryRedirect = 307,

    BadRequest = 400,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,

    InternalServerError = 500,
}

impl HttpStatus {
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Statuses that `set_status_with_message` applies directly instead of
    /// recording them as an error.
    pub fn is_non_error(code: u16) -> bool {
        matches!(
            code,
            100 | 101 | 200 | 201 | 301 | 302 | 303 | 304 | 307
        )
    }
}

impl From<HttpStatus> for u16 {
    fn from(status: HttpStatus) -> Self {
        status.code()
    }
}
