//! In-memory fakes of HTTP request/response containers.
//!
//! The fakes let handler code be exercised without a server: a test builds a
//! [`FakeRequest`], passes it together with a [`FakeResponse`] to the code
//! under test, then inspects what the response accumulated or the envelope it
//! produced on commit.
//!
//! Everything is single-threaded and synchronous. A response models exactly
//! one exchange. [`FakeResponse::reset`] works only before commit, so run each
//! further exchange against a fresh response.

pub mod config;
pub mod error;
pub mod http;
pub mod stream;

pub use config::StubConfig;
pub use error::{Result, StubError};
pub use http::buffer::{Outcome, ResponseBuffer};
pub use http::cookie::Cookie;
pub use http::multimap::{OrderedMultiMap, ReadOnlyMultiMap};
pub use http::request::FakeRequest;
pub use http::response::FakeResponse;
pub use stream::{ByteSink, ByteSource};
