//! In-memory byte streams backing the fake request and response bodies.
//!
//! [`ByteSink`] collects what a handler writes into a response and
//! [`ByteSource`] replays a request body. Both implement the blocking
//! `std::io` traits as well as the `async_std::io` ones, so synchronous and
//! asynchronous handlers can be driven with the same fakes. The async
//! implementations never return `Poll::Pending`.

pub mod sink;
pub mod source;

pub use sink::ByteSink;
pub use source::ByteSource;
