//! Network and filesystem implementations of the fetch/probe traits.

pub mod http;

pub use http::HttpFetcher;
