//! Transport layer for the X API client.

pub mod http;

pub use http::{Auth, HttpTransport, Reply};
