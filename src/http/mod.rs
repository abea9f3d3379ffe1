//! HTTP client module with timeouts and status handling.

mod client;

pub use client::{CONNECT_TIMEOUT, HttpClient, HttpStatusError, READ_TIMEOUT};
