//! Resilient HTTP client

mod client;

pub use client::ApiClient;
