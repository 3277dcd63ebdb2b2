//! HTTP transport shared by every adapter

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
