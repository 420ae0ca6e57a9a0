//! rho-api: wire layer for the rho chat backend
//!
//! This crate provides the request/response types, the HTTP client, and the
//! incremental frame decoder used to consume streamed answers.

pub mod client;
pub mod error;
pub mod stream;
pub mod types;

pub use client::{ApiClient, ClientConfig};
pub use error::{Error, Result};
pub use stream::{ByteStream, FrameDecoder, FrameStream, StreamFrame};
pub use types::*;
