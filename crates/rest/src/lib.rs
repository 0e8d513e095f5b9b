//! Async client for a remote org.
//!
//! Wraps the three HTTP surfaces the deploy workflows need: the Tooling
//! REST API (queries and sobject CRUD), the Metadata REST deploy endpoint
//! (multipart archive upload plus status), and the OAuth token endpoint.

pub mod client;

pub use client::{Client, Error};
