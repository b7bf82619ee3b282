//! Marketplace Gateway API Adapter
//!
//! Implements the HTTP client for interacting with the marketplace
//! gateway REST API. Handles authentication, listing discovery,
//! relisting, and status queries.
//!
//! Sub-modules:
//! - `auth`: HMAC-SHA256 request signing
//! - `client`: HTTP client with rate limiting and retries
//! - `gateway`: The `Marketplace` port implementation
//! - `types`: API request/response type definitions

pub mod auth;
pub mod client;
pub mod gateway;
pub mod types;
