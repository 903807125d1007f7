//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Client identification (proxy-aware IP resolution, User-Agent fingerprint)
//! - Cookie parsing and `Set-Cookie` construction
//! - Cryptographic utilities (SHA-256, HMAC-SHA256, random bytes, hex)
//! - Fixed-window arithmetic shared by counter backends

pub mod client;
pub mod cookie;
pub mod crypto;
pub mod rate_limit;
