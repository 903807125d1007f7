//! Presentation Layer
//!
//! HTTP handlers, middleware, DTOs and router.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;
