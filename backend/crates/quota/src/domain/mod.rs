//! Domain Layer - Quota vocabulary and pure logic
//!
//! This layer contains:
//! - Value objects (Caller, Plan, QuotaLimit, Remaining, Layer, SessionHash)
//! - Entities (RateLimitBucket, RateLimitDecision)
//! - Domain services (bucket window math)
//! - Repository traits for the durable and cache counters

pub mod entities;
pub mod repository;
pub mod services;
pub mod value_objects;
