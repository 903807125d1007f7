//! Shared Kernel - Domain-crossing minimal core
//!
//! This crate contains the "smallest core" of vocabulary shared by the
//! quota service crates:
//! - The unified error type ([`error::app_error::AppError`]) and its kinds
//! - Conversions from infrastructure errors (sqlx, redis, serde_json)
//! - Typed ID wrappers
//!
//! Only things whose meaning is identical across crates belong here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
