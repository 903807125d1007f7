//! Infrastructure Layer
//!
//! Store implementations of the domain ports.

pub mod memory;
pub mod postgres;
pub mod redis;

pub use self::memory::{InMemoryGuestCounter, InMemoryUsageRepository};
pub use self::postgres::PgUsageRepository;
pub use self::redis::RedisGuestCounter;
