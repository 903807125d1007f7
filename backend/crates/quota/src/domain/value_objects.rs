//! Domain Value Objects
//!
//! Immutable value types for the quota domain.

use kernel::id::UserId;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// Who is asking for quota
///
/// Closed set: adding a class must force a decision everywhere it is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// Anonymous browser, identified by IP and a session cookie
    Guest,
    /// Signed-in user, identified by the auth subsystem
    Authenticated { user_id: UserId, plan: Plan },
}

/// Billing plan of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Free,
    Paid,
}

impl Plan {
    pub const fn code(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Paid => "paid",
        }
    }
}

/// Metered resource, e.g. `"message"`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceType(Cow<'static, str>);

impl ResourceType {
    pub const MESSAGE: ResourceType = ResourceType(Cow::Borrowed("message"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keyed one-way digest of a guest session token (lowercase hex)
///
/// The only form in which a guest session ever reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHash(String);

impl SessionHash {
    pub fn from_hex(hex: String) -> Self {
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Raw guest session token as held by the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub value: String,
    /// True when no usable cookie was presented and this token was minted
    pub fresh: bool,
}

/// Ceiling applied to a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaLimit {
    Capped(u32),
    /// Count is still recorded, but nothing is ever denied
    Unlimited,
}

impl QuotaLimit {
    /// Evaluate a hit count against this limit
    ///
    /// `inclusive` is true for post-increment counts (the hit being admitted
    /// is already counted) and false for read-only peeks.
    pub fn evaluate(&self, count: i64, inclusive: bool) -> (bool, Remaining) {
        match *self {
            QuotaLimit::Unlimited => (true, Remaining::Unlimited),
            QuotaLimit::Capped(limit) => {
                let limit = i64::from(limit);
                let allowed = if inclusive {
                    count <= limit
                } else {
                    count < limit
                };
                let remaining = (limit - count).clamp(0, limit) as u32;
                (allowed, Remaining::Limited(remaining))
            }
        }
    }

    /// Remaining quota when nothing has been counted
    pub fn full(&self) -> Remaining {
        match *self {
            QuotaLimit::Capped(limit) => Remaining::Limited(limit),
            QuotaLimit::Unlimited => Remaining::Unlimited,
        }
    }
}

impl fmt::Display for QuotaLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaLimit::Capped(limit) => write!(f, "{limit}"),
            QuotaLimit::Unlimited => f.write_str(UNLIMITED),
        }
    }
}

const UNLIMITED: &str = "unlimited";

/// Remaining quota in the current bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Limited(u32),
    Unlimited,
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remaining::Limited(n) => write!(f, "{n}"),
            Remaining::Unlimited => f.write_str(UNLIMITED),
        }
    }
}

// Serialized as a JSON number, or the string "unlimited".
impl Serialize for Remaining {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Remaining::Limited(n) => serializer.serialize_u32(*n),
            Remaining::Unlimited => serializer.serialize_str(UNLIMITED),
        }
    }
}

/// Which check produced the final verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Bypass,
    Cache,
    Durable,
}

impl Layer {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Layer::Bypass => "bypass",
            Layer::Cache => "cache",
            Layer::Durable => "durable",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
