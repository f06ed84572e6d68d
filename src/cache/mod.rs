//! Cache policy and hashing for compiled data views.
//!
//! The compiler never caches results itself. It tells the caller how long a
//! result may be kept ([`CacheInfo`]) and names generated tables with stable
//! hashes so identical requests produce identical SQL.
//!
//! # Tiers
//!
//! ```text
//! no year requested ............................ current
//! years requested, none is the current season .. historical
//! current season, season-level kind ............ season
//! current season, every week already played .... historical
//! anything else ................................ current
//! static / immutable kinds ..................... fixed, unconditionally
//! ```

pub mod hash;
mod policy;

pub use hash::{compute_hash, table_hash};
pub use policy::{
    classify, resolve_cache_policy, resolve_cache_policy_with, CacheInfo, CachePolicyKind,
    CacheTier, CacheTtls, PeriodParams,
};
