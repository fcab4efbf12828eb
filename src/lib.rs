//! # permcore
//!
//! Permission resolution over weighted, inheriting groups, backed by a
//! concurrency-safe JSON policy store.
//!
//! ## Features
//!
//! - **Dotted permission nodes** (`content.create`) with trailing-wildcard
//!   patterns (`admin.*`, bare `*`) and a deterministic specificity score
//! - **Weighted group inheritance** with cycle rejection and diamond-safe
//!   chain flattening
//! - **Deterministic tie-breaks**: specificity, then weight, then deny-wins;
//!   no match is an implicit deny, unknown roles fail closed
//! - **Durable policy store**: shared/exclusive file locking with bounded
//!   waits, atomic temp-file + rename saves, seeded default hierarchy
//! - **Per-process caching** of flattened role permissions, lazily
//!   invalidated when the underlying document changes in any process
//! - **Resolution traces** exposing every candidate match for debugging
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use permcore::{PolicyAdmin, PolicyStore, ResolutionEngine, StaticRoles};
//!
//! fn main() -> permcore::Result<()> {
//!     let store = Arc::new(PolicyStore::open("policy.json"));
//!
//!     let admin = PolicyAdmin::new(Arc::clone(&store));
//!     admin.grant("user", "content.create", true, false)?;
//!
//!     let roles = Arc::new(StaticRoles::new().with_role("alice", "user"));
//!     let engine = ResolutionEngine::new(store, roles);
//!
//!     if engine.check("alice", "content.create")? {
//!         println!("Access granted");
//!     }
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod cache;
pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod store;
pub mod types;

// Re-export the public API surface
pub use admin::{PolicyAdmin, WILDCARD_WEIGHT_GATE};
pub use cache::CacheStats;
pub use engine::{
    Candidate, EngineConfig, ResolutionEngine, ResolutionTrace, RoleLookup, StaticRoles,
};
pub use error::{PolicyError, Result, StoreError, ValidationError};
pub use store::{PolicyStore, StoreStamp};
pub use types::{Group, GroupId, PolicyDocument};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
