//! `kindred-memory` – The Relationship and Fact Stores.
//!
//! Two independent stores, each behind its own lock when shared:
//!
//! - [`identity`] – [`IdentityStore`][identity::IdentityStore]: keyed,
//!   decaying relationship memory over one-way capture fingerprints, with
//!   ordered tier promotion and TOML snapshot persistence.
//! - [`facts`] – [`RetainedFactStore`][facts::RetainedFactStore]: a
//!   capacity-bounded store of `(content, importance)` pairs that evicts
//!   the least valuable entry under pressure.

pub mod facts;
pub mod identity;

pub use facts::{RetainedFact, RetainedFactStore};
pub use identity::{
    CONTEXT_THRESHOLD, FORGET_WINDOW_DAYS, FRIEND_THRESHOLD, IdentityRecord, IdentitySnapshot,
    IdentityStore,
};
