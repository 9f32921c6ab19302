//! `kindred-ledger` – The Progressive-Unlock Ledger.
//!
//! Tracks repeated exposure to the fixed attribute catalogue and promotes
//! each member to "unlocked" after a threshold.  Unlocking is irreversible
//! and exposure stops being tracked once it happens: the ledger models a
//! one-time learning threshold, not continuous reinforcement.
//!
//! The full ledger state round-trips through a flat TOML snapshot so a
//! restarted agent keeps everything it has learned.

pub mod ledger;

pub use ledger::{AttributeState, LedgerSnapshot, UNLOCK_THRESHOLD, UnlockLedger};
