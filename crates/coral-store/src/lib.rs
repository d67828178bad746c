//! # coral-store
//!
//! Durable, append-only contribution ledger backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle wrapping a
//! `rusqlite::Connection`, typed ledger helpers on top of it, and the
//! [`LedgerStore`] trait the contribution service is written against. An
//! in-memory [`MemoryLedger`] implements the same trait for tests and
//! throwaway deployments.

pub mod database;
pub mod ledger;
pub mod memory;
pub mod migrations;
pub mod models;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use ledger::{LedgerStore, SqliteLedger};
pub use memory::MemoryLedger;
pub use models::Appended;
