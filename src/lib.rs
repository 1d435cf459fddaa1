//! Work/publish version ledger for a compositing pipeline.
//!
//! The ledger keeps every work item at exactly one current version and moves
//! it forward only by publishing. See [`ledger::VersionLedger`].

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod host;
pub mod ledger;
pub mod menu;
pub mod models;
pub mod templates;
pub mod tracking;

pub use error::LedgerError;
pub use ledger::VersionLedger;
