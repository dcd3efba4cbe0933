//! handin-core - Core library for handin
//!
//! This crate contains the shared models, database layer, and the
//! offline-sync engine (bulk document writes, revision diffing, and the
//! optimistically-locked submission ledger) used by the HTTP API.

pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod sync;

pub use error::{Error, Result};
pub use models::{StoredDocument, Submission, SubmissionVersion};
