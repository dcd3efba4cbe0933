//! Database layer for handin

mod connection;
mod directory;
mod doc_store;
mod migrations;

pub use connection::Database;
pub use directory::{Directory, LibSqlDirectory};
pub use doc_store::{DocumentStore, LibSqlDocumentStore};
