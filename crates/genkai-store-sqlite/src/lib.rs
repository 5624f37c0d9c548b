//! SQLite backend for the Genkai catalog store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every `call` closure runs to completion
//! on that thread before the next one starts, so each get-or-create below is
//! a single closure wrapped in a transaction, with unique indexes as the
//! backstop.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
