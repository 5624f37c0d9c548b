//! Core types and trait definitions for the Genkai catalog sync engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The store backend, the sync engine and the server all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod catalog;
pub mod error;
pub mod notification;
pub mod resolver;
pub mod slug;
pub mod store;
pub mod task;
pub mod title;
pub mod update;

pub use error::{Error, Result};
