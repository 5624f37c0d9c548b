//! Catalog sync and notification fan-out for Genkai.
//!
//! The [`Engine`] pulls the external feed page by page, reconciles each item
//! into the catalog through any [`genkai_core::store::CatalogStore`], records
//! every run in the update ledger, and turns newly added episodes into
//! subscription notifications that are pushed to the subscribers' browsers.
//!
//! Work is chained through a [`genkai_core::task::TaskQueue`]:
//! `RunUpdate` enqueues `FanOut`, which enqueues one `Deliver` per
//! notification. [`dispatch::Dispatcher`] is the in-process queue.

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod feed;
pub mod fetch;
pub mod ledger;
pub mod profile;
pub mod push;
pub mod reconcile;

#[cfg(test)]
mod testutil;

pub use engine::Engine;
pub use error::{Error, Result};
