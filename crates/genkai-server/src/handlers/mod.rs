//! Read API handlers, grouped by resource.

pub mod notifications;
pub mod titles;
pub mod updates;
