//! Application layer: the purchase engine and the services the HTTP and CLI
//! interfaces call into.
//!
//! Services hold `Arc<dyn ...>` store handles and are cheap to clone.

pub mod accounts;
pub mod catalog;
pub mod comments;
pub mod purchase;
pub mod query;
