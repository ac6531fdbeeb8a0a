//! Domain types and the storage ports they are persisted through.

pub mod account;
pub mod comment;
pub mod ids;
pub mod listing;
pub mod ports;
pub mod purchase;
