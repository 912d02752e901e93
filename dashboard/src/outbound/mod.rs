//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **memory**: in-process entity store, change feed and blob store used by
//!   tests and offline demos
//! - **rest**: reqwest-backed adapters for the hosted backend's row,
//!   storage and auth APIs
//!
//! Adapters are thin translators between domain types and the transport's
//! representation. They contain no business logic.

pub mod memory;
pub mod rest;
