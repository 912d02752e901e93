//! Role-filtered, live-reconciled data access for the construction project
//! dashboard.
//!
//! The crate is a hexagonal module tree: `domain` owns the access policy,
//! the change reconciler and the per-entity services, and talks to the
//! hosted backend only through the traits in [`domain::ports`]. The
//! `outbound` adapters implement those ports for an in-process store and for
//! the hosted REST surfaces.

pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(test)]
mod test_support;

pub use config::DashboardSettings;
