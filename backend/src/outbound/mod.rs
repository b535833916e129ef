//! Outbound adapters implementing domain ports.
//!
//! - **memory**: in-process tables with backend-style integrity rules and
//!   audit rows; ships the demo dataset.
//! - **postgrest**: HTTP adapter for a PostgREST endpoint.
//!
//! Adapters translate between rows and domain types. They contain no desk
//! logic.

pub mod memory;
pub mod postgrest;
pub mod rows;
