//! Dive-shop operations desk.
//!
//! Client records, visit membership, trip manifests and the audit log,
//! arranged as a hexagon: [`domain`] holds the entities, services and
//! ports; [`outbound`] implements storage (in memory or over PostgREST);
//! [`inbound`] drives the services from the command line; [`config`]
//! chooses between them at start-up.

pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;
