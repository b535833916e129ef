//! Inbound adapters that translate operator input into domain service calls
//! while keeping front-end details at the edge.
//!
//! The terminal front-end lives under [`cli`]; it talks to storage only
//! through the domain ports.

pub mod cli;
