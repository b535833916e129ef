//! PostgREST outbound adapter.
//!
//! Implements the storage ports against a PostgREST endpoint, the REST
//! dialect spoken by hosted Postgres services. Transport details live in
//! `http`; embedded payload shapes in `dto`.

mod dto;
mod http;
mod repositories;

pub use http::PostgrestSettings;
pub use repositories::PostgrestStorage;
