//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Ports describe how the domain expects to interact with driven adapters
//! (the relational backend and the person at the desk). Each storage trait
//! exposes a typed error enum so adapters map their failures into
//! predictable variants.

mod macros;
pub(crate) use macros::define_port_error;

mod audit_log_repository;
mod client_repository;
mod trip_repository;
mod user_interaction;
mod visit_repository;

#[cfg(test)]
pub use audit_log_repository::MockAuditLogRepository;
pub use audit_log_repository::{AuditLogRepository, AuditLogRepositoryError};
#[cfg(test)]
pub use client_repository::MockClientRepository;
pub use client_repository::{ClientRepository, ClientRepositoryError};
#[cfg(test)]
pub use trip_repository::MockTripRepository;
pub use trip_repository::{TripRepository, TripRepositoryError};
#[cfg(test)]
pub use user_interaction::MockUserInteraction;
pub use user_interaction::{
    FixtureUserInteraction, Notification, NotificationLevel, UserInteraction,
};
#[cfg(test)]
pub use visit_repository::MockVisitRepository;
pub use visit_repository::{VisitRepository, VisitRepositoryError};
