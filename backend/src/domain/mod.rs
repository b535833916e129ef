//! Domain primitives, services and ports.
//!
//! Purpose: model the dive desk's records (clients, visits, trips, audit
//! rows) and the operations the desk performs on them, independent of the
//! storage backend and of the terminal front-end.
//!
//! Public surface:
//! - `DomainError` (also exported as `Error`) and `ErrorCode`.
//! - Entities: `Client`, `Visit`, `Trip`, `ManifestEntry`, `AuditLogEntry`.
//! - Services: `ClientWorkspace`, `TripBoard`, `AuditLogViewer`.
//! - `ports`: storage and user-interaction traits.

pub mod audit;
pub mod audit_log_viewer;
pub mod client;
pub mod client_workspace;
pub mod error;
pub mod ports;
pub mod store;
pub mod trip;
pub mod trip_board;
pub mod visit;

pub use self::audit::{AuditAction, AuditLogEntry, AuditLogId, ChangeSummary, FieldChange};
pub use self::audit_log_viewer::{AuditLogViewer, AuditRow, DEFAULT_AUDIT_LIMIT};
pub use self::client::{
    CertificationLevel, Client, ClientId, ClientKey, ClientProfile, ClientValidationError, DraftId,
};
pub use self::client_workspace::{
    ClientWorkspace, SelectedClient, Selection, VisitRef, VisitsStatus,
};
pub use self::error::{DomainError, DomainError as Error, ErrorCode, ErrorValidationError};
pub use self::store::EntityStore;
pub use self::trip::{
    ManifestEntry, ManifestEntryId, NewManifestEntry, OccupancyLevel, Trip, TripId, TripOccupancy,
};
pub use self::trip_board::{TripBoard, TripSchedule};
pub use self::visit::{
    DateRange, Visit, VisitDetails, VisitHistoryEntry, VisitId, VisitMembership, VisitRecord,
};

/// Convenient result alias for domain operations.
///
/// # Examples
/// ```
/// use divedesk::domain::{DomainResult, Error};
///
/// fn lookup() -> DomainResult<()> {
///     Err(Error::not_found("client 9 not found"))
/// }
/// assert!(lookup().is_err());
/// ```
pub type DomainResult<T> = Result<T, Error>;
