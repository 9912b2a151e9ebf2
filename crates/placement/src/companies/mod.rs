//! Company records for the placement portal.
//!
//! A company moves through data validation, officer assignment and an
//! approval workflow. Every mutation passes the role gate first and lands in
//! the store as a single transaction.

pub mod domain;
pub mod gate;
pub mod import;
pub mod repository;
pub mod router;
pub mod service;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use domain::{
    ApprovalStatus, Company, CompanyDraft, CompanyId, CompanyProfile, DriveDetails, DriveStatus,
    HrContact, OfficerId, ValidationError,
};
pub use gate::{
    Access, AccessPolicy, AuthMode, AuthorizationGate, BypassReason, GateError, GatedOperation,
};
pub use import::{CompanyCsvImporter, CompanyImportError};
pub use repository::{AssignmentRecord, CompanyRepository, RepositoryError};
pub use router::company_router;
pub use service::{CompanyServiceError, CompanyWorkflowService, ImportFailure, ImportReport};
pub use sqlite::SqliteCompanyRepository;
