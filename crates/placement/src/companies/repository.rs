use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Company, CompanyId, OfficerId};

/// Immutable audit row written every time a company changes hands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentRecord {
    pub assignment_id: String,
    pub company_id: CompanyId,
    pub officer_id: OfficerId,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

/// Storage port for the company aggregate.
///
/// Every write is atomic: the company row, its drive row and any audit row
/// touched by one call commit or roll back together. Writes of a company that
/// was loaded from the store fail with [`RepositoryError::Conflict`] once the
/// stored row has moved past the `updated_at` it was read with.
pub trait CompanyRepository: Send + Sync {
    /// Persist a new company (and its drive, when present) under a fresh id.
    fn create(&self, company: &Company) -> Result<CompanyId, RepositoryError>;
    /// Overwrite the company row and reconcile its drive row.
    fn update(&self, company: &Company) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
    fn fetch_by_hr_email(&self, email: &str) -> Result<Option<Company>, RepositoryError>;
    fn list_by_officer(&self, officer: &OfficerId) -> Result<Vec<Company>, RepositoryError>;
    fn list_all(&self) -> Result<Vec<Company>, RepositoryError>;
    /// Store the company's current assignee and append the audit row.
    fn record_assignment(
        &self,
        company: &Company,
        assigned_by: &str,
    ) -> Result<AssignmentRecord, RepositoryError>;
    /// Store only the approval columns of the company.
    fn update_approval(&self, company: &Company) -> Result<(), RepositoryError>;
    fn assignments(&self, id: &CompanyId) -> Result<Vec<AssignmentRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("company not found")]
    NotFound,
    #[error("conflicting record: {0}")]
    Conflict(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}
