use std::io::Read;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    ApprovalStatus, Company, CompanyDraft, CompanyId, DriveDetails, OfficerId, ValidationError,
};
use super::gate::{Access, AuthorizationGate, GateError, GatedOperation};
use super::import::{CompanyCsvImporter, CompanyImportError};
use super::repository::{AssignmentRecord, CompanyRepository, RepositoryError};

/// Service sequencing the authorization gate, the company aggregate, and the
/// repository for every lifecycle operation.
pub struct CompanyWorkflowService<R> {
    gate: AuthorizationGate,
    repository: Arc<R>,
}

/// Result of a partial-failure tolerant batch import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub imported: Vec<CompanyId>,
    pub failures: Vec<ImportFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub index: usize,
    pub company_name: String,
    pub reason: String,
}

impl<R> CompanyWorkflowService<R>
where
    R: CompanyRepository + 'static,
{
    pub fn new(repository: Arc<R>, gate: AuthorizationGate) -> Self {
        Self { gate, repository }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Validate and persist a new company, returning its assigned identifier.
    pub fn create_company(
        &self,
        token: Option<&str>,
        draft: CompanyDraft,
    ) -> Result<CompanyId, CompanyServiceError> {
        self.authorize(token, GatedOperation::CreateCompany)?;
        let company = Company::new(draft)?;
        let id = self.repository.create(&company)?;
        Ok(id)
    }

    /// Replace a company's descriptive attributes (and drive, when supplied).
    pub fn update_company(
        &self,
        token: Option<&str>,
        id: &CompanyId,
        draft: CompanyDraft,
    ) -> Result<Company, CompanyServiceError> {
        self.authorize(token, GatedOperation::UpdateCompany)?;
        let mut company = self.load(id)?;
        company.revise(draft)?;
        self.repository.update(&company)?;
        self.load(id)
    }

    /// Replace the drive details; approval drops back to pending.
    pub fn update_drive(
        &self,
        token: Option<&str>,
        id: &CompanyId,
        details: DriveDetails,
    ) -> Result<Company, CompanyServiceError> {
        self.authorize(token, GatedOperation::UpdateDrive)?;
        let mut company = self.load(id)?;
        let previous = company.approval_status();
        company.update_drive(details);
        self.repository.update(&company)?;

        if previous != ApprovalStatus::Pending {
            info!(
                company_id = %id,
                previous = previous.as_str(),
                "drive changed, approval reset to pending"
            );
        }
        self.load(id)
    }

    /// Assign the company to a placement officer and append the audit row.
    pub fn assign_to_officer(
        &self,
        token: Option<&str>,
        company_id: &CompanyId,
        officer_id: OfficerId,
        assigned_by: &str,
    ) -> Result<AssignmentRecord, CompanyServiceError> {
        self.authorize(token, GatedOperation::AssignOfficer)?;
        let mut company = self.load(company_id)?;
        company.assign_officer(officer_id);
        let record = self.repository.record_assignment(&company, assigned_by)?;

        info!(
            company_id = %company_id,
            officer_id = %record.officer_id,
            assigned_by,
            "company assigned"
        );
        Ok(record)
    }

    pub fn set_approval_status(
        &self,
        token: Option<&str>,
        company_id: &CompanyId,
        status: ApprovalStatus,
        notes: &str,
        updated_by: &str,
    ) -> Result<Company, CompanyServiceError> {
        self.authorize(token, GatedOperation::SetApproval)?;
        let mut company = self.load(company_id)?;
        let previous = company.approval_status();
        company.set_approval(status, notes);
        self.repository.update_approval(&company)?;

        info!(
            company_id = %company_id,
            from = previous.as_str(),
            to = status.as_str(),
            updated_by,
            "approval status changed"
        );
        Ok(company)
    }

    pub fn mark_data_validated(
        &self,
        token: Option<&str>,
        company_id: &CompanyId,
    ) -> Result<Company, CompanyServiceError> {
        self.authorize(token, GatedOperation::MarkValidated)?;
        let mut company = self.load(company_id)?;
        company.mark_data_validated();
        self.repository.update(&company)?;
        Ok(company)
    }

    /// Create every draft independently. Failures are collected, never fatal.
    pub fn import_batch(
        &self,
        token: Option<&str>,
        drafts: Vec<CompanyDraft>,
    ) -> Result<ImportReport, CompanyServiceError> {
        self.authorize(token, GatedOperation::ImportBatch)?;
        Ok(self.create_each(drafts))
    }

    /// Authorize the import, then read the CSV sheet and create its rows after
    /// any drafts passed alongside it. A malformed sheet fails the whole call.
    pub fn import_sheet<S: Read>(
        &self,
        token: Option<&str>,
        sheet: S,
        mut drafts: Vec<CompanyDraft>,
    ) -> Result<ImportReport, CompanyServiceError> {
        self.authorize(token, GatedOperation::ImportBatch)?;
        drafts.extend(CompanyCsvImporter::from_reader(sheet)?);
        Ok(self.create_each(drafts))
    }

    fn create_each(&self, drafts: Vec<CompanyDraft>) -> ImportReport {
        let mut report = ImportReport::default();
        for (index, draft) in drafts.into_iter().enumerate() {
            let company_name = draft.name.clone();
            let outcome = Company::new(draft)
                .map_err(CompanyServiceError::from)
                .and_then(|company| {
                    self.repository
                        .create(&company)
                        .map_err(CompanyServiceError::from)
                });

            match outcome {
                Ok(id) => report.imported.push(id),
                Err(err) => {
                    warn!(index, company = %company_name, error = %err, "skipping import record");
                    report.failures.push(ImportFailure {
                        index,
                        company_name,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            imported = report.imported.len(),
            failed = report.failures.len(),
            "company import finished"
        );
        report
    }

    pub fn get(&self, id: &CompanyId) -> Result<Company, CompanyServiceError> {
        self.load(id)
    }

    pub fn get_by_hr_email(&self, email: &str) -> Result<Company, CompanyServiceError> {
        let company = self
            .repository
            .fetch_by_hr_email(email)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(company)
    }

    pub fn list_by_officer(
        &self,
        officer: &OfficerId,
    ) -> Result<Vec<Company>, CompanyServiceError> {
        Ok(self.repository.list_by_officer(officer)?)
    }

    pub fn list_all(&self) -> Result<Vec<Company>, CompanyServiceError> {
        Ok(self.repository.list_all()?)
    }

    pub fn assignment_history(
        &self,
        id: &CompanyId,
    ) -> Result<Vec<AssignmentRecord>, CompanyServiceError> {
        self.load(id)?;
        Ok(self.repository.assignments(id)?)
    }

    fn load(&self, id: &CompanyId) -> Result<Company, CompanyServiceError> {
        let company = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(company)
    }

    fn authorize(
        &self,
        token: Option<&str>,
        operation: GatedOperation,
    ) -> Result<Access, CompanyServiceError> {
        self.gate.authorize(token, operation).map_err(|err| {
            warn!(%operation, error = %err, "authorization rejected");
            CompanyServiceError::from(err)
        })
    }
}

/// Error raised by the company workflow service.
#[derive(Debug, thiserror::Error)]
pub enum CompanyServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Authorization(#[from] GateError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Import(#[from] CompanyImportError),
}
