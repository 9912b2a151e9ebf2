use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

use crate::companies::domain::{
    Company, CompanyDraft, CompanyId, CompanyProfile, DriveDetails, DriveStatus, HrContact,
    OfficerId,
};
use crate::companies::gate::{
    AccessPolicy, AuthMode, AuthorizationGate, ROLE_ADMIN, ROLE_PLACEMENT_OFFICER,
};
use crate::companies::repository::{AssignmentRecord, CompanyRepository, RepositoryError};
use crate::companies::{company_router, CompanyWorkflowService};

pub(super) const SECRET: &str = "placement-test-secret";

pub(super) fn acme_draft() -> CompanyDraft {
    CompanyDraft {
        name: "Acme".to_string(),
        location: "Remote".to_string(),
        target_branch: "CS".to_string(),
        packages: vec![12.5],
        remarks: String::new(),
        last_contacted: false,
        follow_up: None,
        hr: HrContact {
            name: "Dana Ruiz".to_string(),
            email: "hr@acme.test".to_string(),
            phone: "+1-555-0100".to_string(),
            position: "Talent Lead".to_string(),
            linkedin_url: None,
        },
        profile: CompanyProfile {
            website: "https://acme.test".to_string(),
            industry: "Manufacturing".to_string(),
            ..CompanyProfile::default()
        },
        drive: None,
        created_by: Some("officer-1".to_string()),
    }
}

pub(super) fn scheduled_drive() -> DriveDetails {
    DriveDetails {
        roles_offered: vec!["SDE".to_string()],
        eligible_branches: vec!["CS".to_string(), "IT".to_string()],
        min_cgpa: Some(7.5),
        ..DriveDetails::new(DriveStatus::Scheduled)
    }
}

pub(super) fn token(role: &str) -> String {
    encode(
        &Header::default(),
        &json!({ "role": role }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("token encodes")
}

/// Gate that admits officers and admins, with approval limited to admins.
pub(super) fn hmac_gate() -> AuthorizationGate {
    let policy = AccessPolicy::new(vec![
        ROLE_ADMIN.to_string(),
        ROLE_PLACEMENT_OFFICER.to_string(),
    ])
    .with_approval_roles(Some(vec![ROLE_ADMIN.to_string()]));
    AuthorizationGate::new(
        AuthMode::Hmac {
            secret: SECRET.to_string(),
        },
        policy,
    )
}

pub(super) fn build_service() -> (
    CompanyWorkflowService<MemoryRepository>,
    Arc<MemoryRepository>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let service = CompanyWorkflowService::new(repository.clone(), hmac_gate());
    (service, repository)
}

pub(super) fn router_with_service(
    service: CompanyWorkflowService<MemoryRepository>,
) -> axum::Router {
    company_router(Arc::new(service))
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    companies: Mutex<BTreeMap<CompanyId, Company>>,
    assignments: Mutex<Vec<AssignmentRecord>>,
}

impl MemoryRepository {
    pub(super) fn len(&self) -> usize {
        self.companies.lock().expect("repository mutex poisoned").len()
    }
}

impl CompanyRepository for MemoryRepository {
    fn create(&self, company: &Company) -> Result<CompanyId, RepositoryError> {
        let mut guard = self.companies.lock().expect("repository mutex poisoned");
        let id = CompanyId(format!("company-{}", guard.len() + 1));
        guard.insert(id.clone(), company.clone().with_id(id.clone()));
        Ok(id)
    }

    fn update(&self, company: &Company) -> Result<(), RepositoryError> {
        let id = company.id().ok_or(RepositoryError::NotFound)?;
        let mut guard = self.companies.lock().expect("repository mutex poisoned");
        match guard.get_mut(id) {
            Some(stored) if company.revision.is_some_and(|seen| seen != stored.updated_at()) => {
                Err(RepositoryError::Conflict(format!("company {id} moved")))
            }
            Some(stored) => {
                *stored = company.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        let guard = self.companies.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned().map(Company::loaded))
    }

    fn fetch_by_hr_email(&self, email: &str) -> Result<Option<Company>, RepositoryError> {
        let guard = self.companies.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|company| company.hr.email == email)
            .min_by_key(|company| company.created_at())
            .cloned()
            .map(Company::loaded))
    }

    fn list_by_officer(&self, officer: &OfficerId) -> Result<Vec<Company>, RepositoryError> {
        let guard = self.companies.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|company| company.assigned_officer() == Some(officer))
            .cloned()
            .map(Company::loaded)
            .collect())
    }

    fn list_all(&self) -> Result<Vec<Company>, RepositoryError> {
        let guard = self.companies.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().map(Company::loaded).collect())
    }

    fn record_assignment(
        &self,
        company: &Company,
        assigned_by: &str,
    ) -> Result<AssignmentRecord, RepositoryError> {
        self.update(company)?;
        let mut audit = self.assignments.lock().expect("assignment mutex poisoned");
        let record = AssignmentRecord {
            assignment_id: format!("assignment-{}", audit.len() + 1),
            company_id: company.id().cloned().ok_or(RepositoryError::NotFound)?,
            officer_id: company
                .assigned_officer()
                .cloned()
                .ok_or_else(|| RepositoryError::Persistence("no officer".to_string()))?,
            assigned_by: assigned_by.to_string(),
            assigned_at: Utc::now(),
        };
        audit.push(record.clone());
        Ok(record)
    }

    fn update_approval(&self, company: &Company) -> Result<(), RepositoryError> {
        self.update(company)
    }

    fn assignments(&self, id: &CompanyId) -> Result<Vec<AssignmentRecord>, RepositoryError> {
        let guard = self.assignments.lock().expect("assignment mutex poisoned");
        Ok(guard
            .iter()
            .filter(|record| &record.company_id == id)
            .cloned()
            .collect())
    }
}

type Interleaved = Box<dyn FnOnce(&MemoryRepository) + Send>;

/// Memory store that lets another writer commit between an approval
/// change being loaded and being written.
pub(super) struct InterleavedRepository {
    pub(super) inner: MemoryRepository,
    before_approval_write: Mutex<Option<Interleaved>>,
}

impl InterleavedRepository {
    pub(super) fn new(
        inner: MemoryRepository,
        before_approval_write: impl FnOnce(&MemoryRepository) + Send + 'static,
    ) -> Self {
        Self {
            inner,
            before_approval_write: Mutex::new(Some(Box::new(before_approval_write))),
        }
    }
}

impl CompanyRepository for InterleavedRepository {
    fn create(&self, company: &Company) -> Result<CompanyId, RepositoryError> {
        self.inner.create(company)
    }

    fn update(&self, company: &Company) -> Result<(), RepositoryError> {
        self.inner.update(company)
    }

    fn fetch(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn fetch_by_hr_email(&self, email: &str) -> Result<Option<Company>, RepositoryError> {
        self.inner.fetch_by_hr_email(email)
    }

    fn list_by_officer(&self, officer: &OfficerId) -> Result<Vec<Company>, RepositoryError> {
        self.inner.list_by_officer(officer)
    }

    fn list_all(&self) -> Result<Vec<Company>, RepositoryError> {
        self.inner.list_all()
    }

    fn record_assignment(
        &self,
        company: &Company,
        assigned_by: &str,
    ) -> Result<AssignmentRecord, RepositoryError> {
        self.inner.record_assignment(company, assigned_by)
    }

    fn update_approval(&self, company: &Company) -> Result<(), RepositoryError> {
        let pending = self
            .before_approval_write
            .lock()
            .expect("hook mutex poisoned")
            .take();
        if let Some(interleave) = pending {
            interleave(&self.inner);
        }
        self.inner.update_approval(company)
    }

    fn assignments(&self, id: &CompanyId) -> Result<Vec<AssignmentRecord>, RepositoryError> {
        self.inner.assignments(id)
    }
}

pub(super) struct UnavailableRepository;

impl UnavailableRepository {
    fn offline<T>() -> Result<T, RepositoryError> {
        Err(RepositoryError::Persistence("database offline".to_string()))
    }
}

impl CompanyRepository for UnavailableRepository {
    fn create(&self, _company: &Company) -> Result<CompanyId, RepositoryError> {
        Self::offline()
    }

    fn update(&self, _company: &Company) -> Result<(), RepositoryError> {
        Self::offline()
    }

    fn fetch(&self, _id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        Self::offline()
    }

    fn fetch_by_hr_email(&self, _email: &str) -> Result<Option<Company>, RepositoryError> {
        Self::offline()
    }

    fn list_by_officer(&self, _officer: &OfficerId) -> Result<Vec<Company>, RepositoryError> {
        Self::offline()
    }

    fn list_all(&self) -> Result<Vec<Company>, RepositoryError> {
        Self::offline()
    }

    fn record_assignment(
        &self,
        _company: &Company,
        _assigned_by: &str,
    ) -> Result<AssignmentRecord, RepositoryError> {
        Self::offline()
    }

    fn update_approval(&self, _company: &Company) -> Result<(), RepositoryError> {
        Self::offline()
    }

    fn assignments(&self, _id: &CompanyId) -> Result<Vec<AssignmentRecord>, RepositoryError> {
        Self::offline()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
