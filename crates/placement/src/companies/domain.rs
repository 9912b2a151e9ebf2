use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Opaque company identifier, assigned by the repository on create.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub String);

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the placement officer a company is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfficerId(pub String);

impl fmt::Display for OfficerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// HR contact at the recruiting company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HrContact {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
}

/// General information about the company itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub website: String,
    pub industry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founded_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriveStatus {
    Scheduled,
    Completed,
    NoHiring,
}

impl DriveStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            DriveStatus::Scheduled => "SCHEDULED",
            DriveStatus::Completed => "COMPLETED",
            DriveStatus::NoHiring => "NO_HIRING",
        }
    }
}

impl FromStr for DriveStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(DriveStatus::Scheduled),
            "COMPLETED" => Ok(DriveStatus::Completed),
            "NO_HIRING" => Ok(DriveStatus::NoHiring),
            _ => Err(UnknownStatus(value.to_string())),
        }
    }
}

/// Recruitment drive attached to a company. Persisted in its own table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveDetails {
    pub status: DriveStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub number_of_offers: u32,
    #[serde(default)]
    pub number_hired: u32,
    #[serde(default)]
    pub roles_offered: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_cgpa: Option<f64>,
    #[serde(default)]
    pub eligible_branches: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl DriveDetails {
    pub fn new(status: DriveStatus) -> Self {
        Self {
            status,
            scheduled_date: None,
            number_of_offers: 0,
            number_hired: 0,
            roles_offered: Vec::new(),
            min_cgpa: None,
            eligible_branches: Vec::new(),
            notes: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ApprovalStatus::Pending),
            "APPROVED" => Ok(ApprovalStatus::Approved),
            "REJECTED" => Ok(ApprovalStatus::Rejected),
            _ => Err(UnknownStatus(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

/// Caller supplied field set used to build or revise a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyDraft {
    pub name: String,
    pub location: String,
    pub target_branch: String,
    pub packages: Vec<f64>,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub last_contacted: bool,
    #[serde(default)]
    pub follow_up: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hr: HrContact,
    #[serde(default)]
    pub profile: CompanyProfile,
    #[serde(default)]
    pub drive: Option<DriveDetails>,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Constraint violated while building a company.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("company name cannot be empty")]
    EmptyName,
    #[error("target branch cannot be empty")]
    EmptyTargetBranch,
    #[error("location cannot be empty")]
    EmptyLocation,
    #[error("packages cannot be empty")]
    NoPackages,
    #[error("package {0} is not a finite, non-negative figure")]
    InvalidPackage(f64),
}

/// Company aggregate: descriptive attributes, nested contact/profile/drive,
/// and the approval workflow metadata.
///
/// Workflow fields are only writable through the methods below so the
/// approval state machine cannot be bypassed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Company {
    pub(crate) id: Option<CompanyId>,
    pub name: String,
    pub location: String,
    pub target_branch: String,
    pub packages: Vec<f64>,
    pub remarks: String,
    pub last_contacted: bool,
    pub follow_up: Option<DateTime<Utc>>,
    pub hr: HrContact,
    pub profile: CompanyProfile,
    pub(crate) drive: Option<DriveDetails>,
    pub(crate) assigned_officer: Option<OfficerId>,
    pub(crate) created_by: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) is_data_validated: bool,
    pub(crate) approval_status: ApprovalStatus,
    pub(crate) approval_notes: String,
    /// `updated_at` as last read from the store. Writes are conditional on it.
    #[serde(skip)]
    pub(crate) revision: Option<DateTime<Utc>>,
}

impl Company {
    pub fn new(draft: CompanyDraft) -> Result<Self, ValidationError> {
        validate(&draft)?;

        let now = Utc::now();
        Ok(Self {
            id: None,
            name: draft.name,
            location: draft.location,
            target_branch: draft.target_branch,
            packages: draft.packages,
            remarks: draft.remarks,
            last_contacted: draft.last_contacted,
            follow_up: draft.follow_up,
            hr: draft.hr,
            profile: draft.profile,
            drive: draft.drive,
            assigned_officer: None,
            created_by: draft.created_by,
            created_at: now,
            updated_at: now,
            is_data_validated: false,
            approval_status: ApprovalStatus::Pending,
            approval_notes: String::new(),
            revision: None,
        })
    }

    pub fn id(&self) -> Option<&CompanyId> {
        self.id.as_ref()
    }

    pub fn drive(&self) -> Option<&DriveDetails> {
        self.drive.as_ref()
    }

    pub fn assigned_officer(&self) -> Option<&OfficerId> {
        self.assigned_officer.as_ref()
    }

    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_data_validated(&self) -> bool {
        self.is_data_validated
    }

    pub fn approval_status(&self) -> ApprovalStatus {
        self.approval_status
    }

    pub fn approval_notes(&self) -> &str {
        &self.approval_notes
    }

    #[cfg(test)]
    pub(crate) fn with_id(mut self, id: CompanyId) -> Self {
        self.id = Some(id);
        self
    }

    /// Marks the aggregate as a fresh read of the stored row.
    pub(crate) fn loaded(mut self) -> Self {
        self.revision = Some(self.updated_at);
        self
    }

    pub fn mark_data_validated(&mut self) {
        self.is_data_validated = true;
        self.touch();
    }

    pub fn assign_officer(&mut self, officer: OfficerId) {
        self.assigned_officer = Some(officer);
        self.touch();
    }

    /// Replaces the drive. Approval only covers the drive it was granted
    /// against, so the company drops back to pending.
    pub fn update_drive(&mut self, details: DriveDetails) {
        self.drive = Some(details);
        self.approval_status = ApprovalStatus::Pending;
        self.touch();
    }

    pub fn set_approval(&mut self, status: ApprovalStatus, notes: impl Into<String>) {
        self.approval_status = status;
        self.approval_notes = notes.into();
        self.touch();
    }

    /// Replaces the descriptive attributes from a draft. A draft drive that
    /// differs from the stored one goes through [`Company::update_drive`].
    pub fn revise(&mut self, draft: CompanyDraft) -> Result<(), ValidationError> {
        validate(&draft)?;

        self.name = draft.name;
        self.location = draft.location;
        self.target_branch = draft.target_branch;
        self.packages = draft.packages;
        self.remarks = draft.remarks;
        self.last_contacted = draft.last_contacted;
        self.follow_up = draft.follow_up;
        self.hr = draft.hr;
        self.profile = draft.profile;

        match draft.drive {
            Some(details) if self.drive.as_ref() != Some(&details) => self.update_drive(details),
            _ => self.touch(),
        }

        Ok(())
    }

    fn touch(&mut self) {
        let now = Utc::now();
        // Strictly increasing so every write moves the stored revision.
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::nanoseconds(1)
        };
    }
}

fn validate(draft: &CompanyDraft) -> Result<(), ValidationError> {
    if draft.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if draft.target_branch.trim().is_empty() {
        return Err(ValidationError::EmptyTargetBranch);
    }
    if draft.location.trim().is_empty() {
        return Err(ValidationError::EmptyLocation);
    }
    if draft.packages.is_empty() {
        return Err(ValidationError::NoPackages);
    }
    if let Some(&package) = draft
        .packages
        .iter()
        .find(|package| !package.is_finite() || **package < 0.0)
    {
        return Err(ValidationError::InvalidPackage(package));
    }
    Ok(())
}
