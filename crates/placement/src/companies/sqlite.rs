//! SQLite implementation of [`CompanyRepository`].
//!
//! The aggregate is split across `companies` (flat company, HR and profile
//! columns) and `recruitment_drives` (at most one row per company, enforced by
//! a UNIQUE constraint). List-valued fields are stored as JSON arrays of their
//! fixed element type.
//!
//! Each call opens its own connection; write transactions start `IMMEDIATE`
//! so SQLite serializes concurrent writers before the drive probe runs.
//! Writes of a loaded aggregate only apply while the row still carries the
//! `updated_at` it was read with; otherwise they fail with `Conflict`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::domain::{Company, CompanyId, CompanyProfile, DriveDetails, HrContact, OfficerId};
use super::repository::{AssignmentRecord, CompanyRepository, RepositoryError};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS companies (
    company_id TEXT PRIMARY KEY,
    company_name TEXT NOT NULL,
    location TEXT NOT NULL,
    target_branch TEXT NOT NULL,
    packages TEXT NOT NULL,
    remarks TEXT NOT NULL DEFAULT '',
    last_contacted INTEGER NOT NULL DEFAULT 0,
    follow_up TEXT,
    hr_name TEXT NOT NULL DEFAULT '',
    hr_email TEXT NOT NULL DEFAULT '',
    hr_phone TEXT NOT NULL DEFAULT '',
    hr_position TEXT NOT NULL DEFAULT '',
    hr_linkedin_url TEXT,
    website TEXT NOT NULL DEFAULT '',
    industry TEXT NOT NULL DEFAULT '',
    founded_year INTEGER,
    company_size TEXT,
    description TEXT,
    logo_url TEXT,
    assigned_to TEXT,
    created_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    is_data_validated INTEGER NOT NULL DEFAULT 0,
    approval_status TEXT NOT NULL DEFAULT 'PENDING'
        CHECK (approval_status IN ('PENDING', 'APPROVED', 'REJECTED')),
    approval_notes TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS recruitment_drives (
    drive_id TEXT PRIMARY KEY,
    company_id TEXT NOT NULL UNIQUE REFERENCES companies(company_id),
    status TEXT NOT NULL CHECK (status IN ('SCHEDULED', 'COMPLETED', 'NO_HIRING')),
    scheduled_date TEXT,
    number_of_offers INTEGER NOT NULL DEFAULT 0,
    number_hired INTEGER NOT NULL DEFAULT 0,
    roles_offered TEXT NOT NULL DEFAULT '[]',
    min_cgpa REAL,
    eligible_branches TEXT NOT NULL DEFAULT '[]',
    notes TEXT NOT NULL DEFAULT '',
    created_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS company_assignments (
    assignment_id TEXT PRIMARY KEY,
    company_id TEXT NOT NULL REFERENCES companies(company_id),
    officer_id TEXT NOT NULL,
    assigned_by TEXT NOT NULL,
    assigned_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_companies_hr_email ON companies(hr_email);
CREATE INDEX IF NOT EXISTS idx_companies_assigned_to ON companies(assigned_to);
CREATE INDEX IF NOT EXISTS idx_assignments_company ON company_assignments(company_id);
"#;

const SELECT_COMPANY: &str = r#"
SELECT
    c.company_id, c.company_name, c.location, c.target_branch, c.packages,
    c.remarks, c.last_contacted, c.follow_up, c.hr_name, c.hr_email,
    c.hr_phone, c.hr_position, c.hr_linkedin_url, c.website, c.industry,
    c.founded_year, c.company_size, c.description, c.logo_url, c.assigned_to,
    c.created_by, c.created_at, c.updated_at, c.is_data_validated,
    c.approval_status, c.approval_notes,
    rd.status, rd.scheduled_date, rd.number_of_offers, rd.number_hired,
    rd.roles_offered, rd.min_cgpa, rd.eligible_branches, rd.notes
FROM companies c
LEFT JOIN recruitment_drives rd ON rd.company_id = c.company_id
"#;

const INSERT_DRIVE: &str = r#"
INSERT INTO recruitment_drives (
    drive_id, company_id, status, scheduled_date, number_of_offers,
    number_hired, roles_offered, min_cgpa, eligible_branches, notes,
    created_by, created_at, updated_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
"#;

pub struct SqliteCompanyRepository {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteCompanyRepository {
    /// Opens (creating if needed) the database at `path` and applies the schema.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let repository = Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        };
        repository.initialize()?;
        Ok(repository)
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn initialize(&self) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = self.connect()?;
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %self.path.display(), %journal_mode, "company store ready");
        Ok(())
    }

    fn connect(&self) -> Result<Connection, RepositoryError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    fn query_companies<P: rusqlite::Params>(
        &self,
        filter: &str,
        params: P,
    ) -> Result<Vec<Company>, RepositoryError> {
        let conn = self.connect()?;
        let sql = format!("{SELECT_COMPANY} {filter}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, row_to_company)?;
        let companies = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(companies)
    }
}

impl CompanyRepository for SqliteCompanyRepository {
    fn create(&self, company: &Company) -> Result<CompanyId, RepositoryError> {
        let id = CompanyId(Uuid::new_v4().to_string());
        let packages = encode_list(&company.packages)?;

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            r#"
            INSERT INTO companies (
                company_id, company_name, location, target_branch, packages,
                remarks, last_contacted, follow_up, hr_name, hr_email, hr_phone,
                hr_position, hr_linkedin_url, website, industry, founded_year,
                company_size, description, logo_url, assigned_to, created_by,
                created_at, updated_at, is_data_validated, approval_status,
                approval_notes
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26
            )
            "#,
            params![
                id.0,
                company.name,
                company.location,
                company.target_branch,
                packages,
                company.remarks,
                company.last_contacted,
                company.follow_up,
                company.hr.name,
                company.hr.email,
                company.hr.phone,
                company.hr.position,
                company.hr.linkedin_url,
                company.profile.website,
                company.profile.industry,
                company.profile.founded_year,
                company.profile.size,
                company.profile.description,
                company.profile.logo_url,
                company.assigned_officer.as_ref().map(|officer| &officer.0),
                company.created_by,
                company.created_at,
                company.updated_at,
                company.is_data_validated,
                company.approval_status.as_str(),
                company.approval_notes,
            ],
        )?;

        if let Some(drive) = &company.drive {
            insert_drive(&tx, &id, drive, company)?;
        }

        tx.commit()?;

        info!(
            company_id = %id,
            name = %company.name,
            with_drive = company.drive.is_some(),
            "company created"
        );
        Ok(id)
    }

    fn update(&self, company: &Company) -> Result<(), RepositoryError> {
        let id = company.id.as_ref().ok_or(RepositoryError::NotFound)?;
        let packages = encode_list(&company.packages)?;

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            r#"
            UPDATE companies SET
                company_name = ?1, location = ?2, target_branch = ?3,
                packages = ?4, remarks = ?5, last_contacted = ?6, follow_up = ?7,
                hr_name = ?8, hr_email = ?9, hr_phone = ?10, hr_position = ?11,
                hr_linkedin_url = ?12, website = ?13, industry = ?14,
                founded_year = ?15, company_size = ?16, description = ?17,
                logo_url = ?18, assigned_to = ?19, is_data_validated = ?20,
                approval_status = ?21, approval_notes = ?22, updated_at = ?23
            WHERE company_id = ?24 AND (?25 IS NULL OR updated_at = ?25)
            "#,
            params![
                company.name,
                company.location,
                company.target_branch,
                packages,
                company.remarks,
                company.last_contacted,
                company.follow_up,
                company.hr.name,
                company.hr.email,
                company.hr.phone,
                company.hr.position,
                company.hr.linkedin_url,
                company.profile.website,
                company.profile.industry,
                company.profile.founded_year,
                company.profile.size,
                company.profile.description,
                company.profile.logo_url,
                company.assigned_officer.as_ref().map(|officer| &officer.0),
                company.is_data_validated,
                company.approval_status.as_str(),
                company.approval_notes,
                company.updated_at,
                id.0,
                company.revision,
            ],
        )?;

        if changed == 0 {
            return Err(stale_or_missing(&tx, id)?);
        }

        if let Some(drive) = &company.drive {
            // Probe and branch inside the same transaction.
            let existing: Option<String> = tx
                .query_row(
                    "SELECT drive_id FROM recruitment_drives WHERE company_id = ?1",
                    [&id.0],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                Some(drive_id) => {
                    tx.execute(
                        r#"
                        UPDATE recruitment_drives SET
                            status = ?1, scheduled_date = ?2, number_of_offers = ?3,
                            number_hired = ?4, roles_offered = ?5, min_cgpa = ?6,
                            eligible_branches = ?7, notes = ?8, updated_at = ?9
                        WHERE drive_id = ?10
                        "#,
                        params![
                            drive.status.as_str(),
                            drive.scheduled_date,
                            drive.number_of_offers,
                            drive.number_hired,
                            encode_list(&drive.roles_offered)?,
                            drive.min_cgpa,
                            encode_list(&drive.eligible_branches)?,
                            drive.notes,
                            company.updated_at,
                            drive_id,
                        ],
                    )?;
                    debug!(company_id = %id, %drive_id, "drive updated");
                }
                None => insert_drive(&tx, id, drive, company)?,
            }
        }

        tx.commit()?;
        debug!(company_id = %id, "company updated");
        Ok(())
    }

    fn fetch(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        let conn = self.connect()?;
        let sql = format!("{SELECT_COMPANY} WHERE c.company_id = ?1");
        let company = conn
            .query_row(&sql, [&id.0], row_to_company)
            .optional()?;
        Ok(company)
    }

    fn fetch_by_hr_email(&self, email: &str) -> Result<Option<Company>, RepositoryError> {
        let conn = self.connect()?;
        let sql = format!(
            "{SELECT_COMPANY} WHERE c.hr_email = ?1 ORDER BY c.created_at, c.company_id LIMIT 1"
        );
        let company = conn.query_row(&sql, [email], row_to_company).optional()?;
        Ok(company)
    }

    fn list_by_officer(&self, officer: &OfficerId) -> Result<Vec<Company>, RepositoryError> {
        self.query_companies(
            "WHERE c.assigned_to = ?1 ORDER BY c.created_at, c.company_id",
            [&officer.0],
        )
    }

    fn list_all(&self) -> Result<Vec<Company>, RepositoryError> {
        self.query_companies("ORDER BY c.created_at, c.company_id", [])
    }

    fn record_assignment(
        &self,
        company: &Company,
        assigned_by: &str,
    ) -> Result<AssignmentRecord, RepositoryError> {
        let id = company.id.as_ref().ok_or(RepositoryError::NotFound)?;
        let officer = company.assigned_officer.clone().ok_or_else(|| {
            RepositoryError::Persistence(format!("company {id} has no assigned officer"))
        })?;

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            r#"
            UPDATE companies SET assigned_to = ?1, updated_at = ?2
            WHERE company_id = ?3 AND (?4 IS NULL OR updated_at = ?4)
            "#,
            params![officer.0, company.updated_at, id.0, company.revision],
        )?;
        if changed == 0 {
            return Err(stale_or_missing(&tx, id)?);
        }

        let record = AssignmentRecord {
            assignment_id: Uuid::new_v4().to_string(),
            company_id: id.clone(),
            officer_id: officer,
            assigned_by: assigned_by.to_string(),
            assigned_at: company.updated_at,
        };

        tx.execute(
            r#"
            INSERT INTO company_assignments (
                assignment_id, company_id, officer_id, assigned_by, assigned_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.assignment_id,
                record.company_id.0,
                record.officer_id.0,
                record.assigned_by,
                record.assigned_at,
            ],
        )?;

        tx.commit()?;
        Ok(record)
    }

    fn update_approval(&self, company: &Company) -> Result<(), RepositoryError> {
        let id = company.id.as_ref().ok_or(RepositoryError::NotFound)?;
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            r#"
            UPDATE companies SET approval_status = ?1, approval_notes = ?2, updated_at = ?3
            WHERE company_id = ?4 AND (?5 IS NULL OR updated_at = ?5)
            "#,
            params![
                company.approval_status.as_str(),
                company.approval_notes,
                company.updated_at,
                id.0,
                company.revision,
            ],
        )?;
        if changed == 0 {
            return Err(stale_or_missing(&tx, id)?);
        }
        tx.commit()?;
        Ok(())
    }

    fn assignments(&self, id: &CompanyId) -> Result<Vec<AssignmentRecord>, RepositoryError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT assignment_id, company_id, officer_id, assigned_by, assigned_at
            FROM company_assignments
            WHERE company_id = ?1
            ORDER BY assigned_at, rowid
            "#,
        )?;
        let rows = stmt.query_map([&id.0], |row| {
            Ok(AssignmentRecord {
                assignment_id: row.get(0)?,
                company_id: CompanyId(row.get(1)?),
                officer_id: OfficerId(row.get(2)?),
                assigned_by: row.get(3)?,
                assigned_at: row.get(4)?,
            })
        })?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn insert_drive(
    tx: &Transaction<'_>,
    company_id: &CompanyId,
    drive: &DriveDetails,
    company: &Company,
) -> Result<(), RepositoryError> {
    let drive_id = Uuid::new_v4().to_string();
    tx.execute(
        INSERT_DRIVE,
        params![
            drive_id,
            company_id.0,
            drive.status.as_str(),
            drive.scheduled_date,
            drive.number_of_offers,
            drive.number_hired,
            encode_list(&drive.roles_offered)?,
            drive.min_cgpa,
            encode_list(&drive.eligible_branches)?,
            drive.notes,
            company.created_by,
            company.updated_at,
        ],
    )?;
    debug!(company_id = %company_id, %drive_id, "drive inserted");
    Ok(())
}

/// Explains a conditional write that matched no row.
fn stale_or_missing(
    tx: &Transaction<'_>,
    id: &CompanyId,
) -> Result<RepositoryError, RepositoryError> {
    let exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM companies WHERE company_id = ?1)",
        [&id.0],
        |row| row.get(0),
    )?;
    if exists {
        warn!(company_id = %id, "stale write rejected");
        Ok(RepositoryError::Conflict(format!(
            "company {id} was modified by another request"
        )))
    } else {
        Ok(RepositoryError::NotFound)
    }
}

fn row_to_company(row: &Row<'_>) -> rusqlite::Result<Company> {
    let drive = match row.get::<_, Option<String>>(26)? {
        Some(status) => Some(DriveDetails {
            status: parse_text(26, &status)?,
            scheduled_date: row.get(27)?,
            number_of_offers: row.get(28)?,
            number_hired: row.get(29)?,
            roles_offered: decode_list(30, row.get(30)?)?,
            min_cgpa: row.get(31)?,
            eligible_branches: decode_list(32, row.get(32)?)?,
            notes: row.get(33)?,
        }),
        None => None,
    };

    Ok(Company {
        id: Some(CompanyId(row.get(0)?)),
        name: row.get(1)?,
        location: row.get(2)?,
        target_branch: row.get(3)?,
        packages: decode_list(4, row.get(4)?)?,
        remarks: row.get(5)?,
        last_contacted: row.get(6)?,
        follow_up: row.get(7)?,
        hr: HrContact {
            name: row.get(8)?,
            email: row.get(9)?,
            phone: row.get(10)?,
            position: row.get(11)?,
            linkedin_url: row.get(12)?,
        },
        profile: CompanyProfile {
            website: row.get(13)?,
            industry: row.get(14)?,
            founded_year: row.get(15)?,
            size: row.get(16)?,
            description: row.get(17)?,
            logo_url: row.get(18)?,
        },
        drive,
        assigned_officer: row.get::<_, Option<String>>(19)?.map(OfficerId),
        created_by: row.get(20)?,
        created_at: row.get(21)?,
        updated_at: row.get(22)?,
        is_data_validated: row.get(23)?,
        approval_status: parse_text(24, &row.get::<_, String>(24)?)?,
        approval_notes: row.get(25)?,
        revision: None,
    }
    .loaded())
}

fn encode_list<T: Serialize>(values: &[T]) -> Result<String, RepositoryError> {
    Ok(serde_json::to_string(values)?)
}

fn decode_list<T: DeserializeOwned>(column: usize, raw: String) -> rusqlite::Result<Vec<T>> {
    serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

fn parse_text<T>(column: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => Self::Conflict(err.to_string()),
            _ => Self::Persistence(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(format!("encoding failure: {err}"))
    }
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}
