use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::domain::{CompanyDraft, CompanyProfile, DriveDetails, DriveStatus, HrContact};

#[derive(Debug)]
pub enum CompanyImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidPackage { line: u64, value: String },
    InvalidDriveStatus { line: u64, value: String },
}

impl std::fmt::Display for CompanyImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompanyImportError::Io(err) => write!(f, "failed to read company sheet: {}", err),
            CompanyImportError::Csv(err) => write!(f, "invalid company CSV data: {}", err),
            CompanyImportError::InvalidPackage { line, value } => {
                write!(f, "line {}: package '{}' is not a finite number", line, value)
            }
            CompanyImportError::InvalidDriveStatus { line, value } => {
                write!(f, "line {}: unknown drive status '{}'", line, value)
            }
        }
    }
}

impl std::error::Error for CompanyImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompanyImportError::Io(err) => Some(err),
            CompanyImportError::Csv(err) => Some(err),
            CompanyImportError::InvalidPackage { .. }
            | CompanyImportError::InvalidDriveStatus { .. } => None,
        }
    }
}

impl From<std::io::Error> for CompanyImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for CompanyImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Deserialize)]
struct CompanyRow {
    #[serde(rename = "Company Name")]
    name: String,
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Target Branch")]
    target_branch: String,
    #[serde(rename = "Packages", default)]
    packages: String,
    #[serde(rename = "Remarks", default)]
    remarks: String,
    #[serde(rename = "HR Name", default)]
    hr_name: String,
    #[serde(rename = "HR Email", default)]
    hr_email: String,
    #[serde(rename = "HR Phone", default)]
    hr_phone: String,
    #[serde(rename = "HR Position", default)]
    hr_position: String,
    #[serde(rename = "Website", default)]
    website: String,
    #[serde(rename = "Industry", default)]
    industry: String,
    #[serde(
        rename = "Drive Status",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    drive_status: Option<String>,
    #[serde(
        rename = "Created By",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    created_by: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Reads a company spreadsheet export into drafts for `import_batch`.
///
/// Structural problems (bad CSV, unparseable figures) fail the whole file.
/// Business validation is left to the aggregate so a single bad record does
/// not block the rest of the batch.
pub struct CompanyCsvImporter;

impl CompanyCsvImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<CompanyDraft>, CompanyImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<CompanyDraft>, CompanyImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut drafts = Vec::new();
        for record in csv_reader.deserialize::<CompanyRow>() {
            let row = record?;
            // Header is line 1.
            let line = drafts.len() as u64 + 2;
            drafts.push(row.into_draft(line)?);
        }

        Ok(drafts)
    }
}

impl CompanyRow {
    fn into_draft(self, line: u64) -> Result<CompanyDraft, CompanyImportError> {
        let packages = self
            .packages
            .split(';')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| {
                value
                    .parse::<f64>()
                    .ok()
                    .filter(|figure| figure.is_finite())
                    .ok_or_else(|| CompanyImportError::InvalidPackage {
                        line,
                        value: value.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let drive = match self.drive_status {
            Some(raw) => {
                let status: DriveStatus = raw
                    .parse()
                    .map_err(|_| CompanyImportError::InvalidDriveStatus { line, value: raw })?;
                Some(DriveDetails::new(status))
            }
            None => None,
        };

        Ok(CompanyDraft {
            name: self.name,
            location: self.location,
            target_branch: self.target_branch,
            packages,
            remarks: self.remarks,
            last_contacted: false,
            follow_up: None,
            hr: HrContact {
                name: self.hr_name,
                email: self.hr_email,
                phone: self.hr_phone,
                position: self.hr_position,
                linkedin_url: None,
            },
            profile: CompanyProfile {
                website: self.website,
                industry: self.industry,
                ..CompanyProfile::default()
            },
            drive,
            created_by: self.created_by,
        })
    }
}
