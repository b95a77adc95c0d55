//! CSV lead import: parse, map columns, validate and dedupe.
//!
//! This module is pure. Persisting the resulting [`ImportPreview`] into the
//! holding table and fanning confirmed rows out into leads, accounts and
//! contacts is done by the API service layer.

use crate::i18n::{translate, translate_with, Locale};
use crate::{ImportError, StagedRowStatus};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Maximum length of any single imported field.
pub const MAX_FIELD_LEN: usize = 255;

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex"));

/// Whether `email` looks like an address (`local@domain.tld`).
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Canonical form used for duplicate detection.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Lead fields a CSV column can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum LeadField {
    FirstName,
    LastName,
    /// A single "name" column, split into first/last on import
    FullName,
    Email,
    Phone,
    Company,
    Title,
    Source,
}

impl LeadField {
    fn label_key(&self) -> &'static str {
        match self {
            LeadField::FirstName => "field.first_name",
            LeadField::LastName | LeadField::FullName => "field.last_name",
            LeadField::Email => "field.email",
            LeadField::Phone => "field.phone",
            LeadField::Company => "field.company",
            LeadField::Title => "field.title",
            LeadField::Source => "field.source",
        }
    }
}

// Most specific first: "Company Name" must hit Company before the bare
// "name" rule, and "Job Title" must not fall through to FullName.
const COLUMN_RULES: &[(&[&str], LeadField)] = &[
    (&["first", "given", "forename"], LeadField::FirstName),
    (&["last", "surname", "family"], LeadField::LastName),
    (&["mail"], LeadField::Email),
    (&["phone", "tel", "mobile", "cell"], LeadField::Phone),
    (&["company", "organi", "account", "business", "employer"], LeadField::Company),
    (&["title", "position", "job", "role"], LeadField::Title),
    (&["source", "channel", "campaign"], LeadField::Source),
    (&["name"], LeadField::FullName),
];

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Classify one header by substring match.
pub fn classify_header(header: &str) -> Option<LeadField> {
    let normalized = normalize_header(header);
    if normalized.is_empty() {
        return None;
    }
    COLUMN_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| normalized.contains(n)))
        .map(|(_, field)| *field)
}

/// Mapping from CSV column positions to lead fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: HashMap<LeadField, usize>,
    unmapped: Vec<String>,
}

impl ColumnMapping {
    /// Infer the mapping from a header row. The first column matching a field
    /// wins; later matches are reported as unmapped. A full-name column is
    /// only used when neither a first- nor a last-name column exists.
    pub fn infer(headers: &[String]) -> Self {
        let mut mapping = ColumnMapping::default();
        for (idx, header) in headers.iter().enumerate() {
            match classify_header(header) {
                Some(field) if !mapping.columns.contains_key(&field) => {
                    mapping.columns.insert(field, idx);
                }
                _ => mapping.unmapped.push(header.clone()),
            }
        }

        let has_split_name = mapping.columns.contains_key(&LeadField::FirstName)
            || mapping.columns.contains_key(&LeadField::LastName);
        if has_split_name {
            if let Some(idx) = mapping.columns.remove(&LeadField::FullName) {
                mapping.unmapped.push(headers[idx].clone());
            }
        }
        mapping
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, field: LeadField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn unmapped(&self) -> &[String] {
        &self.unmapped
    }

    /// Pull a [`LeadRecord`] out of one CSV row.
    pub fn extract(&self, row: &csv::StringRecord) -> LeadRecord {
        let get = |field: LeadField| -> Option<String> {
            self.column(field)
                .and_then(|idx| row.get(idx))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let (mut first_name, mut last_name) = (get(LeadField::FirstName), get(LeadField::LastName));
        if let Some(full) = get(LeadField::FullName) {
            let (first, last) = split_full_name(&full);
            first_name = first;
            last_name = Some(last);
        }

        LeadRecord {
            first_name,
            last_name,
            email: get(LeadField::Email).map(|e| normalize_email(&e)),
            phone: get(LeadField::Phone),
            company: get(LeadField::Company),
            title: get(LeadField::Title),
            source: get(LeadField::Source),
        }
    }
}

/// Split "Ada King Lovelace" into ("Ada King", "Lovelace").
fn split_full_name(full: &str) -> (Option<String>, String) {
    let full = full.split_whitespace().collect::<Vec<_>>().join(" ");
    match full.rsplit_once(' ') {
        Some((first, last)) => (Some(first.to_string()), last.to_string()),
        None => (None, full),
    }
}

/// Lead fields extracted from one CSV row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LeadRecord {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub source: Option<String>,
}

impl LeadRecord {
    fn fields(&self) -> [(LeadField, Option<&str>); 7] {
        [
            (LeadField::FirstName, self.first_name.as_deref()),
            (LeadField::LastName, self.last_name.as_deref()),
            (LeadField::Email, self.email.as_deref()),
            (LeadField::Phone, self.phone.as_deref()),
            (LeadField::Company, self.company.as_deref()),
            (LeadField::Title, self.title.as_deref()),
            (LeadField::Source, self.source.as_deref()),
        ]
    }
}

/// Why a row was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowIssue {
    Required { field: LeadField },
    InvalidEmail { value: String },
    TooLong { field: LeadField, max: usize },
    DuplicateExisting { email: String },
    DuplicateInFile { email: String, first_row: i32 },
}

impl RowIssue {
    /// Render the issue in the uploader's language.
    pub fn render(&self, locale: Locale) -> String {
        match self {
            RowIssue::Required { field } => translate_with(
                locale,
                "import.error.required",
                &[("field", translate(locale, field.label_key()))],
            ),
            RowIssue::InvalidEmail { value } => translate_with(
                locale,
                "import.error.invalid_email",
                &[("value", value.as_str())],
            ),
            RowIssue::TooLong { field, max } => {
                let max = max.to_string();
                translate_with(
                    locale,
                    "import.error.too_long",
                    &[
                        ("field", translate(locale, field.label_key())),
                        ("max", max.as_str()),
                    ],
                )
            }
            RowIssue::DuplicateExisting { email } => translate_with(
                locale,
                "import.error.duplicate_existing",
                &[("value", email.as_str())],
            ),
            RowIssue::DuplicateInFile { email, first_row } => {
                let row = first_row.to_string();
                translate_with(
                    locale,
                    "import.error.duplicate_in_file",
                    &[("value", email.as_str()), ("row", row.as_str())],
                )
            }
        }
    }

    fn is_duplicate(&self) -> bool {
        matches!(
            self,
            RowIssue::DuplicateExisting { .. } | RowIssue::DuplicateInFile { .. }
        )
    }
}

/// Check required fields, email format and field lengths.
pub fn validate_record(record: &LeadRecord) -> Vec<RowIssue> {
    let mut issues = Vec::new();
    if record.last_name.is_none() {
        issues.push(RowIssue::Required {
            field: LeadField::LastName,
        });
    }
    match record.email.as_deref() {
        None => issues.push(RowIssue::Required {
            field: LeadField::Email,
        }),
        Some(email) if !is_valid_email(email) => issues.push(RowIssue::InvalidEmail {
            value: email.to_string(),
        }),
        Some(_) => {}
    }
    for (field, value) in record.fields() {
        if value.is_some_and(|v| v.chars().count() > MAX_FIELD_LEN) {
            issues.push(RowIssue::TooLong {
                field,
                max: MAX_FIELD_LEN,
            });
        }
    }
    issues
}

/// Size limits applied before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportLimits {
    pub max_rows: usize,
    pub max_bytes: usize,
}

impl Default for ImportLimits {
    fn default() -> Self {
        Self {
            max_rows: 5_000,
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Header plus non-blank data rows.
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    /// (source line number, record)
    pub rows: Vec<(i32, csv::StringRecord)>,
}

/// Parse CSV text. Quoted fields are honoured, short rows are allowed and
/// rows with only blank cells are skipped.
pub fn parse_csv(text: &str, limits: &ImportLimits) -> Result<ParsedCsv, ImportError> {
    if text.len() > limits.max_bytes {
        return Err(ImportError::TooLarge {
            max_bytes: limits.max_bytes,
        });
    }
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err(ImportError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| malformed(&e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| malformed(&e))?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        if rows.len() == limits.max_rows {
            return Err(ImportError::TooManyRows {
                max: limits.max_rows,
            });
        }
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(rows.len() as u64 + 2);
        rows.push((i32::try_from(line).unwrap_or(i32::MAX), record));
    }

    if rows.is_empty() {
        return Err(ImportError::EmptyFile);
    }
    Ok(ParsedCsv { headers, rows })
}

fn malformed(err: &csv::Error) -> ImportError {
    ImportError::Malformed {
        line: err.position().map(|p| p.line()).unwrap_or(0),
        reason: err.to_string(),
    }
}

/// One row ready for the holding table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRow {
    pub row_number: i32,
    pub record: LeadRecord,
    pub status: StagedRowStatus,
    pub issues: Vec<RowIssue>,
}

/// Outcome of preparing an import, before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPreview {
    pub headers: Vec<String>,
    pub unmapped_columns: Vec<String>,
    pub rows: Vec<StagedRow>,
}

impl ImportPreview {
    pub fn count(&self, status: StagedRowStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }
}

/// Parse, map, validate and dedupe a CSV file.
///
/// `existing_emails` must hold [`normalize_email`]-ed addresses already
/// present on leads in the tenant. Within the file the first valid row
/// carrying an address claims it; later rows with the same address are
/// duplicates.
pub fn prepare_import(
    text: &str,
    limits: &ImportLimits,
    existing_emails: &HashSet<String>,
) -> Result<ImportPreview, ImportError> {
    let parsed = parse_csv(text, limits)?;
    let mapping = ColumnMapping::infer(&parsed.headers);
    if mapping.is_empty() {
        return Err(ImportError::NoMappableColumns {
            headers: parsed.headers,
        });
    }

    let mut claimed: HashMap<String, i32> = HashMap::new();
    let rows = parsed
        .rows
        .iter()
        .map(|(row_number, raw)| {
            let record = mapping.extract(raw);
            let mut issues = validate_record(&record);
            if issues.is_empty() {
                if let Some(email) = record.email.as_deref() {
                    if existing_emails.contains(email) {
                        issues.push(RowIssue::DuplicateExisting {
                            email: email.to_string(),
                        });
                    } else if let Some(first_row) = claimed.get(email) {
                        issues.push(RowIssue::DuplicateInFile {
                            email: email.to_string(),
                            first_row: *first_row,
                        });
                    } else {
                        claimed.insert(email.to_string(), *row_number);
                    }
                }
            }

            let status = if issues.is_empty() {
                StagedRowStatus::Valid
            } else if issues.iter().all(RowIssue::is_duplicate) {
                StagedRowStatus::Duplicate
            } else {
                StagedRowStatus::Invalid
            };
            StagedRow {
                row_number: *row_number,
                record,
                status,
                issues,
            }
        })
        .collect();

    Ok(ImportPreview {
        headers: parsed.headers,
        unmapped_columns: mapping.unmapped().to_vec(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_classify_prefers_specific_rules() {
        assert_eq!(classify_header("Company Name"), Some(LeadField::Company));
        assert_eq!(classify_header("First Name"), Some(LeadField::FirstName));
        assert_eq!(classify_header("E-mail Address"), Some(LeadField::Email));
        assert_eq!(classify_header("Job Title"), Some(LeadField::Title));
        assert_eq!(classify_header("Mobile #"), Some(LeadField::Phone));
        assert_eq!(classify_header("Lead Source"), Some(LeadField::Source));
        assert_eq!(classify_header("Name"), Some(LeadField::FullName));
        assert_eq!(classify_header("Favourite colour"), None);
        assert_eq!(classify_header("  "), None);
    }

    #[test]
    fn test_first_matching_column_wins() {
        let mapping = ColumnMapping::infer(&headers(&["Email", "Work Email", "Last"]));
        assert_eq!(mapping.column(LeadField::Email), Some(0));
        assert_eq!(mapping.unmapped(), &["Work Email".to_string()]);
    }

    #[test]
    fn test_full_name_ignored_when_split_columns_exist() {
        let mapping = ColumnMapping::infer(&headers(&["Name", "Last Name", "Email"]));
        assert_eq!(mapping.column(LeadField::FullName), None);
        assert_eq!(mapping.column(LeadField::LastName), Some(1));
        assert_eq!(mapping.unmapped(), &["Name".to_string()]);
    }

    #[test]
    fn test_full_name_is_split_on_last_space() {
        assert_eq!(
            split_full_name("Ada  King Lovelace"),
            (Some("Ada King".to_string()), "Lovelace".to_string())
        );
        assert_eq!(split_full_name("Cher"), (None, "Cher".to_string()));
    }

    #[test]
    fn test_validate_requires_last_name_and_email() {
        let issues = validate_record(&LeadRecord::default());
        assert_eq!(
            issues,
            vec![
                RowIssue::Required {
                    field: LeadField::LastName
                },
                RowIssue::Required {
                    field: LeadField::Email
                },
            ]
        );
    }

    #[test]
    fn test_email_regex() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+tag@sub.example.co"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada example@x.com"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn test_overlong_field_is_rejected() {
        let record = LeadRecord {
            last_name: Some("x".repeat(MAX_FIELD_LEN + 1)),
            email: Some("a@b.co".to_string()),
            ..LeadRecord::default()
        };
        assert_eq!(
            validate_record(&record),
            vec![RowIssue::TooLong {
                field: LeadField::LastName,
                max: MAX_FIELD_LEN
            }]
        );
    }

    #[test]
    fn test_parse_handles_quotes_bom_and_blank_rows() {
        let text = "\u{feff}Name,Email,Company\n\"Lovelace, Ada\",ada@x.io,\"Analytical, Ltd\"\n,,\n\nGrace Hopper,grace@x.io\n";
        let parsed = parse_csv(text, &ImportLimits::default()).unwrap();
        assert_eq!(parsed.headers, headers(&["Name", "Email", "Company"]));
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].1.get(2), Some("Analytical, Ltd"));
        assert_eq!(parsed.rows[1].1.len(), 2);
    }

    #[test]
    fn test_parse_rejects_empty_and_oversized_input() {
        let limits = ImportLimits {
            max_rows: 1,
            max_bytes: 64,
        };
        assert_eq!(parse_csv("  \n", &limits).unwrap_err(), ImportError::EmptyFile);
        assert_eq!(parse_csv("Email\n", &limits).unwrap_err(), ImportError::EmptyFile);
        assert_eq!(
            parse_csv("Email\na@b.co\nc@d.co\n", &limits).unwrap_err(),
            ImportError::TooManyRows { max: 1 }
        );
        assert_eq!(
            parse_csv(&"x".repeat(65), &limits).unwrap_err(),
            ImportError::TooLarge { max_bytes: 64 }
        );
    }

    #[test]
    fn test_prepare_import_dedupes_against_existing_and_in_file() {
        let text = "First,Last,Email\n\
                    Ada,Lovelace,ADA@x.io\n\
                    Grace,Hopper,grace@x.io\n\
                    Alan,Turing,not-an-email\n\
                    Grace,Again, Grace@X.io \n";
        let existing: HashSet<String> = ["ada@x.io".to_string()].into_iter().collect();

        let preview = prepare_import(text, &ImportLimits::default(), &existing).unwrap();
        let statuses: Vec<_> = preview.rows.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                StagedRowStatus::Duplicate,
                StagedRowStatus::Valid,
                StagedRowStatus::Invalid,
                StagedRowStatus::Duplicate,
            ]
        );
        assert_eq!(
            preview.rows[3].issues,
            vec![RowIssue::DuplicateInFile {
                email: "grace@x.io".to_string(),
                first_row: 3
            }]
        );
        assert_eq!(preview.count(StagedRowStatus::Valid), 1);
    }

    #[test]
    fn test_invalid_first_occurrence_does_not_claim_email() {
        let text = "Last,Email\n,dup@x.io\nHopper,dup@x.io\n";
        let preview = prepare_import(text, &ImportLimits::default(), &HashSet::new()).unwrap();
        assert_eq!(preview.rows[0].status, StagedRowStatus::Invalid);
        assert_eq!(preview.rows[1].status, StagedRowStatus::Valid);
    }

    #[test]
    fn test_prepare_import_requires_a_mappable_column() {
        let err = prepare_import("Colour,Size\nred,XL\n", &ImportLimits::default(), &HashSet::new())
            .unwrap_err();
        assert_eq!(
            err,
            ImportError::NoMappableColumns {
                headers: headers(&["Colour", "Size"])
            }
        );
    }

    #[test]
    fn test_issue_rendering_is_localized() {
        let issue = RowIssue::Required {
            field: LeadField::Email,
        };
        assert_eq!(issue.render(Locale::En), "Email is required");
        assert_eq!(issue.render(Locale::De), "E-Mail ist erforderlich");
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_normalize_email_is_idempotent(
            raw in "[ \t]{0,2}[A-Za-z0-9._]{1,12}@[A-Za-z]{1,8}\\.[a-z]{2,4}[ ]{0,2}"
        ) {
            let once = normalize_email(&raw);
            prop_assert_eq!(normalize_email(&once), once.clone());
            prop_assert!(is_valid_email(&once));
        }

        #[test]
        fn prop_valid_rows_have_distinct_emails(
            picks in prop::collection::vec((0usize..4, any::<bool>()), 1..20),
        ) {
            let pool = ["a@x.io", "b@x.io", "C@X.io", "c@x.io"];
            let mut text = String::from("Last Name,Email\n");
            for (i, (pick, blank_name)) in picks.iter().enumerate() {
                let last = if *blank_name { String::new() } else { format!("Row{}", i) };
                text.push_str(&format!("{},{}\n", last, pool[*pick]));
            }
            let existing: HashSet<String> = ["b@x.io".to_string()].into_iter().collect();

            let preview = prepare_import(&text, &ImportLimits::default(), &existing).unwrap();
            let mut seen = HashSet::new();
            for row in preview.rows.iter().filter(|r| r.status == StagedRowStatus::Valid) {
                let email = row.record.email.clone().unwrap();
                prop_assert!(!existing.contains(&email));
                prop_assert!(seen.insert(email));
            }

            let total = preview.count(StagedRowStatus::Valid)
                + preview.count(StagedRowStatus::Invalid)
                + preview.count(StagedRowStatus::Duplicate);
            prop_assert_eq!(total, preview.rows.len());
            prop_assert_eq!(preview.rows.len(), picks.len());
        }
    }
}
