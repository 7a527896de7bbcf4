//! # CSV import and export of member accounts
//!
//! One row per member. Scalar profile fields map to a column of the same name; list
//! fields become `<field>_<i>` and contacts `company_contacts_<i>_<subfield>`, with
//! `i` counting from 0 and the width set by the largest value in the export.
//!
//! Imports run in two passes. Every row is checked first; any problem rejects the whole
//! file with no writes. Rows are then applied one at a time, upserting by login. A store
//! failure part way stops the remaining rows and the report names how many were applied.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use chrono::NaiveDate;
use store::{
    Cardinality, Contact, FieldValue, MemberAccount, MemberRepository, MemberStatus, MemberStore,
    NewAccount, Notice, PortalOptions, Profile,
};

use crate::auth::{hash_password, random_password};
use crate::error::{PortalError, Result};

pub const REQUIRED_COLUMNS: [&str; 7] = [
    "login",
    "company_name",
    "company_email",
    "member_status",
    "member_type",
    "member_date_joined",
    "member_expiry",
];

const ACCOUNT_COLUMNS: [&str; 3] = ["login", "email", "member_type"];
const IMPORT_PASSWORD_LEN: usize = 16;

fn list_column(key: &str, index: usize) -> String {
    format!("{}_{}", key, index)
}

fn contact_column(key: &str, index: usize, field: &str) -> String {
    format!("{}_{}_{}", key, index, field)
}

fn list_len(profile: &Profile, key: &str) -> usize {
    match profile.value(key) {
        Some(FieldValue::List(items)) => items.len(),
        Some(FieldValue::Rows(rows)) => rows.len(),
        _ => 0,
    }
}

fn member_type_name(account: &MemberAccount, options: &PortalOptions) -> String {
    let slug = account.member_role().unwrap_or_default();
    options
        .member_type_by_slug(slug)
        .map(|t| t.name)
        .unwrap_or_else(|| slug.to_string())
}

/// Export every member account as CSV text.
pub async fn export_members<S: MemberStore>(repo: &MemberRepository<S>) -> Result<String> {
    let options = repo.options().await?;
    let members = repo.members().await?;

    let widths: HashMap<&str, usize> = Profile::KEYS
        .iter()
        .filter(|(_, c)| *c != Cardinality::Scalar)
        .map(|(key, _)| {
            let width = members
                .iter()
                .map(|m| list_len(&m.profile, key))
                .max()
                .unwrap_or(0);
            (*key, width)
        })
        .collect();
    let width = |key: &str| widths.get(key).copied().unwrap_or(0);

    let mut header: Vec<String> = ACCOUNT_COLUMNS.iter().map(|c| c.to_string()).collect();
    for (key, cardinality) in Profile::KEYS {
        match cardinality {
            Cardinality::Scalar => header.push(key.to_string()),
            Cardinality::List => header.extend((0..width(key)).map(|i| list_column(key, i))),
            Cardinality::Rows => header.extend((0..width(key)).flat_map(|i| {
                Contact::FIELDS
                    .iter()
                    .map(move |field| contact_column(key, i, field))
            })),
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;
    for member in &members {
        let mut row = vec![
            member.login.clone(),
            member.email.clone(),
            member_type_name(member, &options),
        ];
        for (key, cardinality) in Profile::KEYS {
            let value = member.profile.value(key);
            match (cardinality, value) {
                (Cardinality::Scalar, Some(FieldValue::Text(text))) => row.push(text),
                (Cardinality::List, Some(FieldValue::List(items))) => {
                    row.extend((0..width(key)).map(|i| items.get(i).cloned().unwrap_or_default()))
                }
                (Cardinality::Rows, Some(FieldValue::Rows(rows))) => {
                    for i in 0..width(key) {
                        row.extend(Contact::FIELDS.iter().map(|field| {
                            rows.get(i)
                                .and_then(|r| r.get(*field))
                                .cloned()
                                .unwrap_or_default()
                        }));
                    }
                }
                _ => row.push(String::new()),
            }
        }
        writer.write_record(&row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PortalError::Csv(e.into_error().into()))?;
    tracing::info!(members = members.len(), "members exported");
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Counts from a completed import.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
}

impl ImportReport {
    pub fn applied(&self) -> usize {
        self.created + self.updated
    }
}

struct Row {
    line: usize,
    cells: HashMap<String, String>,
}

impl Row {
    fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(|s| s.trim()).unwrap_or_default()
    }

    fn has(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }
}

fn read_rows<R: Read>(reader: R) -> std::result::Result<Vec<Row>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);
    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let cells = header
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(Row { line: i + 2, cells });
    }
    Ok(rows)
}

fn check_date(row: &Row, column: &str, problems: &mut Vec<String>) {
    let value = row.get(column);
    if !value.is_empty() && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
        problems.push(format!(
            "Row {}: {} must be a date like 2026-01-31.",
            row.line, column
        ));
    }
}

/// Every problem in the file, in row order. Empty means the batch may be applied.
fn preflight(rows: &[Row], options: &PortalOptions) -> Vec<String> {
    let mut problems = Vec::new();
    for row in rows {
        for column in REQUIRED_COLUMNS {
            if row.get(column).is_empty() {
                problems.push(format!("Row {}: {} is required.", row.line, column));
            }
        }
        let member_type = row.get("member_type");
        if !member_type.is_empty() && options.member_type_by_name(member_type).is_none() {
            problems.push(format!(
                "Row {}: unknown member type \"{}\".",
                row.line, member_type
            ));
        }
        let status = row.get("member_status");
        if !status.is_empty() && MemberStatus::parse(status).is_none() {
            problems.push(format!(
                "Row {}: member_status must be active or inactive.",
                row.line
            ));
        }
        check_date(row, "member_date_joined", &mut problems);
        check_date(row, "member_expiry", &mut problems);
        let year = row.get("company_year_founded");
        if !year.is_empty() && year.parse::<i32>().is_err() {
            problems.push(format!(
                "Row {}: company_year_founded must be a year like 1998.",
                row.line
            ));
        }
        let employees = row.get("company_num_employees");
        if !employees.is_empty() && employees.parse::<u32>().is_err() {
            problems.push(format!(
                "Row {}: company_num_employees must be a whole number.",
                row.line
            ));
        }
    }
    problems
}

/// Overwrite the profile fields present as columns.
fn apply_profile(row: &Row, profile: &mut Profile) -> store::repo::Result<()> {
    for (key, cardinality) in Profile::KEYS {
        match cardinality {
            Cardinality::Scalar if row.has(key) => {
                profile.set_value(key, FieldValue::text(row.get(key)))?
            }
            Cardinality::Scalar => {}
            Cardinality::List => {
                let items: Vec<String> = (0..)
                    .map(|i| list_column(key, i))
                    .take_while(|column| row.has(column))
                    .map(|column| row.get(&column).to_string())
                    .collect();
                if !items.is_empty() {
                    profile.set_value(key, FieldValue::List(items))?;
                }
            }
            Cardinality::Rows => {
                let rows: Vec<BTreeMap<String, String>> = (0..)
                    .take_while(|i| {
                        Contact::FIELDS
                            .iter()
                            .any(|field| row.has(&contact_column(key, *i, field)))
                    })
                    .map(|i| {
                        Contact::FIELDS
                            .iter()
                            .map(|field| {
                                (
                                    field.to_string(),
                                    row.get(&contact_column(key, i, field)).to_string(),
                                )
                            })
                            .collect()
                    })
                    .collect();
                if !rows.is_empty() {
                    profile.set_value(key, FieldValue::Rows(rows))?;
                }
            }
        }
    }
    Ok(())
}

async fn apply_row<S: MemberStore>(
    repo: &MemberRepository<S>,
    options: &PortalOptions,
    row: &Row,
) -> Result<bool> {
    let login = row.get("login");
    let email = match row.get("email") {
        "" => row.get("company_email"),
        email => email,
    };
    let slug = options
        .member_type_by_name(row.get("member_type"))
        .map(|t| t.role_slug())
        .ok_or_else(|| PortalError::EntityMutation(format!("unknown member type for {}", login)))?;

    match repo.store().account_by_login(login).await? {
        Some(mut account) => {
            let mut profile = account.profile.clone();
            apply_profile(row, &mut profile)?;
            account.email = email.to_string();
            account.display_name = profile.company_name.clone();
            account.profile = profile;
            repo.assign_member_role(&mut account, &slug).await?;
            Ok(false)
        }
        None => {
            let mut profile = Profile::default();
            apply_profile(row, &mut profile)?;
            repo.store()
                .insert_account(NewAccount {
                    login: login.to_string(),
                    email: email.to_string(),
                    password_hash: hash_password(&random_password(IMPORT_PASSWORD_LEN))?,
                    display_name: profile.company_name.clone(),
                    roles: [slug].into_iter().collect(),
                    hide_admin_bar: true,
                    profile,
                })
                .await?;
            Ok(true)
        }
    }
}

/// Import members from CSV. Success and failure are also queued as admin notices.
pub async fn import_members<S: MemberStore, R: Read>(
    repo: &MemberRepository<S>,
    reader: R,
) -> Result<ImportReport> {
    let options = repo.options().await?;
    let rejected = |messages: Vec<String>, applied: usize| PortalError::ImportBatch { messages, applied };

    let rows = match read_rows(reader) {
        Ok(rows) => rows,
        Err(e) => {
            let message = format!("The file could not be read as CSV: {}", e);
            repo.store().push_notice(Notice::error(message.clone())).await?;
            return Err(rejected(vec![message], 0));
        }
    };

    let problems = preflight(&rows, &options);
    if !problems.is_empty() {
        tracing::warn!(problems = problems.len(), "member import rejected");
        repo.store()
            .push_notice(Notice::error(format!(
                "No members were imported. {}",
                problems.join(" ")
            )))
            .await?;
        return Err(rejected(problems, 0));
    }

    let mut report = ImportReport::default();
    for row in &rows {
        match apply_row(repo, &options, row).await {
            Ok(true) => report.created += 1,
            Ok(false) => report.updated += 1,
            Err(e) => {
                let applied = report.applied();
                tracing::error!(line = row.line, applied, error = %e, "member import stopped");
                let message = format!(
                    "Row {}: {}. {} earlier row(s) were imported; later rows were skipped.",
                    row.line,
                    e,
                    applied
                );
                repo.store().push_notice(Notice::error(message.clone())).await?;
                return Err(rejected(vec![message], applied));
            }
        }
    }

    tracing::info!(created = report.created, updated = report.updated, "members imported");
    repo.store()
        .push_notice(Notice::success(format!(
            "Imported {} member(s): {} new, {} updated.",
            report.applied(),
            report.created,
            report.updated
        )))
        .await?;
    Ok(report)
}
