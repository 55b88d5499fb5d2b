//! Guard roster import from `.xlsx` workbooks.
//!
//! Only sheets whose name carries a company marker are read. In each, the
//! header row is the first row naming both a site column and a name column;
//! every row below it is upserted by phone number. A bad row is counted and
//! reported, never fatal.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
use serde::Serialize;
use tracing::{debug, info, warn};
use training_core::model::{Company, SiteId, normalize_phone};

use crate::error::ImportError;
use crate::guard_service::{GuardService, RosterEntry, UpsertOutcome};
use crate::site_service::SiteService;

const SITE_LABELS: &[&str] = &["현장", "근무지", "site"];
const NAME_LABELS: &[&str] = &["성명", "이름", "name"];
const PHONE_LABELS: &[&str] = &["연락처", "전화", "휴대폰", "phone", "mobile"];

/// One worksheet as plain text cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub sites_created: usize,
    pub errors: Vec<String>,
}

impl ImportSummary {
    fn fail(&mut self, sheet: &str, row: usize, reason: impl std::fmt::Display) {
        self.failed += 1;
        self.errors.push(format!("{sheet} {row}행: {reason}"));
    }
}

/// Column positions found in a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    site: usize,
    name: usize,
    phone: Option<usize>,
}

/// A data row ready for upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RosterRow {
    line: usize,
    site: String,
    name: String,
    phone: String,
}

/// Company sheets read from an `.xlsx` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
    /// Company sheets that could not be parsed, as report lines.
    pub unreadable: Vec<String>,
}

/// Reads the company-marked worksheets of an `.xlsx` file into text cells.
/// Other sheets are never opened; a company sheet that fails to parse is
/// recorded in `unreadable` and the rest are still read.
///
/// # Errors
///
/// Returns `ImportError::Workbook` if the bytes are not a readable workbook.
pub fn read_workbook(bytes: &[u8]) -> Result<Workbook, ImportError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e: calamine::XlsxError| ImportError::Workbook(e.to_string()))?;
    let mut out = Workbook::default();
    for name in workbook.sheet_names() {
        if Company::from_marker(&name).is_none() {
            debug!(sheet = %name, "sheet without company marker ignored");
            continue;
        }
        match workbook.worksheet_range(&name) {
            Ok(range) => {
                let rows = range
                    .rows()
                    .map(|row| row.iter().map(cell_text).collect())
                    .collect();
                out.sheets.push(Sheet { name, rows });
            }
            Err(err) => {
                warn!(sheet = %name, error = %err, "unreadable roster sheet skipped");
                out.unreadable
                    .push(format!("{name}: 시트를 읽을 수 없습니다 ({err})"));
            }
        }
    }
    Ok(out)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_owned(),
        #[allow(clippy::cast_possible_truncation)]
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Int(i) => i.to_string(),
        other => other.to_string().trim().to_owned(),
    }
}

fn matches_label(cell: &str, labels: &[&str]) -> bool {
    let lower = cell.to_lowercase();
    labels.iter().any(|l| lower.contains(l))
}

fn find_header(rows: &[Vec<String>]) -> Option<(usize, Columns)> {
    rows.iter().enumerate().find_map(|(i, row)| {
        let site = row.iter().position(|c| matches_label(c, SITE_LABELS))?;
        let name = row
            .iter()
            .enumerate()
            .position(|(j, c)| j != site && matches_label(c, NAME_LABELS))?;
        let phone = row.iter().position(|c| matches_label(c, PHONE_LABELS));
        Some((i, Columns { site, name, phone }))
    })
}

/// Excel drops the leading zero of mobile numbers typed as numbers.
fn restore_leading_zero(digits: String) -> String {
    if digits.len() == 10 && digits.starts_with('1') {
        format!("0{digits}")
    } else {
        digits
    }
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map_or("", |c| c.trim())
}

/// Splits one company sheet into usable rows, counting skips and failures.
fn parse_sheet(sheet: &Sheet, summary: &mut ImportSummary) -> Vec<RosterRow> {
    let Some((header, columns)) = find_header(&sheet.rows) else {
        summary
            .errors
            .push(format!("{}: 헤더 행을 찾을 수 없습니다", sheet.name));
        return Vec::new();
    };

    let mut out = Vec::new();
    for (offset, row) in sheet.rows.iter().enumerate().skip(header + 1) {
        let line = offset + 1;
        if row.iter().all(|c| c.trim().is_empty()) {
            summary.skipped += 1;
            continue;
        }
        let name = cell(row, columns.name);
        if name.is_empty() {
            summary.fail(&sheet.name, line, "이름이 비어 있습니다");
            continue;
        }
        let phone = columns
            .phone
            .map(|i| restore_leading_zero(normalize_phone(cell(row, i))))
            .unwrap_or_default();
        if phone.len() < 4 {
            summary.fail(&sheet.name, line, "연락처가 올바르지 않습니다");
            continue;
        }
        out.push(RosterRow {
            line,
            site: cell(row, columns.site).to_owned(),
            name: name.to_owned(),
            phone,
        });
    }
    out
}

#[derive(Clone)]
pub struct RosterImport {
    sites: Arc<SiteService>,
    guards: Arc<GuardService>,
}

impl RosterImport {
    #[must_use]
    pub fn new(sites: Arc<SiteService>, guards: Arc<GuardService>) -> Self {
        Self { sites, guards }
    }

    /// # Errors
    ///
    /// Returns `ImportError::Workbook` for unreadable files or when every
    /// company sheet is unreadable, and `ImportError::NoCompanySheet` when no
    /// sheet names a company.
    pub async fn import_xlsx(&self, bytes: &[u8]) -> Result<ImportSummary, ImportError> {
        let Workbook { sheets, unreadable } = read_workbook(bytes)?;
        if sheets.is_empty() {
            return Err(match unreadable.into_iter().next() {
                Some(reason) => ImportError::Workbook(reason),
                None => ImportError::NoCompanySheet,
            });
        }
        let mut summary = self.import_sheets(&sheets).await?;
        summary.errors.extend(unreadable);
        Ok(summary)
    }

    /// # Errors
    ///
    /// Returns `ImportError::NoCompanySheet` when no sheet names a company.
    pub async fn import_sheets(&self, sheets: &[Sheet]) -> Result<ImportSummary, ImportError> {
        let company_sheets: Vec<(Company, &Sheet)> = sheets
            .iter()
            .filter_map(|s| Company::from_marker(&s.name).map(|c| (c, s)))
            .collect();
        if company_sheets.is_empty() {
            return Err(ImportError::NoCompanySheet);
        }

        let mut summary = ImportSummary::default();
        let mut site_cache: HashMap<(Company, String), SiteId> = HashMap::new();
        for (company, sheet) in company_sheets {
            for row in parse_sheet(sheet, &mut summary) {
                let site_id = if row.site.is_empty() {
                    None
                } else if let Some(id) = site_cache.get(&(company, row.site.clone())) {
                    Some(*id)
                } else {
                    match self.sites.find_or_create(&row.site, company).await {
                        Ok((site, created)) => {
                            if created {
                                summary.sites_created += 1;
                            }
                            site_cache.insert((company, row.site.clone()), site.id);
                            Some(site.id)
                        }
                        Err(err) => {
                            summary.fail(&sheet.name, row.line, &err);
                            continue;
                        }
                    }
                };

                let entry = RosterEntry {
                    name: row.name,
                    phone: row.phone,
                    company,
                    site_id,
                };
                match self.guards.upsert_by_phone(entry).await {
                    Ok(UpsertOutcome::Created(_)) => summary.created += 1,
                    Ok(UpsertOutcome::Updated(_)) => summary.updated += 1,
                    Err(err) => {
                        warn!(sheet = %sheet.name, line = row.line, error = %err, "roster row rejected");
                        summary.fail(&sheet.name, row.line, &err);
                    }
                }
            }
        }
        info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            "roster import finished"
        );
        Ok(summary)
    }
}
