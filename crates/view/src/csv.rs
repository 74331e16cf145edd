//! CSV export of visible records and customer import.
//!
//! Export quotes every cell. Import understands the subset of CSV the
//! export produces plus hand-edited spreadsheets: quoted fields with
//! embedded commas and doubled quotes, no multi-line cells.

use time::format_description::well_known::Rfc3339;

use bizflow_model::{Customer, CustomerInput, Lead, NewRecord, Note, OwnerId, Record, Task};
use bizflow_storage::{RecordStorage, StorageError};

/// One exported row: ordered `(column, value)` pairs.
pub type CsvRow = Vec<(String, String)>;

/// A record that knows its export columns.
pub trait CsvRecord {
    fn csv_row(&self) -> CsvRow;
}

fn cell(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

fn timestamp(at: time::OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

impl CsvRecord for Customer {
    fn csv_row(&self) -> CsvRow {
        vec![
            cell("id", self.meta.id.as_str()),
            cell("name", self.name.as_str()),
            cell("email", self.email.as_str()),
            cell("tags", self.tags.join("; ")),
            cell("created_at", timestamp(self.meta.created_at)),
        ]
    }
}

impl CsvRecord for Lead {
    fn csv_row(&self) -> CsvRow {
        vec![
            cell("id", self.meta.id.as_str()),
            cell("name", self.name.as_str()),
            cell("amount", self.amount.to_string()),
            cell("stage", self.stage.to_string()),
            cell("created_at", timestamp(self.meta.created_at)),
        ]
    }
}

impl CsvRecord for Task {
    fn csv_row(&self) -> CsvRow {
        vec![
            cell("id", self.meta.id.as_str()),
            cell("title", self.title.as_str()),
            cell("project_id", self.project_id.clone().unwrap_or_default()),
            cell("stage", self.stage.to_string()),
            cell("created_at", timestamp(self.meta.created_at)),
        ]
    }
}

impl CsvRecord for Note {
    fn csv_row(&self) -> CsvRow {
        vec![
            cell("id", self.meta.id.as_str()),
            cell("customer_id", self.customer_id.as_str()),
            cell("content", self.content.as_str()),
            cell("created_at", timestamp(self.meta.created_at)),
        ]
    }
}

impl CsvRecord for Record {
    fn csv_row(&self) -> CsvRow {
        match self {
            Record::Customer(c) => c.csv_row(),
            Record::Lead(l) => l.csv_row(),
            Record::Task(t) => t.csv_row(),
            Record::Note(n) => n.csv_row(),
        }
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Render rows as CSV.
///
/// The header is the union of every row's columns in first-seen order; a
/// row without a column gets an empty cell. No rows, no output.
pub fn export_rows(rows: &[CsvRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let mut header: Vec<&str> = Vec::new();
    for row in rows {
        for (key, _) in row {
            if !header.contains(&key.as_str()) {
                header.push(key);
            }
        }
    }
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(header.iter().map(|h| quote(h)).collect::<Vec<_>>().join(","));
    for row in rows {
        let line = header
            .iter()
            .map(|h| {
                let value = row
                    .iter()
                    .find(|(k, _)| k.as_str() == *h)
                    .map(|(_, v)| v.as_str())
                    .unwrap_or("");
                quote(value)
            })
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }
    lines.join("\n")
}

pub fn export_records<'a, R, I>(records: I) -> String
where
    R: CsvRecord + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let rows: Vec<CsvRow> = records.into_iter().map(CsvRecord::csv_row).collect();
    export_rows(&rows)
}

// ── Import ───────────────────────────────────────────────────────────────────

/// Parsed customer rows plus what was dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub rows: Vec<CustomerInput>,
    /// Data lines without a name or an email.
    pub skipped: usize,
    /// The header lacks a `name` or `email` column; nothing was parsed.
    pub missing_columns: bool,
}

impl ImportReport {
    pub fn parsed(&self) -> usize {
        self.rows.len()
    }
}

/// Split one line on commas outside double quotes. `""` inside quotes is a
/// literal quote.
pub fn split_line(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cur.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => parts.push(std::mem::take(&mut cur)),
            _ => cur.push(ch),
        }
    }
    parts.push(cur);
    parts
}

fn header_name(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_lowercase()
}

/// Parse customer rows from CSV text.
///
/// The header is matched case-insensitively for `name`, `email` and an
/// optional `tags` column; other columns are ignored. Tags split on `,`
/// or `;`.
pub fn parse_customers(text: &str) -> ImportReport {
    let mut lines = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return ImportReport::default();
    };
    let header: Vec<String> = header.split(',').map(header_name).collect();
    let column = |name: &str| header.iter().position(|h| h == name);
    let (Some(name_idx), Some(email_idx)) = (column("name"), column("email")) else {
        return ImportReport {
            missing_columns: true,
            ..ImportReport::default()
        };
    };
    let tags_idx = column("tags");

    let mut report = ImportReport::default();
    for (n, line) in lines.enumerate() {
        let parts = split_line(line);
        let field = |idx: usize| parts.get(idx).map(|s| s.trim()).unwrap_or("");
        let name = field(name_idx);
        let email = field(email_idx);
        if name.is_empty() || email.is_empty() {
            tracing::warn!(line = n + 2, "skipping row without name or email");
            report.skipped += 1;
            continue;
        }
        let tags: Vec<String> = tags_idx
            .map(|idx| {
                field(idx)
                    .split([',', ';'])
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        report.rows.push(CustomerInput {
            name: name.to_string(),
            email: email.to_string(),
            tags,
        });
    }
    report
}

/// Create every parsed row for `owner`, one storage call each. Returns the
/// created records and the failures by row index.
pub async fn create_customers<S: RecordStorage + ?Sized>(
    storage: &S,
    owner: &OwnerId,
    rows: Vec<CustomerInput>,
) -> (Vec<Record>, Vec<(usize, StorageError)>) {
    let mut created = Vec::with_capacity(rows.len());
    let mut failed = Vec::new();
    for (idx, row) in rows.into_iter().enumerate() {
        match storage.create(owner, NewRecord::Customer(row)).await {
            Ok(record) => created.push(record),
            Err(err) => {
                tracing::warn!(row = idx, error = %err, "import row not created");
                failed.push((idx, err));
            }
        }
    }
    (created, failed)
}
