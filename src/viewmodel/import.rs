//! Bulk member import from a spreadsheet export
//!
//! Rows carry a member name, region name, position name and phone. Region
//! and position names are resolved against caches loaded once per import.
//! Every row is committed on its own, so a bad row never takes earlier rows
//! down with it.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use csv::StringRecord;
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::db::{AssignmentRepository, Database, MemberRepository};
use crate::core::error::{StoreError, StoreResult};
use crate::entities::member::normalize_phone;
use crate::entities::{MemberDraft, MemberPosition};

/// Canonical column headers, in template order
pub const TEMPLATE_HEADERS: [&str; 4] = ["姓名", "地區", "職務", "電話"];

const NAME_HEADERS: [&str; 2] = ["姓名", "name"];
const REGION_HEADERS: [&str; 2] = ["地區", "region"];
const POSITION_HEADERS: [&str; 2] = ["職務", "position"];
const PHONE_HEADERS: [&str; 2] = ["電話", "phone"];

/// Problems reading the import file itself
#[derive(Debug, Error, Diagnostic)]
pub enum ImportError {
    #[error("failed to open {path}: {source}")]
    #[diagnostic(code(roster::import::open))]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parse error: {0}")]
    #[diagnostic(code(roster::import::csv))]
    Csv(#[from] csv::Error),

    #[error("missing required column(s): {}", .0.join(", "))]
    #[diagnostic(
        code(roster::import::columns),
        help("the header row needs 姓名, 地區 and 職務 (or name, region, position); 電話/phone is optional")
    )]
    MissingColumns(Vec<&'static str>),
}

/// One data row as read from the file, untrimmed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportRow {
    /// 1-based line in the source file
    pub line: usize,
    pub name: String,
    pub region: String,
    pub position: String,
    pub phone: String,
}

impl ImportRow {
    fn trimmed(&self) -> ImportRow {
        ImportRow {
            line: self.line,
            name: self.name.trim().to_string(),
            region: self.region.trim().to_string(),
            position: self.position.trim().to_string(),
            phone: self.phone.trim().to_string(),
        }
    }
}

/// Build a map from trimmed, lowercased header name to column index
fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.trim_start_matches('\u{feff}').trim().to_lowercase();
            (h, i)
        })
        .collect()
}

fn column(map: &HashMap<String, usize>, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|a| map.get(*a).copied())
}

fn field(record: &StringRecord, idx: Option<usize>) -> String {
    idx.and_then(|i| record.get(i)).unwrap_or_default().to_string()
}

/// Parse CSV rows; the first row is the header
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<ImportRow>, ImportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let map = build_header_map(&headers);

    let name_col = column(&map, &NAME_HEADERS);
    let region_col = column(&map, &REGION_HEADERS);
    let position_col = column(&map, &POSITION_HEADERS);
    let phone_col = column(&map, &PHONE_HEADERS);

    let missing: Vec<&'static str> = [
        (name_col, NAME_HEADERS[0]),
        (region_col, REGION_HEADERS[0]),
        (position_col, POSITION_HEADERS[0]),
    ]
    .into_iter()
    .filter(|(col, _)| col.is_none())
    .map(|(_, header)| header)
    .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(ImportRow {
            line: record.position().map(|p| p.line() as usize).unwrap_or(i + 2),
            name: field(&record, name_col),
            region: field(&record, region_col),
            position: field(&record, position_col),
            phone: field(&record, phone_col),
        });
    }
    Ok(rows)
}

/// Read and parse an import file without touching storage
pub fn preview(path: &Path) -> Result<Vec<ImportRow>, ImportError> {
    let file = File::open(path).map_err(|source| ImportError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_rows(file)
}

/// What happened to one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
    Created { member_id: i64 },
    Updated { member_id: i64 },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowResult {
    pub line: usize,
    pub name: String,
    #[serde(flatten)]
    pub status: RowStatus,
}

impl RowResult {
    pub fn is_success(&self) -> bool {
        !matches!(self.status, RowStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    /// True if the import was stopped before the last row
    pub stopped: bool,
}

impl ImportSummary {
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.failed
    }

    fn record(&mut self, result: &RowResult) {
        match result.status {
            RowStatus::Created { .. } => self.created += 1,
            RowStatus::Updated { .. } => self.updated += 1,
            RowStatus::Failed { .. } => self.failed += 1,
        }
    }
}

/// Runs rows against one database session
pub struct MemberImporter<'db> {
    db: &'db mut Database,
    regions: HashMap<String, i64>,
    positions: HashMap<String, i64>,
    members: HashMap<String, i64>,
}

/// Name → id map; the first of several same-named nodes wins
fn name_cache<I: IntoIterator<Item = (String, i64)>>(kind: &str, items: I) -> HashMap<String, i64> {
    let mut cache = HashMap::new();
    for (name, id) in items {
        if cache.contains_key(&name) {
            warn!("{} name '{}' is ambiguous, using the first match", kind, name);
            continue;
        }
        cache.insert(name, id);
    }
    cache
}

impl<'db> MemberImporter<'db> {
    /// Load the region, position and member name caches
    pub fn new(db: &'db mut Database) -> StoreResult<Self> {
        let regions = name_cache(
            "region",
            db.regions().all()?.into_iter().map(|r| (r.name, r.id)),
        );
        let positions = name_cache(
            "position",
            db.positions().all_sorted()?.into_iter().map(|p| (p.name, p.id)),
        );
        let members = name_cache(
            "member",
            db.members().all()?.into_iter().map(|m| (m.name, m.id)),
        );
        debug!(
            regions = regions.len(),
            positions = positions.len(),
            members = members.len(),
            "import caches loaded"
        );
        Ok(Self {
            db,
            regions,
            positions,
            members,
        })
    }

    /// Validate a row and resolve its region and position ids
    pub fn check_row(&self, row: &ImportRow) -> StoreResult<(i64, i64)> {
        let row = row.trimmed();
        for (value, header) in [
            (&row.name, NAME_HEADERS[0]),
            (&row.region, REGION_HEADERS[0]),
            (&row.position, POSITION_HEADERS[0]),
        ] {
            if value.is_empty() {
                return Err(StoreError::validation(header, "missing required field"));
            }
        }

        let region_id = *self
            .regions
            .get(&row.region)
            .ok_or_else(|| StoreError::not_found("region", &row.region))?;
        let position_id = *self
            .positions
            .get(&row.position)
            .ok_or_else(|| StoreError::not_found("position", &row.position))?;
        Ok((region_id, position_id))
    }

    /// Import one row in its own transaction
    pub fn import_row(&mut self, row: &ImportRow) -> RowResult {
        let trimmed = row.trimmed();
        let status = match self.write_row(&trimmed) {
            Ok((member_id, true)) => {
                // Only a committed member may be referenced by later rows
                self.members.insert(trimmed.name.clone(), member_id);
                RowStatus::Created { member_id }
            }
            Ok((member_id, false)) => RowStatus::Updated { member_id },
            Err(e) => {
                info!("import line {} failed: {}", row.line, e);
                RowStatus::Failed {
                    message: e.to_string(),
                }
            }
        };
        RowResult {
            line: row.line,
            name: trimmed.name,
            status,
        }
    }

    /// Returns the member id and whether the member was created
    fn write_row(&mut self, row: &ImportRow) -> StoreResult<(i64, bool)> {
        let (region_id, position_id) = self.check_row(row)?;
        let phone = normalize_phone(Some(&row.phone));
        let cached = self.members.get(&row.name).copied();

        let tx = self.db.transaction()?;
        let members = MemberRepository::new(&tx);
        let (member_id, created) = match cached {
            Some(id) => {
                members.update_contact(id, phone.as_deref(), Some(region_id))?;
                (id, false)
            }
            None => {
                let draft = MemberDraft {
                    name: row.name.clone(),
                    phone_number: phone,
                    region_id: Some(region_id),
                    ..Default::default()
                };
                (members.insert(&draft)?, true)
            }
        };

        let assignments = AssignmentRepository::new(&tx);
        if assignments.find(member_id, position_id)?.is_none() {
            let is_primary = !assignments.has_primary(member_id)?;
            assignments.insert(&MemberPosition {
                member_id,
                position_id,
                is_primary,
            })?;
        }

        tx.commit()?;
        Ok((member_id, created))
    }

    /// Import rows in order until done or `stop` is raised
    ///
    /// `stop` is checked before each row; the row in flight always finishes.
    pub fn run<F>(&mut self, rows: &[ImportRow], stop: &AtomicBool, mut on_row: F) -> ImportSummary
    where
        F: FnMut(&RowResult, usize),
    {
        let mut summary = ImportSummary {
            total: rows.len(),
            ..Default::default()
        };

        for (i, row) in rows.iter().enumerate() {
            if stop.load(Ordering::SeqCst) {
                info!("import stopped after {} of {} row(s)", i, rows.len());
                summary.stopped = true;
                break;
            }
            let result = self.import_row(row);
            summary.record(&result);
            on_row(&result, i + 1);
        }

        info!(
            "import finished: {} created, {} updated, {} failed",
            summary.created, summary.updated, summary.failed
        );
        summary
    }
}

/// Messages from a background import
#[derive(Debug, Clone)]
pub enum ImportEvent {
    Progress {
        done: usize,
        total: usize,
        result: RowResult,
    },
    Finished(ImportSummary),
    /// The import could not start (database unavailable)
    Aborted(String),
}

/// An import running on its own thread with its own database session
pub struct ImportWorker {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    events: Receiver<ImportEvent>,
}

impl ImportWorker {
    pub fn spawn(db_path: PathBuf, rows: Vec<ImportRow>) -> std::io::Result<Self> {
        let (tx, events) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("roster-import".into())
            .spawn(move || {
                let mut db = match Database::open(&db_path) {
                    Ok(db) => db,
                    Err(e) => {
                        let _ = tx.send(ImportEvent::Aborted(e.to_string()));
                        return;
                    }
                };
                let mut importer = match MemberImporter::new(&mut db) {
                    Ok(importer) => importer,
                    Err(e) => {
                        let _ = tx.send(ImportEvent::Aborted(e.to_string()));
                        return;
                    }
                };

                let total = rows.len();
                let summary = importer.run(&rows, &stop_flag, |result, done| {
                    let _ = tx.send(ImportEvent::Progress {
                        done,
                        total,
                        result: result.clone(),
                    });
                });
                let _ = tx.send(ImportEvent::Finished(summary));
            })?;

        Ok(Self {
            handle: Some(handle),
            stop,
            events,
        })
    }

    /// Ask the worker to stop before the next row
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> &Receiver<ImportEvent> {
        &self.events
    }

    /// Wait for the worker thread to exit
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("import worker panicked");
            }
        }
    }
}
