//! Load orchestration and the per-session memo table.
//!
//! Decoding a workbook is the expensive step; everything after it runs on
//! every scope change. [`Session`] keeps parsed datasets keyed by a
//! fingerprint of the input bytes so that re-selecting a month or a business
//! unit never re-reads the files.

use crate::aggregate::{group_labels, periods};
use crate::dashboard::{audit_rows, build_view, summary_rows, ExportBundle, ScopeView};
use crate::error::{PipelineError, Result};
use crate::join::{join, parse_master, JoinedTable, MasterColumns};
use crate::loader::{parse_report, LoadReport, TripTable};
use crate::schema::header::{MASTER_HEADER_ROW, REPORT_HEADER_ROW};
use crate::sheet::read_sheet;
use crate::types::{Period, Scope};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadOptions {
    pub header_row: usize,
    pub master_columns: MasterColumns,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            header_row: REPORT_HEADER_ROW,
            master_columns: MasterColumns::default(),
        }
    }
}

/// A cleaned table, joined or not.
#[derive(Debug, Clone)]
pub enum Dataset {
    Single(TripTable),
    Joined { table: JoinedTable, load: LoadReport },
}

impl Dataset {
    pub fn is_joined(&self) -> bool {
        matches!(self, Dataset::Joined { .. })
    }

    pub fn load_report(&self) -> &LoadReport {
        match self {
            Dataset::Single(t) => &t.report,
            Dataset::Joined { load, .. } => load,
        }
    }

    pub fn unit_column(&self) -> &str {
        match self {
            Dataset::Single(t) => &t.unit_column,
            Dataset::Joined { table, .. } => &table.unit_column,
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            Dataset::Single(t) => t.records.len(),
            Dataset::Joined { table, .. } => table.records.len(),
        }
    }

    pub fn periods(&self) -> Vec<Period> {
        match self {
            Dataset::Single(t) => periods(&t.records),
            Dataset::Joined { table, .. } => periods(&table.records),
        }
    }

    /// Business units, or classification labels for joined datasets.
    pub fn groups(&self) -> Vec<String> {
        match self {
            Dataset::Single(t) => group_labels(&t.records),
            Dataset::Joined { table, .. } => group_labels(&table.records),
        }
    }

    /// Build the scope that fits this dataset: exactly one business unit for
    /// a single report, one or more classifications for a joined one.
    pub fn scope(&self, period: Period, selection: &[String]) -> Result<Scope> {
        match self {
            Dataset::Single(_) => match selection {
                [one] => Ok(Scope::BusinessUnit {
                    period,
                    business_unit: one.clone(),
                }),
                _ => Err(PipelineError::InvalidScope(format!(
                    "select exactly one business unit, got {}",
                    selection.len()
                ))),
            },
            Dataset::Joined { .. } => {
                let labels: BTreeSet<String> = selection.iter().cloned().collect();
                if labels.is_empty() {
                    return Err(PipelineError::InvalidScope(
                        "select at least one classification".to_string(),
                    ));
                }
                Ok(Scope::Classifications { period, labels })
            }
        }
    }

    pub fn view(&self, scope: &Scope) -> ScopeView {
        match self {
            Dataset::Single(t) => build_view(&t.records, scope),
            Dataset::Joined { table, .. } => build_view(&table.records, scope),
        }
    }

    /// Export tables for a view. The per-unit audit sheet is only produced
    /// for joined datasets.
    pub fn export(&self, view: &ScopeView, audit_unit: Option<&str>) -> Option<ExportBundle> {
        let ScopeView::Ready(report) = view else {
            return None;
        };
        let audit_for_unit = match (self, audit_unit) {
            (Dataset::Joined { table, .. }, Some(unit)) => Some((
                unit.to_string(),
                audit_rows(&table.records, &report.scope, unit),
            )),
            _ => None,
        };
        Some(ExportBundle {
            summary: summary_rows(report),
            audit_for_unit,
        })
    }
}

/// Run decode → parse → (join) on raw bytes.
pub fn load_dataset(report: &[u8], master: Option<&[u8]>, options: &LoadOptions) -> Result<Dataset> {
    let sheet = read_sheet(report, options.header_row)?;
    let trips = parse_report(&sheet)?;
    let Some(master) = master else {
        return Ok(Dataset::Single(trips));
    };
    let master_sheet = read_sheet(master, MASTER_HEADER_ROW)?;
    let entries = parse_master(&master_sheet, &options.master_columns)?;
    let table = join(&trips, &entries);
    Ok(Dataset::Joined {
        table,
        load: trips.report,
    })
}

/// SHA-256 over everything that shapes a parse result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(report: &[u8], master: Option<&[u8]>, options: &LoadOptions) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((report.len() as u64).to_le_bytes());
        hasher.update(report);
        match master {
            Some(m) => {
                hasher.update([1u8]);
                hasher.update((m.len() as u64).to_le_bytes());
                hasher.update(m);
            }
            None => hasher.update([0u8]),
        }
        hasher.update((options.header_row as u64).to_le_bytes());
        for name in [&options.master_columns.key, &options.master_columns.classification] {
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
        }
        Fingerprint(hasher.finalize().into())
    }

    pub fn short(&self) -> String {
        self.0[..6].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Fingerprint → parsed dataset. Failed loads are not stored.
#[derive(Debug, Default)]
pub struct PipelineCache {
    entries: HashMap<Fingerprint, Arc<Dataset>>,
    hits: usize,
    misses: usize,
}

impl PipelineCache {
    pub fn get_or_load<F>(&mut self, key: Fingerprint, load: F) -> Result<Arc<Dataset>>
    where
        F: FnOnce() -> Result<Dataset>,
    {
        if let Some(ds) = self.entries.get(&key) {
            self.hits += 1;
            debug!(fingerprint = %key.short(), "pipeline cache hit");
            return Ok(Arc::clone(ds));
        }
        self.misses += 1;
        let ds = Arc::new(load()?);
        self.entries.insert(key, Arc::clone(&ds));
        Ok(ds)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

/// One user's working session: load options plus the memo table.
#[derive(Debug, Default)]
pub struct Session {
    options: LoadOptions,
    cache: PipelineCache,
}

impl Session {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            cache: PipelineCache::default(),
        }
    }

    pub fn load(&mut self, report: &[u8], master: Option<&[u8]>) -> Result<Arc<Dataset>> {
        let key = Fingerprint::of(report, master, &self.options);
        let options = &self.options;
        let ds = self
            .cache
            .get_or_load(key, || load_dataset(report, master, options))?;
        info!(
            fingerprint = %key.short(),
            rows = ds.row_count(),
            joined = ds.is_joined(),
            "dataset ready"
        );
        Ok(ds)
    }

    pub fn cache(&self) -> &PipelineCache {
        &self.cache
    }
}
