use crate::error::{PipelineError, Result};
use crate::loader::{drop_layout_columns, TripTable};
use crate::schema::master;
use crate::types::{ClassificationEntry, JoinedRecord, Sheet};
use std::collections::HashMap;
use tracing::{info, warn};

/// Header names of the master file's key and label columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MasterColumns {
    pub key: String,
    pub classification: String,
}

impl Default for MasterColumns {
    fn default() -> Self {
        Self {
            key: master::UNIT_KEY.to_string(),
            classification: master::CLASSIFICATION.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JoinedTable {
    pub records: Vec<JoinedRecord>,
    pub unit_column: String,
    /// Trip rows dropped because their unit has no master entry.
    pub excluded_rows: usize,
}

/// Join-key normalization applied to both sides.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Read classification entries from a master sheet (header on its first row).
///
/// Rows with a blank key are skipped. A key listed twice keeps its first
/// label so that the join never multiplies trip rows.
pub fn parse_master(sheet: &Sheet, columns: &MasterColumns) -> Result<Vec<ClassificationEntry>> {
    let (sheet, _) = drop_layout_columns(sheet);
    let key_idx = sheet.column_index(&columns.key);
    let class_idx = sheet.column_index(&columns.classification);
    let (Some(key_idx), Some(class_idx)) = (key_idx, class_idx) else {
        let missing = [(&columns.key, key_idx), (&columns.classification, class_idx)]
            .into_iter()
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| name.clone())
            .collect();
        return Err(PipelineError::Join { missing });
    };

    let mut entries: Vec<ClassificationEntry> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for row in 0..sheet.rows.len() {
        let Some(raw_key) = sheet.cell(row, key_idx).as_text() else {
            continue;
        };
        let key = normalize_key(&raw_key);
        let classification = sheet.cell(row, class_idx).as_text().unwrap_or_default();
        if let Some(&first) = seen.get(&key) {
            if entries[first].classification != classification {
                warn!(
                    key = %key,
                    kept = %entries[first].classification,
                    ignored = %classification,
                    "duplicate master key with a different classification"
                );
            }
            continue;
        }
        seen.insert(key.clone(), entries.len());
        entries.push(ClassificationEntry { key, classification });
    }
    Ok(entries)
}

/// Inner join of trips against classification entries on the normalized
/// unit key. Joined rows carry the normalized key as their unit id.
pub fn join(trips: &TripTable, entries: &[ClassificationEntry]) -> JoinedTable {
    let lookup: HashMap<&str, &str> = entries
        .iter()
        .map(|e| (e.key.as_str(), e.classification.as_str()))
        .collect();

    let mut records = Vec::with_capacity(trips.records.len());
    let mut excluded_rows = 0usize;
    for trip in &trips.records {
        let key = normalize_key(&trip.unit_id);
        match lookup.get(key.as_str()) {
            Some(&classification) if !key.is_empty() => {
                let mut trip = trip.clone();
                trip.unit_id = key;
                records.push(JoinedRecord {
                    trip,
                    classification: classification.to_string(),
                });
            }
            _ => excluded_rows += 1,
        }
    }

    info!(
        joined = records.len(),
        excluded = excluded_rows,
        master_entries = entries.len(),
        "joined trips against master"
    );
    JoinedTable {
        records,
        unit_column: trips.unit_column.clone(),
        excluded_rows,
    }
}
