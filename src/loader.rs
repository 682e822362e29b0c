use crate::error::{PipelineError, Result};
use crate::schema::{header::UNNAMED_PREFIX, report};
use crate::types::{Cell, Period, Sheet, TripRecord};
use crate::util::{coerce_amount, coerce_date};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped_bad_dates: usize,
    pub revenue_defaulted: usize,
    pub distance_defaulted: usize,
    pub dropped_columns: Vec<String>,
}

/// Parsed trip report. `unit_column` is the header text found right of the
/// anchor, kept for display since it varies between file revisions.
#[derive(Debug, Clone)]
pub struct TripTable {
    pub records: Vec<TripRecord>,
    pub unit_column: String,
    pub report: LoadReport,
}

/// Remove `Unnamed` placeholder columns, then columns that are empty in every
/// row. Returns the cleaned sheet and the names of the dropped columns.
pub fn drop_layout_columns(sheet: &Sheet) -> (Sheet, Vec<String>) {
    let keep: Vec<usize> = (0..sheet.headers.len())
        .filter(|&col| !sheet.headers[col].contains(UNNAMED_PREFIX))
        .filter(|&col| sheet.rows.iter().any(|row| !row.get(col).map_or(true, Cell::is_empty)))
        .collect();
    let dropped = sheet
        .headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| !keep.contains(idx))
        .map(|(_, h)| h.clone())
        .collect();
    let cleaned = Sheet {
        headers: keep.iter().map(|&c| sheet.headers[c].clone()).collect(),
        rows: sheet
            .rows
            .iter()
            .map(|row| keep.iter().map(|&c| row.get(c).cloned().unwrap_or(Cell::Empty)).collect())
            .collect(),
    };
    (cleaned, dropped)
}

/// Required columns absent from `headers`, in the order they are declared.
pub fn missing_columns(headers: &[String]) -> Vec<String> {
    report::REQUIRED
        .iter()
        .filter(|name| !headers.iter().any(|h| h == *name))
        .map(|name| name.to_string())
        .collect()
}

/// Locate the unit identifier column: the one immediately right of `anchor`.
///
/// The unit column's own header text changes between report revisions, so it
/// is found by position only.
pub fn unit_column_after_anchor(headers: &[String], anchor: &str) -> Result<usize> {
    let anchor_idx = headers
        .iter()
        .position(|h| h == anchor)
        .ok_or_else(|| PipelineError::CriticalParse(format!("anchor column '{}' not found", anchor)))?;
    let unit_idx = anchor_idx + 1;
    if unit_idx >= headers.len() {
        return Err(PipelineError::CriticalParse(format!(
            "no column to the right of anchor '{}'",
            anchor
        )));
    }
    Ok(unit_idx)
}

/// Clean and type a decoded trip report.
pub fn parse_report(sheet: &Sheet) -> Result<TripTable> {
    if sheet.rows.is_empty() || sheet.headers.is_empty() {
        return Err(PipelineError::EmptyFile);
    }
    let total_rows = sheet.rows.len();

    let (sheet, dropped_columns) = drop_layout_columns(sheet);
    if !dropped_columns.is_empty() {
        debug!(columns = ?dropped_columns, "dropped layout columns");
    }

    let missing = missing_columns(&sheet.headers);
    if !missing.is_empty() {
        warn!(missing = ?missing, "report is missing required columns");
        return Err(PipelineError::MissingColumns(missing));
    }

    let unit_idx = unit_column_after_anchor(&sheet.headers, report::TRACTOR)?;
    let unit_column = sheet.headers[unit_idx].clone();

    // Required columns are present past this point.
    let col = |name: &str| sheet.column_index(name);
    let date_idx = col(report::DATE);
    let bu_idx = col(report::BUSINESS_UNIT);
    let trip_idx = col(report::TRIP);
    let price_idx = col(report::CLIENT_PRICE);
    let dist_idx = col(report::TOTAL_DISTANCE);
    let (Some(date_idx), Some(bu_idx), Some(trip_idx), Some(price_idx), Some(dist_idx)) =
        (date_idx, bu_idx, trip_idx, price_idx, dist_idx)
    else {
        return Err(PipelineError::CriticalParse("required column vanished".to_string()));
    };
    let origin_idx = col(report::ORIGIN);
    let dest_idx = col(report::DESTINATION);
    let driver_idx = col(report::DRIVER);
    let client_idx = col(report::CLIENT);

    let mut load_report = LoadReport {
        total_rows,
        dropped_columns,
        ..LoadReport::default()
    };
    let mut records = Vec::with_capacity(total_rows);

    for row in 0..sheet.rows.len() {
        let Some(date) = coerce_date(sheet.cell(row, date_idx)) else {
            load_report.dropped_bad_dates += 1;
            continue;
        };
        let (revenue, revenue_defaulted) = coerce_amount(sheet.cell(row, price_idx));
        let (distance, distance_defaulted) = coerce_amount(sheet.cell(row, dist_idx));
        load_report.revenue_defaulted += revenue_defaulted as usize;
        load_report.distance_defaulted += distance_defaulted as usize;

        let text = |idx: Option<usize>| idx.and_then(|c| sheet.cell(row, c).as_text());

        records.push(TripRecord {
            unit_id: sheet.cell(row, unit_idx).as_text().unwrap_or_default(),
            business_unit: sheet.cell(row, bu_idx).as_text().unwrap_or_default(),
            trip_id: sheet.cell(row, trip_idx).as_text(),
            revenue,
            distance,
            date,
            period: Period::of(date),
            origin: text(origin_idx),
            destination: text(dest_idx),
            driver: text(driver_idx),
            client: text(client_idx),
        });
    }

    load_report.kept_rows = records.len();
    info!(
        total = load_report.total_rows,
        kept = load_report.kept_rows,
        bad_dates = load_report.dropped_bad_dates,
        unit_column = %unit_column,
        "parsed trip report"
    );
    Ok(TripTable {
        records,
        unit_column,
        report: load_report,
    })
}
