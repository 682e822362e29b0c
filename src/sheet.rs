//! Workbook decoding: the first worksheet becomes a [`Sheet`] whose header is
//! taken from a given absolute row.

use crate::error::{PipelineError, Result};
use crate::schema::header::UNNAMED_PREFIX;
use crate::types::{Cell, Sheet};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::collections::HashMap;
use std::io::Cursor;
use tracing::debug;

/// Decode workbook bytes (xlsx, xls, ods) and read sheet index 0 with its
/// header on `header_row`.
pub fn read_sheet(bytes: &[u8], header_row: usize) -> Result<Sheet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::CriticalParse("workbook has no worksheets".to_string()))??;
    sheet_from_range(&range, header_row)
}

/// Build a [`Sheet`] from a decoded range. Positions are absolute, so a range
/// that starts below row 0 still lines up with `header_row`.
pub fn sheet_from_range(range: &Range<Data>, header_row: usize) -> Result<Sheet> {
    let Some((end_row, end_col)) = range.end() else {
        return Ok(Sheet::default());
    };
    let header_row = u32::try_from(header_row)
        .map_err(|_| PipelineError::CriticalParse(format!("header row {} out of range", header_row)))?;
    if header_row > end_row {
        return Ok(Sheet::default());
    }
    let width = end_col as usize + 1;

    let read_row = |row: u32| -> Vec<Cell> {
        (0..=end_col)
            .map(|col| range.get_value((row, col)).map(to_cell).unwrap_or(Cell::Empty))
            .collect()
    };

    let header_cells = read_row(header_row);
    let headers = header_labels(&header_cells);

    let mut rows = Vec::new();
    let mut blank = 0usize;
    for row in (header_row + 1)..=end_row {
        let cells = read_row(row);
        if cells.iter().all(Cell::is_empty) {
            blank += 1;
            continue;
        }
        rows.push(cells);
    }
    debug!(
        columns = width,
        rows = rows.len(),
        blank_rows = blank,
        "decoded worksheet"
    );
    Ok(Sheet { headers, rows })
}

/// Header text per column: blank cells get `Unnamed: {index}` and repeated
/// labels get `.1`, `.2`, ... suffixes in left-to-right order.
pub fn header_labels(cells: &[Cell]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    cells
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let base = cell
                .as_text()
                .unwrap_or_else(|| format!("{}: {}", UNNAMED_PREFIX, idx));
            let count = seen.entry(base.clone()).or_insert(0);
            let label = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            label
        })
        .collect()
}

fn to_cell(value: &Data) -> Cell {
    match value {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => dt.as_datetime().map(Cell::DateTime).unwrap_or(Cell::Empty),
        Data::DateTimeIso(s) => chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(Cell::DateTime)
            .unwrap_or_else(|_| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}
