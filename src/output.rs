use crate::dashboard::{ExportBundle, ScopeReport};
use crate::error::Result;
use crate::schema::tables;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Write the named export tables plus `scope.json` into `dir`. Returns the
/// paths written.
pub fn write_bundle(dir: &Path, bundle: &ExportBundle, report: &ScopeReport) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let summary = dir.join(format!("{}.csv", tables::SUMMARY));
    write_csv(&summary, &bundle.summary)?;
    written.push(summary);

    if let Some((unit, rows)) = &bundle.audit_for_unit {
        let audit = dir.join(format!("{}.csv", tables::AUDIT_FOR_UNIT));
        write_csv(&audit, rows)?;
        info!(unit = %unit, rows = rows.len(), "wrote audit table");
        written.push(audit);
    }

    let json = dir.join("scope.json");
    write_json(&json, report)?;
    written.push(json);
    Ok(written)
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
    if rows.len() > max_rows {
        println!("({} more rows not shown)\n", rows.len() - max_rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{build_view, ScopeView};
    use crate::pipeline::Dataset;
    use crate::types::{Period, Scope, TripRecord};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn report() -> (Dataset, ScopeReport) {
        let date = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let rec = TripRecord {
            unit_id: "ECO-1".to_string(),
            business_unit: "Norte".to_string(),
            trip_id: Some("V-1".to_string()),
            revenue: 1500.0,
            distance: 320.0,
            date,
            period: Period::of(date),
            origin: None,
            destination: None,
            driver: None,
            client: None,
        };
        let scope = Scope::BusinessUnit {
            period: Period::of(date),
            business_unit: "Norte".to_string(),
        };
        let ScopeView::Ready(report) = build_view(std::slice::from_ref(&rec), &scope) else {
            panic!("expected data");
        };
        let table = crate::loader::TripTable {
            records: vec![rec],
            unit_column: "Eco".to_string(),
            report: Default::default(),
        };
        (Dataset::Single(table), report)
    }

    #[test]
    fn test_write_bundle_names_tables() {
        let tmp = TempDir::new().unwrap();
        let (ds, report) = report();
        let bundle = ds.export(&ScopeView::Ready(report.clone()), None).unwrap();
        let written = write_bundle(tmp.path(), &bundle, &report).unwrap();

        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["summary.csv", "scope.json"]);

        let csv_text = std::fs::read_to_string(tmp.path().join("summary.csv")).unwrap();
        let mut lines = csv_text.lines();
        assert_eq!(
            lines.next(),
            Some("Unidad,Viajes,Facturacion,KM_Totales,Ult_Viaje,Dias_Inactivos")
        );
        assert_eq!(lines.next(), Some("ECO-1,1,\"1,500.00\",320.00,2024-03-02,0"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join("scope.json")).unwrap()).unwrap();
        assert_eq!(json["totals"]["active_units"], 1);
        assert_eq!(json["scope"], "Norte (2024-03)");
    }
}
