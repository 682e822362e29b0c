use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

/// A decoded spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    #[cfg(test)]
    pub fn text(s: &str) -> Self {
        Cell::Text(s.to_string())
    }

    /// Blank strings count as empty, matching how spreadsheets export
    /// whitespace-only cells.
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text rendering used for identifiers and labels. Integral numbers drop
    /// the fractional part so `1042.0` reads as `1042`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let t = s.trim();
                if t.is_empty() { None } else { Some(t.to_string()) }
            }
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(n.to_string())
                }
            }
            Cell::Bool(b) => Some(b.to_string()),
            Cell::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

/// Header labels plus data rows, already positioned below the header row.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }
}

/// Year-month bucket, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn of(date: NaiveDate) -> Self {
        Period { year: date.year(), month: date.month() }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{}'", s))?;
        let year: i32 = y.parse().map_err(|_| format!("invalid year in '{}'", s))?;
        let month: u32 = m.parse().map_err(|_| format!("invalid month in '{}'", s))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range in '{}'", s));
        }
        Ok(Period { year, month })
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub unit_id: String,
    pub business_unit: String,
    pub trip_id: Option<String>,
    pub revenue: f64,
    pub distance: f64,
    pub date: NaiveDate,
    pub period: Period,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub driver: Option<String>,
    pub client: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationEntry {
    pub key: String,
    pub classification: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    pub trip: TripRecord,
    pub classification: String,
}

/// Row access shared by single-file and joined tables.
pub trait TripRow {
    fn trip(&self) -> &TripRecord;

    fn classification(&self) -> Option<&str> {
        None
    }

    /// The label the scope filter and the audit view group on.
    fn group_label(&self) -> &str {
        self.classification()
            .unwrap_or(self.trip().business_unit.as_str())
    }
}

impl TripRow for TripRecord {
    fn trip(&self) -> &TripRecord {
        self
    }
}

impl TripRow for JoinedRecord {
    fn trip(&self) -> &TripRecord {
        &self.trip
    }

    fn classification(&self) -> Option<&str> {
        Some(&self.classification)
    }
}

/// Row selection for one dashboard view.
///
/// A single-file report is filtered on one business unit; a joined report on
/// any number of classification labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    BusinessUnit {
        period: Period,
        business_unit: String,
    },
    Classifications {
        period: Period,
        labels: BTreeSet<String>,
    },
}

impl Scope {
    pub fn period(&self) -> Period {
        match self {
            Scope::BusinessUnit { period, .. } | Scope::Classifications { period, .. } => *period,
        }
    }

    pub fn contains<R: TripRow>(&self, row: &R) -> bool {
        let trip = row.trip();
        if trip.period != self.period() {
            return false;
        }
        match self {
            Scope::BusinessUnit { business_unit, .. } => trip.business_unit == *business_unit,
            Scope::Classifications { labels, .. } => row
                .classification()
                .map(|c| labels.contains(c))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::BusinessUnit { period, business_unit } => {
                write!(f, "{} ({})", business_unit, period)
            }
            Scope::Classifications { period, labels } => {
                let joined: Vec<&str> = labels.iter().map(String::as_str).collect();
                write!(f, "{} ({})", joined.join(", "), period)
            }
        }
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitSummary {
    pub unit_id: String,
    pub trip_count: usize,
    pub total_revenue: f64,
    pub total_distance: f64,
    pub last_trip_date: NaiveDate,
    pub inactivity_days: i64,
}

/// Export row of the `summary` table.
#[derive(Debug, Serialize, Clone)]
pub struct SummaryRow {
    #[serde(rename = "Unidad")]
    pub unit_id: String,
    #[serde(rename = "Viajes")]
    pub trips: usize,
    #[serde(rename = "Facturacion")]
    pub revenue: String,
    #[serde(rename = "KM_Totales")]
    pub distance: String,
    #[serde(rename = "Ult_Viaje")]
    pub last_trip: String,
    #[serde(rename = "Dias_Inactivos")]
    pub inactivity_days: i64,
}

/// Terminal detail row: every metric carries its semaphore tag.
#[derive(Debug, Tabled, Clone)]
pub struct DetailRow {
    #[tabled(rename = "Unidad")]
    pub unit_id: String,
    #[tabled(rename = "Viajes")]
    pub trips: String,
    #[tabled(rename = "Facturacion")]
    pub revenue: String,
    #[tabled(rename = "KM_Totales")]
    pub distance: String,
    #[tabled(rename = "Dias_Inactivos")]
    pub inactivity: String,
}

/// Export row of the `audit-for-unit` table.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct AuditRow {
    #[serde(rename = "Fecha")]
    #[tabled(rename = "Fecha")]
    pub date: String,
    #[serde(rename = "Viaje")]
    #[tabled(rename = "Viaje")]
    pub trip: String,
    #[serde(rename = "Unidad")]
    #[tabled(rename = "Unidad")]
    pub unit_id: String,
    #[serde(rename = "Grupo")]
    #[tabled(rename = "Grupo")]
    pub group: String,
    #[serde(rename = "Facturacion")]
    #[tabled(rename = "Facturacion")]
    pub revenue: String,
    #[serde(rename = "KM")]
    #[tabled(rename = "KM")]
    pub distance: String,
    #[serde(rename = "Origen")]
    #[tabled(rename = "Origen")]
    pub origin: String,
    #[serde(rename = "Destino")]
    #[tabled(rename = "Destino")]
    pub destination: String,
    #[serde(rename = "Operador")]
    #[tabled(rename = "Operador")]
    pub driver: String,
    #[serde(rename = "Cliente")]
    #[tabled(rename = "Cliente")]
    pub client: String,
}
