//! Assembly of one dashboard view: headline totals, per-unit KPIs with their
//! bands, band distributions, the audit drill-down and the export tables.

use crate::aggregate::{aggregate, filter_scope};
use crate::categorize::{categorize, distribution, Distribution, Semaphore, Severity, UnitCategories};
use crate::join::normalize_key;
use crate::types::{AuditRow, DetailRow, Scope, SummaryRow, TripRow, UnitSummary};
use crate::util::{average, format_number};
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeTotals {
    pub revenue: f64,
    /// Every row in scope, including rows without a trip id.
    pub rows: usize,
    pub active_units: usize,
    pub avg_revenue_per_unit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitKpi {
    pub summary: UnitSummary,
    pub categories: UnitCategories,
    pub semaphore: Semaphore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeReport {
    pub scope: Scope,
    pub totals: ScopeTotals,
    pub units: Vec<UnitKpi>,
    pub distribution: Distribution,
}

/// The selected scope has no rows. Rendered as a "no data" state, never as
/// an error.
#[derive(Debug, Clone, PartialEq)]
pub struct EmptyScopeWarning {
    pub scope: Scope,
}

impl fmt::Display for EmptyScopeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No data for this selection: {}", self.scope)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScopeView {
    Ready(ScopeReport),
    NoData(EmptyScopeWarning),
}

pub fn build_view<R: TripRow>(rows: &[R], scope: &Scope) -> ScopeView {
    let summaries = aggregate(rows, scope);
    if summaries.is_empty() {
        debug!(scope = %scope, "scope has no rows");
        return ScopeView::NoData(EmptyScopeWarning { scope: scope.clone() });
    }

    let in_scope = filter_scope(rows, scope);
    let revenues: Vec<f64> = summaries.iter().map(|s| s.total_revenue).collect();
    let totals = ScopeTotals {
        revenue: in_scope.iter().map(|r| r.trip().revenue).sum(),
        rows: in_scope.len(),
        active_units: summaries.len(),
        avg_revenue_per_unit: average(&revenues),
    };
    let units: Vec<UnitKpi> = summaries
        .into_iter()
        .map(|summary| {
            let categories = categorize(&summary);
            UnitKpi {
                semaphore: categories.semaphore(),
                categories,
                summary,
            }
        })
        .collect();
    let cats: Vec<UnitCategories> = units.iter().map(|u| u.categories).collect();

    ScopeView::Ready(ScopeReport {
        scope: scope.clone(),
        totals,
        distribution: distribution(&cats),
        units,
    })
}

/// Scope rows of one unit, oldest first. Unit ids compare after join-key
/// normalization so `abc-1` finds `ABC-1`.
pub fn audit_rows<R: TripRow>(rows: &[R], scope: &Scope, unit: &str) -> Vec<AuditRow> {
    let wanted = normalize_key(unit);
    let mut matched: Vec<&R> = filter_scope(rows, scope)
        .into_iter()
        .filter(|r| normalize_key(&r.trip().unit_id) == wanted)
        .collect();
    matched.sort_by_key(|r| r.trip().date);
    matched
        .into_iter()
        .map(|r| {
            let t = r.trip();
            AuditRow {
                date: t.date.format("%Y-%m-%d").to_string(),
                trip: t.trip_id.clone().unwrap_or_default(),
                unit_id: t.unit_id.clone(),
                group: r.group_label().to_string(),
                revenue: format_number(t.revenue, 2),
                distance: format_number(t.distance, 2),
                origin: t.origin.clone().unwrap_or_default(),
                destination: t.destination.clone().unwrap_or_default(),
                driver: t.driver.clone().unwrap_or_default(),
                client: t.client.clone().unwrap_or_default(),
            }
        })
        .collect()
}

pub fn summary_rows(report: &ScopeReport) -> Vec<SummaryRow> {
    report
        .units
        .iter()
        .map(|u| SummaryRow {
            unit_id: u.summary.unit_id.clone(),
            trips: u.summary.trip_count,
            revenue: format_number(u.summary.total_revenue, 2),
            distance: format_number(u.summary.total_distance, 2),
            last_trip: u.summary.last_trip_date.format("%Y-%m-%d").to_string(),
            inactivity_days: u.summary.inactivity_days,
        })
        .collect()
}

fn tagged(value: String, severity: Severity) -> String {
    match severity {
        Severity::Neutral => value,
        other => format!("{} [{}]", value, other),
    }
}

pub fn detail_rows(report: &ScopeReport) -> Vec<DetailRow> {
    report
        .units
        .iter()
        .map(|u| DetailRow {
            unit_id: u.summary.unit_id.clone(),
            trips: tagged(u.summary.trip_count.to_string(), u.semaphore.trips),
            revenue: tagged(format!("$ {}", format_number(u.summary.total_revenue, 2)), u.semaphore.revenue),
            distance: tagged(format!("{} km", format_number(u.summary.total_distance, 2)), u.semaphore.distance),
            inactivity: tagged(u.summary.inactivity_days.to_string(), u.semaphore.inactivity),
        })
        .collect()
}

/// The two named output tables. `audit_for_unit` is only present for joined
/// datasets when a unit was selected.
#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub summary: Vec<SummaryRow>,
    pub audit_for_unit: Option<(String, Vec<AuditRow>)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::Band;
    use crate::types::{Period, TripRecord};
    use chrono::NaiveDate;

    fn trip(unit: &str, day: u32, trip_id: Option<&str>, revenue: f64) -> TripRecord {
        let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        TripRecord {
            unit_id: unit.to_string(),
            business_unit: "Norte".to_string(),
            trip_id: trip_id.map(str::to_string),
            revenue,
            distance: 100.0,
            date,
            period: Period::of(date),
            origin: Some("GDL".to_string()),
            destination: None,
            driver: None,
            client: Some("ACME".to_string()),
        }
    }

    fn scope(bu: &str) -> Scope {
        Scope::BusinessUnit {
            period: "2024-03".parse().unwrap(),
            business_unit: bu.to_string(),
        }
    }

    #[test]
    fn test_view_totals_and_bands() {
        let rows = vec![
            trip("A", 1, Some("1"), 1_000_000.0),
            trip("A", 2, Some("2"), 2_000_000.0),
            trip("A", 3, Some("3"), 1_500_000.0),
            trip("B", 1, None, 500.0),
        ];
        let ScopeView::Ready(report) = build_view(&rows, &scope("Norte")) else {
            panic!("expected data");
        };
        assert_eq!(report.totals.rows, 4);
        assert_eq!(report.totals.active_units, 2);
        assert_eq!(report.totals.revenue, 4_500_500.0);
        assert_eq!(report.totals.avg_revenue_per_unit, 2_250_250.0);

        let a = &report.units[0];
        assert_eq!(a.summary.trip_count, 3);
        assert_eq!(a.categories.trips, Band::Mid);
        assert_eq!(a.categories.revenue, Band::High);
        assert_eq!(report.distribution.trips.get("< 3"), Some(&1));
    }

    #[test]
    fn test_view_units_match_aggregate() {
        let rows = vec![
            trip("B", 5, Some("1"), 20.0),
            trip("A", 2, Some("2"), 10.0),
            trip("A", 9, None, 5.0),
        ];
        let ScopeView::Ready(report) = build_view(&rows, &scope("Norte")) else {
            panic!("expected data");
        };
        let from_view: Vec<UnitSummary> = report.units.into_iter().map(|u| u.summary).collect();
        assert_eq!(from_view, aggregate(&rows, &scope("Norte")));
    }

    #[test]
    fn test_empty_scope_is_no_data_not_error() {
        let rows = vec![trip("A", 1, Some("1"), 1.0)];
        match build_view(&rows, &scope("Sur")) {
            ScopeView::NoData(w) => assert!(w.to_string().contains("Sur")),
            other => panic!("expected NoData, got {:?}", other),
        }
    }

    #[test]
    fn test_audit_rows_for_one_unit_sorted_by_date() {
        let rows = vec![
            trip("ABC-1", 9, Some("9"), 1.0),
            trip("B", 2, Some("2"), 1.0),
            trip("ABC-1", 4, Some("4"), 1.0),
        ];
        let audit = audit_rows(&rows, &scope("Norte"), " abc-1");
        let trips: Vec<&str> = audit.iter().map(|a| a.trip.as_str()).collect();
        assert_eq!(trips, vec!["4", "9"]);
        assert_eq!(audit[0].origin, "GDL");
        assert_eq!(audit[0].group, "Norte");
    }

    #[test]
    fn test_detail_rows_tag_severity() {
        let rows = vec![trip("A", 1, Some("1"), 10.0)];
        let ScopeView::Ready(report) = build_view(&rows, &scope("Norte")) else {
            panic!("expected data");
        };
        let detail = detail_rows(&report);
        assert_eq!(detail[0].trips, "1 [critical]");
        assert_eq!(detail[0].inactivity, "0");
        let summary = summary_rows(&report);
        assert_eq!(summary[0].revenue, "10.00");
        assert_eq!(summary[0].last_trip, "2024-03-01");
    }
}
