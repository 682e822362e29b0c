use crate::types::{Period, Scope, TripRow, UnitSummary};
use crate::util::days_diff;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

/// Rows of `rows` that fall inside `scope`.
pub fn filter_scope<'a, R: TripRow>(rows: &'a [R], scope: &Scope) -> Vec<&'a R> {
    rows.iter().filter(|r| scope.contains(*r)).collect()
}

/// Per-unit KPIs for one scope, ordered by unit id.
///
/// Inactivity is measured against the latest date anywhere in the scope, so
/// the most recently active unit always reads 0. An empty scope gives an
/// empty result.
pub fn aggregate<R: TripRow>(rows: &[R], scope: &Scope) -> Vec<UnitSummary> {
    summarize(&filter_scope(rows, scope))
}

/// Group already-filtered rows by unit id.
fn summarize<R: TripRow>(rows: &[&R]) -> Vec<UnitSummary> {
    struct Acc {
        trips: usize,
        revenue: f64,
        distance: f64,
        last: NaiveDate,
    }

    // Rows without a unit id have no group to land in and do not move the
    // scope's reference date either.
    let grouped: Vec<&R> = rows
        .iter()
        .copied()
        .filter(|r| !r.trip().unit_id.is_empty())
        .collect();
    let Some(scope_last) = grouped.iter().map(|r| r.trip().date).max() else {
        return Vec::new();
    };

    let mut map: HashMap<&str, Acc> = HashMap::new();
    for r in grouped {
        let t = r.trip();
        let e = map.entry(t.unit_id.as_str()).or_insert(Acc {
            trips: 0,
            revenue: 0.0,
            distance: 0.0,
            last: t.date,
        });
        if t.trip_id.is_some() {
            e.trips += 1;
        }
        e.revenue += t.revenue;
        e.distance += t.distance;
        e.last = e.last.max(t.date);
    }

    let mut out: Vec<UnitSummary> = map
        .into_iter()
        .map(|(unit, acc)| UnitSummary {
            unit_id: unit.to_string(),
            trip_count: acc.trips,
            total_revenue: acc.revenue,
            total_distance: acc.distance,
            last_trip_date: acc.last,
            inactivity_days: days_diff(acc.last, scope_last),
        })
        .collect();
    out.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
    out
}

/// Periods present in the table, newest first.
pub fn periods<R: TripRow>(rows: &[R]) -> Vec<Period> {
    let set: BTreeSet<Period> = rows.iter().map(|r| r.trip().period).collect();
    set.into_iter().rev().collect()
}

/// Distinct group labels (business units, or classifications when joined),
/// sorted.
pub fn group_labels<R: TripRow>(rows: &[R]) -> Vec<String> {
    let set: BTreeSet<&str> = rows.iter().map(|r| r.group_label()).collect();
    set.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JoinedRecord, TripRecord};

    fn trip(unit: &str, bu: &str, date: (i32, u32, u32), trip_id: Option<&str>, revenue: f64, km: f64) -> TripRecord {
        let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        TripRecord {
            unit_id: unit.to_string(),
            business_unit: bu.to_string(),
            trip_id: trip_id.map(str::to_string),
            revenue,
            distance: km,
            date,
            period: Period::of(date),
            origin: None,
            destination: None,
            driver: None,
            client: None,
        }
    }

    fn bu_scope(period: &str, bu: &str) -> Scope {
        Scope::BusinessUnit {
            period: period.parse().unwrap(),
            business_unit: bu.to_string(),
        }
    }

    #[test]
    fn test_aggregate_groups_and_measures_inactivity() {
        let rows = vec![
            trip("A", "Norte", (2024, 3, 1), Some("1"), 100.0, 10.0),
            trip("A", "Norte", (2024, 3, 20), Some("2"), 50.0, 5.0),
            trip("B", "Norte", (2024, 3, 10), Some("3"), 10.0, 1.0),
            trip("B", "Norte", (2024, 3, 11), None, 5.0, 2.0),
            trip("C", "Sur", (2024, 3, 31), Some("4"), 1.0, 1.0),
            trip("A", "Norte", (2024, 4, 2), Some("5"), 1.0, 1.0),
        ];
        let out = aggregate(&rows, &bu_scope("2024-03", "Norte"));
        assert_eq!(out.len(), 2);

        let a = &out[0];
        assert_eq!(a.unit_id, "A");
        assert_eq!(a.trip_count, 2);
        assert_eq!(a.total_revenue, 150.0);
        assert_eq!(a.total_distance, 15.0);
        assert_eq!(a.inactivity_days, 0);

        let b = &out[1];
        assert_eq!(b.trip_count, 1);
        assert_eq!(b.total_revenue, 15.0);
        assert_eq!(b.last_trip_date, NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        assert_eq!(b.inactivity_days, 9);
    }

    #[test]
    fn test_min_inactivity_is_zero_and_never_negative() {
        let rows = vec![
            trip("X", "Norte", (2024, 5, 3), Some("1"), 0.0, 0.0),
            trip("Y", "Norte", (2024, 5, 28), Some("2"), 0.0, 0.0),
            trip("Z", "Norte", (2024, 5, 15), Some("3"), 0.0, 0.0),
        ];
        let out = aggregate(&rows, &bu_scope("2024-05", "Norte"));
        assert!(out.iter().all(|u| u.inactivity_days >= 0));
        assert_eq!(out.iter().map(|u| u.inactivity_days).min(), Some(0));
        let ids: BTreeSet<&str> = out.iter().map(|u| u.unit_id.as_str()).collect();
        assert_eq!(ids.len(), out.len());
    }

    #[test]
    fn test_empty_scope_gives_empty_result() {
        let rows = vec![trip("A", "Norte", (2024, 3, 1), Some("1"), 1.0, 1.0)];
        assert!(aggregate(&rows, &bu_scope("2024-03", "Sur")).is_empty());
        assert!(aggregate(&rows, &bu_scope("2023-03", "Norte")).is_empty());
        assert!(aggregate::<TripRecord>(&[], &bu_scope("2024-03", "Norte")).is_empty());
    }

    #[test]
    fn test_classification_scope_is_multi_select() {
        let joined = |unit: &str, class: &str| JoinedRecord {
            trip: trip(unit, "Norte", (2024, 6, 1), Some("1"), 1.0, 1.0),
            classification: class.to_string(),
        };
        let rows = vec![joined("A", "Spot"), joined("B", "Dedicado"), joined("C", "Local")];
        let scope = Scope::Classifications {
            period: "2024-06".parse().unwrap(),
            labels: ["Spot", "Dedicado"].iter().map(|s| s.to_string()).collect(),
        };
        let out = aggregate(&rows, &scope);
        let ids: Vec<&str> = out.iter().map(|u| u.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn test_selectors() {
        let rows = vec![
            trip("A", "Sur", (2024, 1, 1), Some("1"), 1.0, 1.0),
            trip("A", "Norte", (2024, 3, 1), Some("2"), 1.0, 1.0),
            trip("B", "Norte", (2023, 12, 1), Some("3"), 1.0, 1.0),
        ];
        let ps: Vec<String> = periods(&rows).iter().map(|p| p.to_string()).collect();
        assert_eq!(ps, vec!["2024-03", "2024-01", "2023-12"]);
        assert_eq!(group_labels(&rows), vec!["Norte", "Sur"]);
    }

    #[test]
    fn test_blank_unit_ids_are_not_grouped() {
        let rows = vec![
            trip("", "Norte", (2024, 3, 30), Some("1"), 1.0, 1.0),
            trip("A", "Norte", (2024, 3, 1), Some("2"), 1.0, 1.0),
        ];
        let out = aggregate(&rows, &bu_scope("2024-03", "Norte"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].inactivity_days, 0);
    }
}
