//! Fixed threshold bands for unit KPIs.
//!
//! Lower bounds are inclusive: a value sitting on a lower bound belongs to the
//! band that starts there. Middle bands are closed (`3..=5` trips,
//! `5,000..=8,000` km).

use crate::types::UnitSummary;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Trips at or above this count leave the low band.
pub const TRIPS_MID_FROM: usize = 3;
/// Trips above this count are high.
pub const TRIPS_MID_TO: usize = 5;
/// Revenue at or above this amount is high.
pub const REVENUE_HIGH_FROM: f64 = 4_000_000.0;
pub const DISTANCE_MID_FROM: f64 = 5_000.0;
pub const DISTANCE_MID_TO: f64 = 8_000.0;
/// Inactivity beyond this many days is flagged.
pub const INACTIVITY_FLAG_AFTER: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Low,
    Mid,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InactivityFlag {
    Normal,
    Flagged,
}

/// Semaphore colour for one metric of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Good,
    Neutral,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Good => "good",
            Severity::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

pub fn trips_band(trips: usize) -> Band {
    if trips < TRIPS_MID_FROM {
        Band::Low
    } else if trips > TRIPS_MID_TO {
        Band::High
    } else {
        Band::Mid
    }
}

pub fn revenue_band(revenue: f64) -> Band {
    if revenue < REVENUE_HIGH_FROM {
        Band::Low
    } else {
        Band::High
    }
}

pub fn distance_band(km: f64) -> Band {
    if km < DISTANCE_MID_FROM {
        Band::Low
    } else if km > DISTANCE_MID_TO {
        Band::High
    } else {
        Band::Mid
    }
}

pub fn inactivity_flag(days: i64) -> InactivityFlag {
    if days > INACTIVITY_FLAG_AFTER {
        InactivityFlag::Flagged
    } else {
        InactivityFlag::Normal
    }
}

// Chart labels, one per band.

pub fn trips_label(band: Band) -> &'static str {
    match band {
        Band::Low => "< 3",
        Band::Mid => "3-5",
        Band::High => "> 5",
    }
}

pub fn revenue_label(band: Band) -> &'static str {
    match band {
        Band::Low => "< $4M",
        // Revenue has no middle band.
        Band::Mid | Band::High => ">= $4M",
    }
}

pub fn distance_label(band: Band) -> &'static str {
    match band {
        Band::Low => "< 5k",
        Band::Mid => "5k-8k",
        Band::High => "> 8k",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Semaphore {
    pub trips: Severity,
    pub revenue: Severity,
    pub distance: Severity,
    pub inactivity: Severity,
}

/// Band assignment for every metric of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnitCategories {
    pub trips: Band,
    pub revenue: Band,
    pub distance: Band,
    pub inactivity: InactivityFlag,
}

impl UnitCategories {
    pub fn semaphore(&self) -> Semaphore {
        Semaphore {
            trips: match self.trips {
                Band::Low => Severity::Critical,
                Band::Mid => Severity::Warning,
                Band::High => Severity::Good,
            },
            revenue: match self.revenue {
                Band::Low => Severity::Critical,
                Band::Mid | Band::High => Severity::Good,
            },
            distance: match self.distance {
                Band::Low => Severity::Critical,
                Band::Mid => Severity::Neutral,
                Band::High => Severity::Good,
            },
            inactivity: match self.inactivity {
                InactivityFlag::Flagged => Severity::Critical,
                InactivityFlag::Normal => Severity::Neutral,
            },
        }
    }
}

pub fn categorize(summary: &UnitSummary) -> UnitCategories {
    UnitCategories {
        trips: trips_band(summary.trip_count),
        revenue: revenue_band(summary.total_revenue),
        distance: distance_band(summary.total_distance),
        inactivity: inactivity_flag(summary.inactivity_days),
    }
}

/// Units per band label, one histogram per metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Distribution {
    pub trips: BTreeMap<&'static str, usize>,
    pub revenue: BTreeMap<&'static str, usize>,
    pub distance: BTreeMap<&'static str, usize>,
}

pub fn distribution(categories: &[UnitCategories]) -> Distribution {
    let mut dist = Distribution::default();
    for c in categories {
        *dist.trips.entry(trips_label(c.trips)).or_insert(0) += 1;
        *dist.revenue.entry(revenue_label(c.revenue)).or_insert(0) += 1;
        *dist.distance.entry(distance_label(c.distance)).or_insert(0) += 1;
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_trip_bands_at_boundaries() {
        assert_eq!(trips_band(0), Band::Low);
        assert_eq!(trips_band(2), Band::Low);
        assert_eq!(trips_band(3), Band::Mid);
        assert_eq!(trips_band(5), Band::Mid);
        assert_eq!(trips_band(6), Band::High);
    }

    #[test]
    fn test_revenue_has_two_bands() {
        assert_eq!(revenue_band(3_999_999.99), Band::Low);
        assert_eq!(revenue_band(4_000_000.0), Band::High);
        assert_eq!(revenue_label(revenue_band(0.0)), "< $4M");
    }

    #[test]
    fn test_distance_bands_at_boundaries() {
        assert_eq!(distance_band(4_999.9), Band::Low);
        assert_eq!(distance_band(5_000.0), Band::Mid);
        assert_eq!(distance_band(8_000.0), Band::Mid);
        assert_eq!(distance_band(8_000.1), Band::High);
    }

    #[test]
    fn test_inactivity_flag() {
        assert_eq!(inactivity_flag(7), InactivityFlag::Normal);
        assert_eq!(inactivity_flag(8), InactivityFlag::Flagged);
    }

    #[test]
    fn test_categorize_is_stable() {
        let summary = UnitSummary {
            unit_id: "A".to_string(),
            trip_count: 4,
            total_revenue: 4_500_000.0,
            total_distance: 2_000.0,
            last_trip_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            inactivity_days: 10,
        };
        let first = categorize(&summary);
        assert_eq!(first, categorize(&summary));
        assert_eq!(
            first.semaphore(),
            Semaphore {
                trips: Severity::Warning,
                revenue: Severity::Good,
                distance: Severity::Critical,
                inactivity: Severity::Critical,
            }
        );
    }

    #[test]
    fn test_distribution_counts_units_per_label() {
        let c = |trips, km| UnitCategories {
            trips: trips_band(trips),
            revenue: revenue_band(0.0),
            distance: distance_band(km),
            inactivity: InactivityFlag::Normal,
        };
        let dist = distribution(&[c(1, 100.0), c(4, 6_000.0), c(9, 9_000.0), c(2, 5_000.0)]);
        assert_eq!(dist.trips.get("< 3"), Some(&2));
        assert_eq!(dist.trips.get("3-5"), Some(&1));
        assert_eq!(dist.trips.get("> 5"), Some(&1));
        assert_eq!(dist.revenue.get("< $4M"), Some(&4));
        assert_eq!(dist.distance.get("5k-8k"), Some(&2));
    }
}
