//! Source-specific payloads to canonical [`ArrivalRecord`]s.
//!
//! Both normalizers follow the same shape: skip records they cannot use,
//! filter by route, then [`sort_and_cap`] the survivors.

pub mod bus;
pub mod train;

pub use bus::normalize_bus;
pub use train::{direction_for_stop, normalize_train};

use chrono::{DateTime, Utc};

use crate::arrival::ArrivalRecord;

/// Stable ascending sort by ETA followed by truncation to `max_results`.
///
/// Records with equal ETAs keep their source order.
pub fn sort_and_cap(mut records: Vec<ArrivalRecord>, max_results: usize) -> Vec<ArrivalRecord> {
    records.sort_by_key(|r| r.eta_seconds);
    records.truncate(max_results);
    records
}

/// Seconds from `fetched_at` until `predicted`, clamped at zero.
pub(crate) fn eta_seconds(predicted: DateTime<Utc>, fetched_at: DateTime<Utc>) -> u64 {
    (predicted - fetched_at).num_seconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sort_and_cap_keeps_source_order_on_ties() {
        let records = vec![
            ArrivalRecord::bus("B1", 300, "a", None),
            ArrivalRecord::bus("B2", 60, "b", None),
            ArrivalRecord::bus("B3", 300, "c", None),
            ArrivalRecord::bus("B4", 60, "d", None),
        ];

        let sorted = sort_and_cap(records, 10);
        let routes: Vec<_> = sorted.iter().map(|r| r.route.as_str()).collect();
        assert_eq!(routes, ["B2", "B4", "B1", "B3"]);
    }

    #[test]
    fn test_sort_and_cap_truncates_after_sorting() {
        let records = vec![
            ArrivalRecord::bus("B1", 500, "a", None),
            ArrivalRecord::bus("B2", ArrivalRecord::UNKNOWN_ETA, "b", None),
            ArrivalRecord::bus("B3", 10, "c", None),
        ];

        let sorted = sort_and_cap(records, 2);
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0].route, "B3");
        assert_eq!(sorted[1].route, "B1");
    }

    #[test]
    fn test_eta_seconds_clamps_past_predictions() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap();
        let past = Utc.with_ymd_and_hms(2026, 10, 19, 13, 59, 0).unwrap();
        let future = Utc.with_ymd_and_hms(2026, 10, 19, 14, 3, 0).unwrap();

        assert_eq!(eta_seconds(past, now), 0);
        assert_eq!(eta_seconds(future, now), 180);
    }
}
