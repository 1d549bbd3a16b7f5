//! GTFS-realtime trip updates to train [`ArrivalRecord`]s.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{eta_seconds, sort_and_cap};
use crate::arrival::{ArrivalRecord, Direction};
use crate::error::Result;
use crate::gtfs_rt::trip_descriptor::ScheduleRelationship as TripRelationship;
use crate::gtfs_rt::trip_update::StopTimeUpdate;
use crate::gtfs_rt::trip_update::stop_time_update::ScheduleRelationship as StopRelationship;
use crate::gtfs_rt::{FeedMessage, TripUpdate};

/// Maps a platform stop id to a direction for `station_id`.
///
/// NYCT encodes direction as a suffix on the parent station id: `R16N` is the
/// northbound (Uptown) platform of `R16`, `R16S` the southbound one. This is
/// an upstream naming convention, not something the feed describes, so it is
/// kept in this one place. Any other stop id returns `None`.
pub fn direction_for_stop(stop_id: &str, station_id: &str) -> Option<Direction> {
    match stop_id.strip_prefix(station_id)? {
        "N" => Some(Direction::Uptown),
        "S" => Some(Direction::Downtown),
        _ => None,
    }
}

/// Collects upcoming arrivals at `station_id` from a decoded feed.
///
/// Trip updates without a route id, cancelled trips, skipped stops and events
/// without a time are ignored. `route_filter` must match the route id
/// exactly; case is significant for subway route ids.
pub fn normalize_train(
    feed: &FeedMessage,
    station_id: &str,
    route_filter: Option<&str>,
    max_results: usize,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<ArrivalRecord>> {
    let records = feed
        .entity
        .iter()
        .filter(|e| !e.is_deleted.unwrap_or(false))
        .filter_map(|e| e.trip_update.as_ref())
        .filter_map(|update| train_arrival(update, station_id, route_filter, fetched_at))
        .collect();

    Ok(sort_and_cap(records, max_results))
}

fn train_arrival(
    update: &TripUpdate,
    station_id: &str,
    route_filter: Option<&str>,
    fetched_at: DateTime<Utc>,
) -> Option<ArrivalRecord> {
    let Some(route) = update.trip.route_id.as_deref().filter(|r| !r.is_empty()) else {
        debug!(trip_id = ?update.trip.trip_id, "Skipping trip update without route_id");
        return None;
    };
    if route_filter.is_some_and(|f| f != route) {
        return None;
    }
    if matches!(
        update.trip.schedule_relationship(),
        TripRelationship::Canceled | TripRelationship::Deleted
    ) {
        return None;
    }

    let (direction, time) = update
        .stop_time_update
        .iter()
        .find_map(|stu| station_event(stu, station_id))?;

    let predicted = DateTime::from_timestamp(time, 0)?;
    Some(ArrivalRecord::train(
        route,
        eta_seconds(predicted, fetched_at),
        direction,
    ))
}

/// Direction and predicted epoch time of a stop-time update at this station.
fn station_event(stu: &StopTimeUpdate, station_id: &str) -> Option<(Direction, i64)> {
    let direction = direction_for_stop(stu.stop_id.as_deref()?, station_id)?;
    if stu.schedule_relationship() == StopRelationship::Skipped {
        return None;
    }
    let time = stu
        .arrival
        .as_ref()
        .and_then(|a| a.time)
        .or_else(|| stu.departure.as_ref().and_then(|d| d.time))?;
    Some((direction, time))
}
