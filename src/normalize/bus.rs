//! SIRI stop-monitoring JSON to bus [`ArrivalRecord`]s.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::{eta_seconds, sort_and_cap};
use crate::arrival::ArrivalRecord;
use crate::error::{ArrivalError, Result};

const DELIVERIES_POINTER: &str = "/Siri/ServiceDelivery/StopMonitoringDelivery";

/// Normalizes a SIRI stop-monitoring response into sorted bus arrivals.
///
/// Visits without a usable route are skipped. Visits without an
/// `ExpectedArrivalTime` are kept with [`ArrivalRecord::UNKNOWN_ETA`] so they
/// sort last. `route_filter` is compared case-insensitively, after dropping any
/// agency prefix such as `MTA NYCT_`, against both `PublishedLineName` and
/// `LineRef`.
///
/// # Errors
///
/// Returns [`ArrivalError::MalformedPayload`] when the response has no
/// `Siri.ServiceDelivery.StopMonitoringDelivery` array.
pub fn normalize_bus(
    payload: &Value,
    route_filter: Option<&str>,
    max_results: usize,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<ArrivalRecord>> {
    let deliveries = payload
        .pointer(DELIVERIES_POINTER)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ArrivalError::malformed("missing Siri.ServiceDelivery.StopMonitoringDelivery")
        })?;

    let filter = route_filter.map(strip_agency);

    let records = deliveries
        .iter()
        .filter_map(|d| d.get("MonitoredStopVisit").and_then(Value::as_array))
        .flatten()
        .filter(|visit| filter.is_none_or(|f| serves_route(visit, f)))
        .filter_map(|visit| bus_arrival(visit, fetched_at))
        .collect();

    Ok(sort_and_cap(records, max_results))
}

fn bus_arrival(visit: &Value, fetched_at: DateTime<Utc>) -> Option<ArrivalRecord> {
    let Some(journey) = visit.get("MonitoredVehicleJourney") else {
        debug!("Skipping stop visit without MonitoredVehicleJourney");
        return None;
    };
    let Some(route) = route_name(journey) else {
        debug!("Skipping stop visit without a route");
        return None;
    };

    let call = journey.get("MonitoredCall");
    let eta = call
        .and_then(|c| c.get("ExpectedArrivalTime"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| eta_seconds(t.with_timezone(&Utc), fetched_at))
        .unwrap_or(ArrivalRecord::UNKNOWN_ETA);

    let stops_away = call
        .and_then(|c| c.pointer("/Extensions/Distances/StopsFromCall"))
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok());

    let nearest_stop = journey
        .pointer("/OnwardCalls/OnwardCall/0/StopPointName")
        .and_then(text);

    let label = location_label(stops_away, nearest_stop);
    Some(ArrivalRecord::bus(route, eta, label, stops_away))
}

/// Route shown to riders: `PublishedLineName`, else `LineRef` without its
/// agency prefix.
fn route_name(journey: &Value) -> Option<&str> {
    journey
        .get("PublishedLineName")
        .and_then(text)
        .or_else(|| journey.get("LineRef").and_then(text).map(strip_agency))
        .filter(|r| !r.is_empty())
}

/// True when either `PublishedLineName` or the bare `LineRef` equals `route`.
///
/// Select Bus Service visits publish `M15-SBS` under the `LineRef`
/// `MTA NYCT_M15+`, so either spelling selects them.
fn serves_route(visit: &Value, route: &str) -> bool {
    let Some(journey) = visit.get("MonitoredVehicleJourney") else {
        return false;
    };
    let published = journey.get("PublishedLineName").and_then(text);
    let line_ref = journey.get("LineRef").and_then(text).map(strip_agency);
    [published, line_ref]
        .into_iter()
        .flatten()
        .any(|name| name.eq_ignore_ascii_case(route))
}

/// Drops an agency prefix: `"MTA NYCT_B69"` becomes `"B69"`.
pub fn strip_agency(line_ref: &str) -> &str {
    line_ref
        .split_once('_')
        .map_or(line_ref, |(_, route)| route)
        .trim()
}

/// SIRI JSON encodes some names as a one-element array of strings.
fn text(value: &Value) -> Option<&str> {
    let s = match value {
        Value::String(s) => Some(s.trim()),
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::trim),
        _ => None,
    };
    s.filter(|s| !s.is_empty())
}

/// Describes where the bus is relative to the monitored stop.
pub fn location_label(stops_away: Option<u32>, nearest_stop: Option<&str>) -> String {
    match (stops_away, nearest_stop) {
        (Some(0), _) => "approaching".to_string(),
        (_, Some(name)) => format!("at {name}"),
        (Some(1), None) => "1 stop away".to_string(),
        (Some(n), None) => format!("{n} stops away"),
        (None, None) => "in transit".to_string(),
    }
}
