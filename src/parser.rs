//! Decoders for the raw payloads returned by the fetchers.

use prost::Message;

use crate::error::Result;
use crate::gtfs_rt::FeedMessage;

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns [`ArrivalError::MalformedPayload`](crate::error::ArrivalError) if
/// the bytes are not valid protobuf for a `FeedMessage`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage> {
    Ok(FeedMessage::decode(bytes)?)
}

/// Parses a SIRI JSON response body into a generic JSON tree.
///
/// Only the handful of fields the bus normalizer needs are read later, so the
/// body is kept as a [`serde_json::Value`] instead of a full SIRI model.
pub fn parse_siri(bytes: &[u8]) -> Result<serde_json::Value> {
    Ok(serde_json::from_slice(bytes)?)
}
