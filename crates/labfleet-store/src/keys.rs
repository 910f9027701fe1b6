//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions to encode and decode keys for the various
//! indexes. All composite keys use big-endian integer encodings so that
//! byte order matches numeric order, which makes the reconciler's
//! time-bounded selections plain prefix scans.

use chrono::{DateTime, Utc};
use labfleet_core::{AgentId, BookingId, UserId};

/// Encode a user key (big-endian user id).
#[must_use]
pub fn user_key(user_id: UserId) -> [u8; 8] {
    user_id.to_be_bytes()
}

/// Encode an email index key (raw email bytes).
#[must_use]
pub fn email_key(email: &str) -> Vec<u8> {
    email.as_bytes().to_vec()
}

/// Encode an agent key (big-endian agent id).
#[must_use]
pub fn agent_key(agent_id: AgentId) -> [u8; 8] {
    agent_id.to_be_bytes()
}

/// Encode a status-agent index key: `status || agent_id`.
#[must_use]
pub fn status_agent_key(status: u8, agent_id: AgentId) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(status);
    key.extend_from_slice(&agent_id.to_be_bytes());
    key
}

/// Encode a single-byte status prefix.
#[must_use]
pub fn status_prefix(status: u8) -> Vec<u8> {
    vec![status]
}

/// Encode a booking key (big-endian booking id).
#[must_use]
pub fn booking_key(booking_id: BookingId) -> [u8; 8] {
    booking_id.to_be_bytes()
}

/// Encode a user-booking index key: `user_id || booking_id`.
#[must_use]
pub fn user_booking_key(user_id: UserId, booking_id: BookingId) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&user_id.to_be_bytes());
    key.extend_from_slice(&booking_id.to_be_bytes());
    key
}

/// Encode a user prefix for scanning all bookings by owner.
#[must_use]
pub fn user_prefix(user_id: UserId) -> Vec<u8> {
    user_id.to_be_bytes().to_vec()
}

/// Encode a timestamp for use in ordered keys.
///
/// The sign bit is flipped so that negative timestamps (pre-epoch) still
/// sort before positive ones under unsigned byte comparison.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn timestamp_bytes(ts: DateTime<Utc>) -> [u8; 8] {
    ((ts.timestamp() as u64) ^ (1 << 63)).to_be_bytes()
}

/// Encode a status-time index key: `status || timestamp || booking_id`.
#[must_use]
pub fn status_time_key(status: u8, ts: DateTime<Utc>, booking_id: BookingId) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.push(status);
    key.extend_from_slice(&timestamp_bytes(ts));
    key.extend_from_slice(&booking_id.to_be_bytes());
    key
}

/// Extract the booking id from the trailing 8 bytes of an index key.
///
/// # Panics
///
/// Panics if the key is shorter than 8 bytes.
#[must_use]
pub fn booking_id_from_index_key(key: &[u8]) -> BookingId {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&key[key.len() - 8..]);
    BookingId::new(u64::from_be_bytes(bytes))
}

/// Extract the agent id from a status-agent index key.
///
/// # Panics
///
/// Panics if the key is not at least 9 bytes.
#[must_use]
pub fn agent_id_from_status_key(key: &[u8]) -> AgentId {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&key[1..9]);
    AgentId::new(u64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_time_keys_sort_by_time() {
        let id = BookingId::new(1);
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();

        let k1 = status_time_key(2, early, id);
        let k2 = status_time_key(2, late, id);
        assert!(k1 < k2);
    }

    #[test]
    fn booking_id_roundtrip_through_index_key() {
        let id = BookingId::new(4096);
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let key = status_time_key(3, ts, id);
        assert_eq!(key.len(), 17);
        assert_eq!(booking_id_from_index_key(&key), id);
    }

    #[test]
    fn user_booking_key_has_user_prefix() {
        let user = UserId::new(9);
        let key = user_booking_key(user, BookingId::new(77));
        assert!(key.starts_with(&user_prefix(user)));
        assert_eq!(booking_id_from_index_key(&key), BookingId::new(77));
    }

    #[test]
    fn agent_id_roundtrip_through_status_key() {
        let agent = AgentId::new(12);
        let key = status_agent_key(1, agent);
        assert_eq!(agent_id_from_status_key(&key), agent);
    }
}
