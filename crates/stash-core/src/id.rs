//! ULID generation for time-ordered item identifiers.
//!
//! Item ids are 26-character Crockford base32 ULIDs. The millisecond
//! timestamp prefix makes the canonical string form sort lexicographically
//! by creation time, which the search endpoints rely on for stable ids and
//! which keeps primary-key inserts append-mostly.
//!
//! # ULID Structure
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      32_bit_uint_time_high                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     16_bit_uint_time_low      |       16_bit_uint_random      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       32_bit_uint_random                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       32_bit_uint_random                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Generation is monotonic within the process: two calls inside the same
//! millisecond produce strictly increasing ids by incrementing the random
//! component, so sub-millisecond creation order is preserved.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};
use rand::{rngs::OsRng, RngCore};

use crate::error::{Error, Result};

/// Canonical length of an item id.
pub const ITEM_ID_LEN: usize = 26;

/// Crockford base32 alphabet (no I, L, O, U).
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Mask for the 80-bit random component.
const RANDOM_MASK: u128 = (1 << 80) - 1;

/// Last generated (millis, random) pair, for monotonic ordering.
struct LastId {
    millis: u64,
    random: u128,
}

static LAST_ID: Mutex<LastId> = Mutex::new(LastId {
    millis: 0,
    random: 0,
});

/// Generate a new item identifier.
///
/// Ids generated later (from the same process, at sub-millisecond
/// resolution) are lexicographically greater. Fails only if the system
/// clock reads before the Unix epoch, the OS entropy source fails, or the
/// random component overflows within a single millisecond; each of those
/// is fatal to the calling request, not to the process.
pub fn new_item_id() -> Result<String> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::IdGeneration(format!("system clock before Unix epoch: {}", e)))?
        .as_millis() as u64;

    if millis >= 1u64 << 48 {
        return Err(Error::IdGeneration(format!(
            "timestamp {} exceeds 48-bit ULID range",
            millis
        )));
    }

    let mut last = LAST_ID
        .lock()
        .map_err(|_| Error::IdGeneration("id generator state poisoned".to_string()))?;

    let random = if millis > last.millis {
        let mut buf = [0u8; 10];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| Error::IdGeneration(format!("entropy source failed: {}", e)))?;
        let mut random: u128 = 0;
        for byte in buf {
            random = (random << 8) | byte as u128;
        }
        last.millis = millis;
        random
    } else {
        // Same millisecond, or the clock stepped backwards: keep the last
        // timestamp and increment the random component so ordering holds.
        if last.random == RANDOM_MASK {
            return Err(Error::IdGeneration(
                "random component overflow within one millisecond".to_string(),
            ));
        }
        last.random + 1
    };
    last.random = random;

    let value = ((last.millis as u128) << 80) | random;
    Ok(encode(value))
}

/// Encode a 128-bit value as 26 Crockford base32 characters.
fn encode(value: u128) -> String {
    let mut out = [0u8; ITEM_ID_LEN];
    for (i, slot) in out.iter_mut().enumerate() {
        let shift = 5 * (ITEM_ID_LEN - 1 - i);
        *slot = ALPHABET[((value >> shift) & 0x1F) as usize];
    }
    // ALPHABET is ASCII, so the buffer is always valid UTF-8
    String::from_utf8_lossy(&out).into_owned()
}

/// Decode a single Crockford base32 character.
fn decode_char(c: u8) -> Option<u128> {
    ALPHABET.iter().position(|&a| a == c).map(|p| p as u128)
}

/// Check that a string is a well-formed item id.
pub fn is_valid_item_id(id: &str) -> bool {
    id.len() == ITEM_ID_LEN
        && id.bytes().all(|b| decode_char(b).is_some())
        // 26 chars hold 130 bits; the top 2 must be zero
        && id.as_bytes()[0] <= b'7'
}

/// Extract the millisecond timestamp from an item id.
///
/// Returns `None` if the id is malformed.
pub fn extract_millis(id: &str) -> Option<u64> {
    if !is_valid_item_id(id) {
        return None;
    }
    // First 10 characters encode the 48-bit timestamp
    let mut millis: u128 = 0;
    for b in id.as_bytes().iter().take(10) {
        millis = (millis << 5) | decode_char(*b)?;
    }
    Some(millis as u64)
}

/// Extract the creation timestamp from an item id.
///
/// Returns `None` if the id is malformed or the embedded timestamp is out
/// of `chrono`'s representable range.
pub fn extract_timestamp(id: &str) -> Option<DateTime<Utc>> {
    let millis = extract_millis(id)?;
    Utc.timestamp_millis_opt(millis as i64).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashSet;

    #[test]
    fn test_id_shape() {
        let id = new_item_id().expect("should generate");
        assert_eq!(id.len(), ITEM_ID_LEN);
        assert!(is_valid_item_id(&id));
        assert!(id.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_ids_strictly_increase() {
        let mut prev = new_item_id().expect("should generate");
        for _ in 0..1000 {
            let next = new_item_id().expect("should generate");
            assert!(next > prev, "{} should sort after {}", next, prev);
            prev = next;
        }
    }

    #[test]
    fn test_ids_unique() {
        let ids: HashSet<String> = (0..1000)
            .map(|_| new_item_id().expect("should generate"))
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_later_millisecond_sorts_after() {
        let id1 = new_item_id().expect("should generate");
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = new_item_id().expect("should generate");
        assert!(id2 > id1);
    }

    #[test]
    fn test_timestamp_extraction() {
        let before = Utc::now();
        let id = new_item_id().expect("should generate");
        let after = Utc::now();

        let extracted = extract_timestamp(&id).expect("should extract timestamp");
        assert!(extracted >= before - Duration::milliseconds(1));
        assert!(extracted <= after + Duration::milliseconds(1));
    }

    #[test]
    fn test_extract_rejects_malformed() {
        assert!(extract_millis("").is_none());
        assert!(extract_millis("not-an-id").is_none());
        // Right length, invalid alphabet (contains 'U')
        assert!(extract_millis("0000000000000000000000000U").is_none());
        // Top bits set
        assert!(extract_millis("ZZZZZZZZZZZZZZZZZZZZZZZZZZ").is_none());
    }

    #[test]
    fn test_encode_round_trip() {
        let millis = 1706000000000u64;
        let value = (millis as u128) << 80 | 42;
        let id = encode(value);
        assert_eq!(extract_millis(&id), Some(millis));
    }
}
