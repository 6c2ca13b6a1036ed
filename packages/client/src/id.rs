//! Time-ordered record identifiers.
//!
//! An id is an 8-digit timestamp prefix followed by random digits, all drawn
//! from one ordered alphabet, so comparing ids as strings compares their
//! timestamps.

use rand::Rng;

/// Digits in ascending byte order; the index of a character is its value.
pub const ID_ALPHABET: &[u8; 64] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz~";

/// Length of the timestamp prefix
pub const TIMESTAMP_DIGITS: usize = 8;

/// Length of the random suffix
pub const RANDOM_DIGITS: usize = 12;

/// Largest timestamp representable in the prefix (`64^8 - 1`)
pub const MAX_TIMESTAMP: i64 = (1 << (6 * TIMESTAMP_DIGITS)) - 1;

const RADIX: i64 = ID_ALPHABET.len() as i64;

/// Encode a millisecond timestamp into the fixed-width sortable prefix.
///
/// Negative timestamps clamp to zero; values past [`MAX_TIMESTAMP`] keep
/// their low digits.
pub fn encode_timestamp(timestamp_ms: i64) -> String {
    let mut remaining = timestamp_ms.max(0);
    let mut digits = [ID_ALPHABET[0]; TIMESTAMP_DIGITS];
    for digit in digits.iter_mut().rev() {
        *digit = ID_ALPHABET[(remaining % RADIX) as usize];
        remaining /= RADIX;
    }
    digits.iter().map(|&b| b as char).collect()
}

/// Build a full id for the given timestamp: the sortable prefix plus
/// [`RANDOM_DIGITS`] random characters.
pub fn make_id(timestamp_ms: i64) -> String {
    make_id_with(timestamp_ms, &mut rand::thread_rng())
}

/// Same as [`make_id`] with a caller-supplied random source.
pub fn make_id_with<R: Rng>(timestamp_ms: i64, rng: &mut R) -> String {
    let mut id = encode_timestamp(timestamp_ms);
    id.reserve(RANDOM_DIGITS);
    for _ in 0..RANDOM_DIGITS {
        id.push(ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char);
    }
    id
}

/// Timestamp prefix of an id, if it is long enough to carry one.
pub fn timestamp_prefix(id: &str) -> Option<&str> {
    id.get(..TIMESTAMP_DIGITS)
}
