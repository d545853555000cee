use chrono::{DateTime, Utc};
use rand::Rng;

pub const PICKUP_CODE_LENGTH: usize = 6;

/// A random six digit code. Codes never start with a zero, so they survive being read out or typed as a number.
pub fn generate_pickup_code<R: Rng>(rng: &mut R) -> String {
    rng.gen_range(100_000..1_000_000u32).to_string()
}

pub fn is_valid_pickup_code(code: &str) -> bool {
    code.len() == PICKUP_CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

/// Compares two codes without short-circuiting on the first differing byte.
pub fn codes_match(expected: &str, presented: &str) -> bool {
    let (expected, presented) = (expected.as_bytes(), presented.as_bytes());
    expected.len() == presented.len() && expected.iter().zip(presented).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

/// An opaque settlement reference, unique per run: the settlement time plus a random suffix.
pub fn new_settlement_ref<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> String {
    format!("SETTLE_{}_{:08X}", now.timestamp_millis(), rng.gen::<u32>())
}
