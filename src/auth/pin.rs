//! PIN generation.

use rand::{rngs::OsRng, Rng};

/// Width of the organizer PIN handed to mission creators.
pub const ORGANIZER_PIN_DIGITS: usize = 4;

/// Width of the access PIN handed to field teams.
pub const ACCESS_PIN_DIGITS: usize = 6;

/// Generate a numeric PIN of `digits` characters from the OS CSPRNG.
///
/// Leading zeros are kept, so every code in `0..10^digits` is equally likely.
pub fn generate_pin(digits: usize) -> String {
    let mut rng = OsRng;
    (0..digits)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
