//! Permalink slug generation.

use rand::Rng;

/// Number of characters in a generated slug.
pub const SLUG_LENGTH: usize = 13;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a random, URL-safe base-36 slug.
///
/// 13 base-36 characters carry about 67 bits of randomness; the `items.slug`
/// unique index still guards against the rare collision, which the insert
/// path skips instead of failing.
pub fn generate_slug() -> String {
    let mut rng = rand::rng();
    (0..SLUG_LENGTH)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect()
}
