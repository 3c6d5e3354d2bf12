//! Random identifiers for collision-resistant file names.

use rand::prelude::RngExt;
use rand::rng;

use crate::Toolkit;

/// 64 symbols: letters, digits, `_` and `+`
const RANDOM_STRING_SOURCE: &[u8; 64] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_+";

impl Toolkit {
    /// Returns `n` characters drawn uniformly and independently from [`RANDOM_STRING_SOURCE`]
    /// using the thread-local CSPRNG.
    pub fn random_string(&self, n: usize) -> String {
        let mut rng = rng();
        (0..n)
            .map(|_| RANDOM_STRING_SOURCE[rng.random_range(0..RANDOM_STRING_SOURCE.len())] as char)
            .collect()
    }
}
