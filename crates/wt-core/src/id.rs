//! Short random identifiers for sessions and focus intervals.

use rand::Rng;

const ID_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ID_LEN: usize = 6;

/// Generates a 6-character identifier drawn uniformly from `A-Z0-9`.
///
/// Not cryptographically unique; collision probability is accepted as
/// negligible for the expected session volume. Callers must not assume
/// global uniqueness beyond that.
#[must_use]
pub fn new_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ID_CHARS.len());
            char::from(ID_CHARS[idx])
        })
        .collect()
}
