//! Session identifier generation
//!
//! Identifiers double as the durable token a user keeps to resume a session,
//! so they must not be guessable: each one carries 366 bits of OS randomness
//! from three v4 UUIDs.

use uuid::Uuid;

/// Fixed prefix of every session identifier
pub const SESSION_ID_PREFIX: &str = "PAIRLINK-";

/// Number of hex characters after the prefix
pub const SESSION_ID_HEX_LEN: usize = 96;

/// Generate a fresh session identifier
pub fn generate_session_id() -> String {
    let mut id = String::with_capacity(SESSION_ID_PREFIX.len() + SESSION_ID_HEX_LEN);
    id.push_str(SESSION_ID_PREFIX);
    for _ in 0..3 {
        id.push_str(&Uuid::new_v4().simple().to_string());
    }
    id
}

/// Whether `id` has the shape of a generated identifier
pub fn is_well_formed(id: &str) -> bool {
    id.strip_prefix(SESSION_ID_PREFIX).is_some_and(|hex| {
        hex.len() == SESSION_ID_HEX_LEN
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    })
}
