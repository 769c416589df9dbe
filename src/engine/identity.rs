//! Pseudonymous game id derivation.

use sha2::{Digest, Sha512};

use crate::domain::{GameId, Uid};

/// Length of a derived game id in hex characters.
pub const GAME_ID_LEN: usize = 128;

/// Derive the game id for a masked phone number.
///
/// One-way and deterministic: `hex(SHA-512(len(uid) || uid))`. Only the uid
/// feeds the hash so the id survives name changes.
pub fn derive_game_id(uid: &Uid) -> GameId {
    let bytes = uid.as_str().as_bytes();
    let mut hasher = Sha512::new();
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
    GameId::new(hex::encode(hasher.finalize()))
}

/// True if `s` is a non-empty prefix of a derived game id.
pub fn is_game_id_prefix(s: &str) -> bool {
    !s.is_empty() && s.len() <= GAME_ID_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}
