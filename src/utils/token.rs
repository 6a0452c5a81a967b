use base64::engine::{general_purpose, Engine as _};
use rand::RngCore;

/// Returns `nbytes` of OS-seeded randomness, base64 URL-safe encoded without padding.
pub fn token_urlsafe(nbytes: usize) -> String {
    let mut bytes = vec![0u8; nbytes];
    rand::rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
