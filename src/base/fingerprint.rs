//! One-way fingerprints of submitter identities.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::types::Res;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of the submitter's platform user id, keyed by `secret`.
///
/// Always 64 characters. Without the secret, a fingerprint cannot be matched
/// against a list of known user ids. Used for display only; never looked up.
pub fn fingerprint(secret: &str, user_id: &str) -> Res<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| anyhow::anyhow!("Invalid fingerprint secret: {}", e))?;
    mac.update(user_id.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// The prefix of a fingerprint shown on review cards.
pub fn display_prefix(fingerprint: &str, len: usize) -> &str {
    let end = fingerprint.char_indices().nth(len).map(|(i, _)| i).unwrap_or(fingerprint.len());
    &fingerprint[..end]
}
