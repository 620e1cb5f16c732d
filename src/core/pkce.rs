//! PKCE S256 and state generation
//!
//! Implements the `S256` method of RFC 7636. Verifiers and states are both
//! 32 cryptographically random bytes encoded as base64url without padding,
//! so each is exactly 43 characters.

use base64::Engine as _;
use rand::RngCore as _;
use sha2::{Digest, Sha256};

/// The only supported challenge method.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

fn random_url_safe_string() -> String {
    let mut random_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut random_bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Generates a fresh code verifier.
///
/// # Examples
///
/// ```
/// let verifier = logto::core::pkce::generate_code_verifier();
/// assert_eq!(verifier.len(), 43);
/// ```
pub fn generate_code_verifier() -> String {
    random_url_safe_string()
}

/// Derives the `S256` code challenge: `BASE64URL(SHA256(ASCII(verifier)))`.
///
/// # Examples
///
/// ```
/// use logto::core::pkce::generate_code_challenge;
///
/// assert_eq!(
///     generate_code_challenge("code_verifier"),
///     "73oehA2tBul5grZPhXUGQwNAjxh69zNES8bu2bVD0EM"
/// );
/// ```
pub fn generate_code_challenge(code_verifier: &str) -> String {
    let digest = Sha256::digest(code_verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest.as_slice())
}

/// Generates an anti-CSRF state value, independent of any verifier.
pub fn generate_state() -> String {
    random_url_safe_string()
}
