//! Secret handling: comparison, generation and masking.

use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt::Write;
use subtle::ConstantTimeEq;

/// Default number of random bytes in a generated token.
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// Compare two secrets in constant time.
///
/// Only the lengths are compared eagerly; the contents are always compared in
/// full, whatever the position of the first difference.
pub fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// `len` bytes from the operating system RNG as lowercase hex.
///
/// The result is always `2 * len` characters long.
pub fn generate_secure_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);

    bytes.iter().fold(String::with_capacity(len * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

/// Obscure a secret for logs, keeping the first and last four characters of
/// long values.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}****{}", head, tail)
}
