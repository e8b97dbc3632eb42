//! License code generation and normalization.
//!
//! Codes are the activation secret a customer types into a collector, so
//! they come from a CSPRNG and use an alphabet with no visually ambiguous
//! characters (no `0`/`O`, no `1`/`I`). Uniqueness is enforced by the
//! entitlement store's unique index, not here; a collision surfaces as a
//! `Conflict` and the caller retries with a fresh code.

use rand::rngs::OsRng;
use rand::Rng;

/// Length of a license code, in characters.
pub const CODE_LENGTH: usize = 32;

/// Characters a license code may contain.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Display grouping width: `ABCD-EFGH-...`.
const GROUP_SIZE: usize = 4;

/// Generate a new license code from the OS random source.
pub fn generate_license_code() -> String {
    let mut rng = OsRng;
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Group a code into fixed-width chunks for human transcription.
///
/// Example: `ABCDEFGH...` becomes `ABCD-EFGH-...`.
pub fn format_for_display(code: &str) -> String {
    code.as_bytes()
        .chunks(GROUP_SIZE)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("-")
}

/// Strip separators and upper-case a code for comparison.
///
/// Inverse of [`format_for_display`]: `normalize(format_for_display(c)) == c`
/// for every generated code.
pub fn normalize(code: &str) -> String {
    code.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Check that a (possibly formatted) code has the expected shape.
pub fn is_well_formed(code: &str) -> bool {
    let clean = normalize(code);
    clean.len() == CODE_LENGTH && clean.bytes().all(|b| CODE_ALPHABET.contains(&b))
}
