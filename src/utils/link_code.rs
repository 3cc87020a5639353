// Random uppercase alphanumeric codes for affiliate links and affiliate identities

use rand::{thread_rng, Rng};

/// Code alphabet: A-Z, 0-9 (36 characters)
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Longest code accepted anywhere in the system (column width)
pub const MAX_CODE_LENGTH: usize = 32;

// =============================================================================
// CODE SOURCE
// =============================================================================

/// Produces candidate codes. Uniqueness is checked by the caller against the store.
pub trait CodeSource: Send + Sync {
    fn next_code(&self, length: usize) -> String;
}

/// Uniformly random codes drawn from [`CODE_ALPHABET`]
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeSource;

impl CodeSource for RandomCodeSource {
    fn next_code(&self, length: usize) -> String {
        generate_code(length)
    }
}

pub fn generate_code(length: usize) -> String {
    let mut rng = thread_rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

// =============================================================================
// VALIDATION
// =============================================================================

/// True when `code` has exactly `length` characters, all from the code alphabet
pub fn is_valid_code(code: &str, length: usize) -> bool {
    code.len() == length && code.bytes().all(is_code_byte)
}

/// Looser check used for codes whose length is configured elsewhere
pub fn is_plausible_code(code: &str) -> bool {
    !code.is_empty() && code.len() <= MAX_CODE_LENGTH && code.bytes().all(is_code_byte)
}

fn is_code_byte(b: u8) -> bool {
    b.is_ascii_uppercase() || b.is_ascii_digit()
}
