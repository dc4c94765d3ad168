// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Confirmation codes.

use rand::Rng;

/// No 0/O, 1/I/L: codes get read back over the phone and typed into chat.
const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

const CODE_LEN: usize = 6;

/// Short human-readable code, unique enough for reply matching.
pub fn generate_confirmation_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_are_six_chars_from_the_unambiguous_alphabet() {
        for _ in 0..200 {
            let code = generate_confirmation_code();
            assert_eq!(code.len(), 6);
            for c in code.bytes() {
                assert!(ALPHABET.contains(&c), "unexpected char in {code}");
            }
            for forbidden in ['0', 'O', '1', 'I', 'L'] {
                assert!(!code.contains(forbidden), "{code}");
            }
        }
    }

    #[test]
    fn codes_vary() {
        let codes: HashSet<String> = (0..50).map(|_| generate_confirmation_code()).collect();
        // 31^6 possibilities; 50 draws colliding down to 1 would mean a
        // broken generator.
        assert!(codes.len() > 40);
    }
}
