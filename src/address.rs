// src/address.rs

use regex::Regex;
use std::sync::LazyLock;

// Legacy pool addresses: a `1` or `3` prefix followed by 25-34 base58 characters.
// The base58 alphabet leaves out `0`, `O`, `I` and `l`.
static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[13][a-km-zA-HJ-NP-Z1-9]{25,34}$").expect("address pattern compiles")
});

/// Returns `true` when `address` is a syntactically well-formed pool address.
///
/// This is a shape check only; no checksum is verified. Surrounding whitespace
/// makes the address invalid, so callers trim lines before asking.
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_PATTERN.is_match(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_addresses() {
        assert!(is_valid_address("1BoatSLRHtKNngkdXEeobR76b53LETtpyT"));
        assert!(is_valid_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"));
        assert!(is_valid_address("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy"));
    }

    #[test]
    fn rejects_foreign_prefixes() {
        assert!(!is_valid_address("0xabc"));
        assert!(!is_valid_address("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"));
        assert!(!is_valid_address("2BoatSLRHtKNngkdXEeobR76b53LETtpyT"));
    }

    #[test]
    fn enforces_length_bounds() {
        // prefix + 25 is the shortest accepted form, prefix + 34 the longest
        let shortest = format!("1{}", "a".repeat(25));
        let longest = format!("1{}", "a".repeat(34));
        assert!(is_valid_address(&shortest));
        assert!(is_valid_address(&longest));
        assert!(!is_valid_address(&format!("1{}", "a".repeat(24))));
        assert!(!is_valid_address(&format!("1{}", "a".repeat(35))));
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("1"));
    }

    #[test]
    fn rejects_ambiguous_characters() {
        for bad in ['0', 'O', 'I', 'l'] {
            let candidate = format!("1BoatSLRHtKNngkdXEeobR76b53LETtpy{bad}");
            assert!(!is_valid_address(&candidate), "{candidate} should be rejected");
        }
    }

    #[test]
    fn rejects_surrounding_whitespace() {
        assert!(!is_valid_address(" 1BoatSLRHtKNngkdXEeobR76b53LETtpyT"));
        assert!(!is_valid_address("1BoatSLRHtKNngkdXEeobR76b53LETtpyT\n"));
    }
}
