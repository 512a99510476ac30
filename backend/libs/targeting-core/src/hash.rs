use sha2::{Digest, Sha256};

/// Stable content digest of a pathname, used as the manifest lookup key.
pub fn path_hash(pathname: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pathname.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fast non-cryptographic 32-bit string hash.
///
/// Accumulates `h = (h << 5) - h + unit` over UTF-16 code units with
/// wrapping arithmetic, then takes the absolute value. Collisions are
/// acceptable for its two uses: visited-path marking and experiment
/// bucketing.
pub fn compact_hash_value(input: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32);
    }
    hash.unsigned_abs()
}

/// `compact_hash_value` rendered base-36, the form stored in the
/// visited-paths cookie.
pub fn compact_hash(input: &str) -> String {
    to_base36(compact_hash_value(input))
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = [0u8; 7];
    let mut i = buf.len();
    while n > 0 {
        i -= 1;
        buf[i] = DIGITS[(n % 36) as usize];
        n /= 36;
    }
    buf[i..].iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_hash_is_pure() {
        assert_eq!(path_hash("/a/b"), path_hash("/a/b"));
        assert_ne!(path_hash("/a/b"), path_hash("/a/c"));
    }

    #[test]
    fn test_path_hash_is_lowercase_hex() {
        let h = path_hash("/article-1");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_compact_hash_known_values() {
        // Matches the widely used (h << 5) - h + c accumulator.
        assert_eq!(compact_hash_value("a"), 97);
        assert_eq!(compact_hash_value("abc"), 96354);
        assert_eq!(compact_hash(""), "0");
        assert_eq!(compact_hash("a"), "2p");
    }

    #[test]
    fn test_compact_hash_is_pure_and_discriminates() {
        assert_eq!(compact_hash("/news/today"), compact_hash("/news/today"));
        assert_ne!(compact_hash("/news/today"), compact_hash("/news/yesterday"));
    }

    #[test]
    fn test_compact_hash_survives_overflow() {
        let long = "x".repeat(10_000);
        let _ = compact_hash_value(&long);
    }

    #[test]
    fn test_base36_digits() {
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(u32::MAX), "1z141z3");
    }
}
