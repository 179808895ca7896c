//! Deterministic seeding for the synthesis paths.
//!
//! Every synthesized output is a pure function of the request ID and the
//! video reference. The mixing mirrors the shape the analysis templates
//! were designed around: a hex interpretation of the ID tail plus a
//! character-sum over the URL; wall-clock time never feeds a seed.

/// FNV-1a 64-bit hash of a string.
pub fn stable_hash(s: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET;
    for byte in s.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Sum of the character code points of a string.
pub fn char_sum(s: &str) -> u64 {
    s.chars().map(|c| c as u64).sum()
}

/// Numeric hash of a request ID: the leading hex-digit run of the last 8
/// characters, parsed base 16. Falls back to 1 when the tail starts with a
/// non-hex character or parses to zero, so the hash is never zero.
pub fn id_hash(request_id: &str) -> u64 {
    let tail: String = {
        let chars: Vec<char> = request_id.chars().collect();
        let start = chars.len().saturating_sub(8);
        chars[start..].iter().collect()
    };

    let hex_prefix: String = tail.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
    let parsed = u64::from_str_radix(&hex_prefix, 16).unwrap_or(0);
    parsed.max(1)
}

/// Per-run seed derived only from the request ID and video reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed {
    pub id_hash: u64,
    pub url_sum: u64,
}

impl Seed {
    pub fn derive(request_id: &str, video_url: &str) -> Self {
        Self {
            id_hash: id_hash(request_id),
            url_sum: char_sum(video_url),
        }
    }

    /// Combined mixing value used for group/size selection.
    pub fn combined(&self) -> u64 {
        self.id_hash.wrapping_add(self.url_sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_hash_is_stable() {
        assert_eq!(stable_hash("abc123xyz9"), stable_hash("abc123xyz9"));
        assert_ne!(stable_hash("abc123xyz9"), stable_hash("abc123xyz8"));
    }

    #[test]
    fn test_char_sum() {
        assert_eq!(char_sum("abc"), 97 + 98 + 99);
        assert_eq!(char_sum(""), 0);
    }

    #[test]
    fn test_id_hash_hex_prefix() {
        // Last 8 chars "c123xyz9": hex prefix "c123" = 0xc123.
        assert_eq!(id_hash("abc123xyz9"), 0xc123);
        // Non-hex leading char falls back to 1.
        assert_eq!(id_hash("zzzzzzzz"), 1);
        // Full hex tail parses as-is.
        assert_eq!(id_hash("00deadbeef"), 0xdeadbeef);
    }

    #[test]
    fn test_seed_known_values() {
        let seed = Seed::derive("abc123xyz9", "https://cdn.example/nature_walk.mp4");
        assert_eq!(seed.id_hash, 49443);
        assert_eq!(seed.url_sum, 3365);
        assert_eq!(seed.combined(), 52808);
    }
}
