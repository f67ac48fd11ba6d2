use faststr::FastStr;
use rand::{Rng, distr::Alphanumeric, rng};

/// Alphanumeric name of `len` characters, used to carve out throwaway namespaces.
pub fn random_string(len: usize) -> FastStr {
    rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .into()
}

/// `prefix` followed by a random suffix.
pub fn random_namespace(prefix: &str) -> FastStr {
    format!("{prefix}{}", random_string(10)).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_string_len_and_charset() {
        let s = random_string(32);
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(random_string(0).is_empty());
    }

    #[test]
    fn test_random_namespace_is_distinct() {
        let a = random_namespace("test");
        let b = random_namespace("test");
        assert!(a.starts_with("test"));
        assert_eq!(a.len(), 14);
        // 62^10 candidates
        assert_ne!(a, b);
    }
}
