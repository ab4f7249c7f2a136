/// Default upper bound on the number of characters kept by [`sanitize`].
pub const DEFAULT_MAX_NAME_LEN: usize = 254;

/// Makes free text safe for use as one segment of a dotted metric name.
///
/// The input is truncated to `max_len` characters, then every character
/// outside `[A-Za-z0-9_-]` is replaced by `_`. Applying it twice yields the
/// same result as applying it once.
pub fn sanitize(input: &str, max_len: usize) -> String {
    input
        .chars()
        .take(max_len)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn replaces_disallowed_characters() {
        assert_eq!(sanitize("webserver!!", DEFAULT_MAX_NAME_LEN), "webserver__");
        assert_eq!(sanitize("db 01.prod/eu", DEFAULT_MAX_NAME_LEN), "db_01_prod_eu");
    }

    #[test]
    fn keeps_allowed_characters() {
        let input = "ABCxyz019_-";
        assert_eq!(sanitize(input, DEFAULT_MAX_NAME_LEN), input);
    }

    #[test]
    fn non_ascii_maps_to_single_underscore_per_char() {
        assert_eq!(sanitize("héllo", DEFAULT_MAX_NAME_LEN), "h_llo");
    }

    #[test]
    fn truncates_to_max_len() {
        let long = "a".repeat(300);
        assert_eq!(sanitize(&long, DEFAULT_MAX_NAME_LEN).len(), 254);
        assert_eq!(sanitize("abcdef", 3), "abc");
    }

    #[test]
    fn is_idempotent() {
        for input in ["webserver!!", "", "a.b.c", "ünïcödé", &"x!".repeat(200)] {
            let once = sanitize(input, DEFAULT_MAX_NAME_LEN);
            assert_eq!(sanitize(&once, DEFAULT_MAX_NAME_LEN), once);
            assert!(once.chars().count() <= DEFAULT_MAX_NAME_LEN);
            assert!(once
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(sanitize("", DEFAULT_MAX_NAME_LEN), "");
    }
}
