//! Sequential medicine codes (`MED-0001`, `MED-0002`, ...).

/// Prefix shared by every generated code.
pub const CODE_PREFIX: &str = "MED-";

/// Format the n-th code. Numbers past 9999 keep growing in width.
pub fn format_code(n: u64) -> String {
    format!("{}{:04}", CODE_PREFIX, n)
}

/// Pick the first free code starting at `existing_count + 1`.
///
/// Counts drift after deletions, so every candidate is checked with
/// `is_taken` and the counter advances until a free one is found.
pub fn assign_code<E>(
    existing_count: u64,
    mut is_taken: impl FnMut(&str) -> Result<bool, E>,
) -> Result<String, E> {
    let mut n = existing_count + 1;
    loop {
        let candidate = format_code(n);
        if !is_taken(&candidate)? {
            return Ok(candidate);
        }
        tracing::debug!(code = %candidate, "medicine code taken, probing next");
        n += 1;
    }
}

/// Parse the numeric part of a generated code.
pub fn parse_code_number(code: &str) -> Option<u64> {
    code.strip_prefix(CODE_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::convert::Infallible;

    #[test]
    fn test_format_code() {
        assert_eq!(format_code(1), "MED-0001");
        assert_eq!(format_code(42), "MED-0042");
        assert_eq!(format_code(9999), "MED-9999");
        assert_eq!(format_code(10000), "MED-10000");
    }

    #[test]
    fn test_assign_code_fresh() {
        let code = assign_code(0, |_| Ok::<_, Infallible>(false)).unwrap();
        assert_eq!(code, "MED-0001");
    }

    #[test]
    fn test_assign_code_skips_taken() {
        // Three medicines exist but MED-0004 survived a deletion of MED-0002
        let taken: HashSet<&str> = ["MED-0001", "MED-0003", "MED-0004"].into_iter().collect();
        let code = assign_code(3, |c| Ok::<_, Infallible>(taken.contains(c))).unwrap();
        assert_eq!(code, "MED-0005");
    }

    #[test]
    fn test_assign_code_propagates_lookup_error() {
        let result = assign_code(0, |_| Err("db down"));
        assert_eq!(result, Err("db down"));
    }

    #[test]
    fn test_sequential_codes_unique() {
        let mut taken = HashSet::new();
        for i in 0..25u64 {
            let code = assign_code(i, |c| Ok::<_, Infallible>(taken.contains(c))).unwrap();
            assert!(taken.insert(code));
        }
        assert!(taken.contains("MED-0001"));
        assert!(taken.contains("MED-0025"));
    }

    #[test]
    fn test_parse_code_number() {
        assert_eq!(parse_code_number("MED-0042"), Some(42));
        assert_eq!(parse_code_number("MED-12345"), Some(12345));
        assert_eq!(parse_code_number("ABC-0001"), None);
        assert_eq!(parse_code_number("MED-"), None);
    }
}
