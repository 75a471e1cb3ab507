//! Path/ID codec for denormalized id-list columns
//!
//! Ordered id lists (ancestors, children, descendants, siblings) are stored as
//! a single delimiter-joined string column. Ids must never contain
//! [`PKS_SEPARATOR`]; that is a caller precondition and is not escaped.

use std::fmt::Display;

/// Delimiter used by every `*_pks` column.
pub const PKS_SEPARATOR: &str = ",";

/// Join ids into a single delimited string.
///
/// Each id is stringified with its `Display` impl, so integers, strings and
/// UUIDs can all be stored in the same column type. An empty input yields `""`.
///
/// ```rust
/// use treeindex_core::utils::join_pks;
///
/// assert_eq!(join_pks([1, 2, 3]), "1,2,3");
/// assert_eq!(join_pks(Vec::<u64>::new()), "");
/// ```
pub fn join_pks<I, T>(ids: I) -> String
where
    I: IntoIterator<Item = T>,
    T: Display,
{
    ids.into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(PKS_SEPARATOR)
}

/// Split a delimited string back into its id tokens, dropping empty tokens.
///
/// ```rust
/// use treeindex_core::utils::split_pks;
///
/// assert_eq!(split_pks("1,2,3"), vec!["1", "2", "3"]);
/// assert!(split_pks("").is_empty());
/// ```
pub fn split_pks(s: &str) -> Vec<String> {
    s.split(PKS_SEPARATOR)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Check whether `id` is one of the tokens of a delimited string.
///
/// Compares whole tokens, so `"1"` is not found in `"10,11"`.
pub fn contains_pk(s: &str, id: &str) -> bool {
    !id.is_empty() && s.split(PKS_SEPARATOR).any(|token| token == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_join_pks() {
        assert_eq!(join_pks(Vec::<i64>::new()), "");
        assert_eq!(
            join_pks([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]),
            "0,1,2,3,4,5,6,7,8,9,10"
        );
        assert_eq!(join_pks(["a", "b"]), "a,b");
    }

    #[test]
    fn test_split_pks() {
        assert!(split_pks("").is_empty());
        assert_eq!(
            split_pks("0,1,2,3,4,5,6,7,8,9,10"),
            (0..11).map(|i| i.to_string()).collect::<Vec<_>>()
        );
        // Empty tokens are dropped
        assert_eq!(split_pks(",1,,2,"), vec!["1", "2"]);
    }

    #[test]
    fn test_round_trip_uuids() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let expected: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        assert_eq!(split_pks(&join_pks(&ids)), expected);
    }

    #[test]
    fn test_contains_pk_matches_whole_tokens() {
        assert!(contains_pk("1,2,3", "2"));
        assert!(!contains_pk("10,11", "1"));
        assert!(!contains_pk("", "1"));
        assert!(!contains_pk("1,2", ""));
    }
}
