//! Slug normalization for display text
//!
//! The ordering key only looks at a slug of the display text, so ordering is
//! insensitive to case, punctuation and repeated whitespace.

use regex::Regex;
use std::sync::LazyLock;

/// Characters that are neither word characters, whitespace nor hyphens.
static NON_SLUG_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").unwrap());

/// Runs of whitespace, underscores and hyphens collapse into a single hyphen.
static SEPARATOR_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-_\s]+").unwrap());

/// Convert text to a lowercase ASCII slug.
///
/// Non-ASCII characters are dropped, anything that is not alphanumeric,
/// underscore, hyphen or whitespace is removed, separator runs (underscores
/// included) become a single hyphen, and leading/trailing hyphens are
/// stripped. The result only holds `[a-z0-9-]`.
///
/// ```rust
/// use treeindex_core::utils::slugify;
///
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("  Child  AA "), "child-aa");
/// ```
pub fn slugify(text: &str) -> String {
    let ascii: String = text
        .chars()
        .filter(char::is_ascii)
        .collect::<String>()
        .to_ascii_lowercase();
    let cleaned = NON_SLUG_CHARS.replace_all(&ascii, "");
    let collapsed = SEPARATOR_RUNS.replace_all(&cleaned, "-");
    collapsed.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("a"), "a");
        assert_eq!(slugify("Root A"), "root-a");
        assert_eq!(slugify("Grandchild AAA"), "grandchild-aaa");
    }

    #[test]
    fn test_slugify_strips_punctuation_and_separators() {
        assert_eq!(slugify("--Hello,   World!--"), "hello-world");
        assert_eq!(slugify("snake_case name"), "snake-case-name");
        assert_eq!(slugify("_leading"), "leading");
        assert_eq!(slugify("a__-_b"), "a-b");
    }

    #[test]
    fn test_slugify_drops_non_ascii() {
        assert_eq!(slugify("café"), "caf");
        assert_eq!(slugify("— a"), "a");
        assert_eq!(slugify(""), "");
    }
}
