//! Client-supplied names to single-segment file names.

use std::fmt;
use std::ops::Deref;

use serde::Serialize;

use super::error::{StorageError, StorageResult};

/// Longest name, in bytes, a sanitized name may have. Leaves room for the
/// temporary-file prefix and suffix under the usual 255-byte limit.
pub const MAX_NAME_LEN: usize = 200;

/// A file name that is a single, non-empty path segment.
///
/// Only [`sanitize`] constructs one, so holding a `SafeName` means the name
/// contains no separators, no NUL bytes, and does not start with `.`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SafeName(String);

impl SafeName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for SafeName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SafeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SafeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turn an arbitrary client string into a [`SafeName`].
///
/// Separators become word breaks, runs of whitespace collapse to `_`, anything
/// that is not alphanumeric or one of `._-` is dropped, and leading/trailing
/// dots and underscores are trimmed. Different inputs may map to the same name.
pub fn sanitize(raw: &str) -> StorageResult<SafeName> {
    let spaced: String = raw
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    let filtered: String = joined
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    let mut name = trim_name(&filtered).to_string();
    if name.len() > MAX_NAME_LEN {
        let mut end = MAX_NAME_LEN;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
        name = trim_name(&name).to_string();
    }

    if name.is_empty() {
        return Err(StorageError::InvalidName(raw.to_string()));
    }

    Ok(SafeName(name))
}

fn trim_name(s: &str) -> &str {
    s.trim_matches(|c| c == '.' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(raw: &str) -> String {
        sanitize(raw).unwrap().into_string()
    }

    #[test]
    fn test_plain_names_pass_through() {
        assert_eq!(ok("report.pdf"), "report.pdf");
        assert_eq!(ok("A.txt"), "A.txt");
        assert_eq!(ok("archive.tar.gz"), "archive.tar.gz");
        assert_eq!(ok("my-file_v2.txt"), "my-file_v2.txt");
    }

    #[test]
    fn test_whitespace_collapses_to_underscore() {
        assert_eq!(ok("  My   Summer Photo.jpg  "), "My_Summer_Photo.jpg");
        assert_eq!(ok("tab\tseparated.txt"), "tabseparated.txt");
    }

    #[test]
    fn test_traversal_is_neutralized() {
        assert_eq!(ok("../../etc/passwd"), "etc_passwd");
        assert_eq!(ok("/etc/shadow"), "etc_shadow");
        assert_eq!(ok("..\\..\\windows\\system.ini"), "windows_system.ini");
        assert_eq!(ok("a/../b.txt"), "a_.._b.txt");
    }

    #[test]
    fn test_sanitized_name_is_single_segment() {
        for raw in ["../x", "/abs/path", "dir/file", "a\\b", "..", "x/./y"] {
            if let Ok(name) = sanitize(raw) {
                assert!(!name.contains('/'), "{raw} -> {name}");
                assert!(!name.contains('\\'), "{raw} -> {name}");
                assert!(!name.starts_with('.'), "{raw} -> {name}");
                assert_ne!(name.as_str(), "..");
            }
        }
    }

    #[test]
    fn test_hidden_names_lose_leading_dot() {
        assert_eq!(ok(".bashrc"), "bashrc");
        assert_eq!(ok("..hidden.."), "hidden");
    }

    #[test]
    fn test_null_bytes_are_dropped() {
        assert_eq!(ok("evil\0.txt"), "evil.txt");
    }

    #[test]
    fn test_reserved_characters_are_dropped() {
        assert_eq!(ok("what?*<>|:\".txt"), "what.txt");
    }

    #[test]
    fn test_unicode_letters_are_kept() {
        assert_eq!(ok("relatório.pdf"), "relatório.pdf");
    }

    #[test]
    fn test_empty_results_are_rejected() {
        for raw in ["", "   ", "/", "///", "\\\\", "..", "../..", ".", "\0", "???"] {
            assert!(
                matches!(sanitize(raw), Err(StorageError::InvalidName(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_long_names_are_truncated() {
        let raw = "é".repeat(150);
        let name = sanitize(&raw).unwrap();
        assert!(name.len() <= MAX_NAME_LEN);
        assert_eq!(name.len(), MAX_NAME_LEN);
    }
}
