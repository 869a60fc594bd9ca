//! Slash-delimited test path syntax.
//!
//! Paths are consumed one segment per step: `/a/b/c` peels into `a` with remainder `/b/c`, which the directory
//! named `a` then peels further. Validation, scheduling and listing all go through [`peel`], so they agree on
//! what a path means.

use super::RegistryError;

/// Path separator for test paths.
pub const SEPARATOR: char = '/';

/// Path addressing every test below the directory that receives it.
pub const WHOLE_TREE: &str = "/";

/// One step of path resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStep<'a> {
    /// `/`: the receiving directory's whole subtree.
    Whole,
    /// ``: the receiving directory itself (only meaningful below the root).
    Here,
    /// `/head...`: descend into the entry `head`, handing it `rest`.
    Descend { head: &'a str, rest: &'a str },
    /// Anything else: missing leading separator or an empty segment.
    Malformed,
}

/// Peel the leading segment off `path`.
pub fn peel(path: &str) -> PathStep<'_> {
    if path == WHOLE_TREE {
        return PathStep::Whole;
    }
    if path.is_empty() {
        return PathStep::Here;
    }
    let Some(stripped) = path.strip_prefix(SEPARATOR) else {
        return PathStep::Malformed;
    };
    let (head, rest) = match stripped.find(SEPARATOR) {
        Some(idx) => (&stripped[..idx], &stripped[idx..]),
        None => (stripped, ""),
    };
    if head.is_empty() {
        PathStep::Malformed
    } else {
        PathStep::Descend { head, rest }
    }
}

/// Check that `name` can label a directory or test case.
pub fn check_name(directory: &str, name: &str) -> Result<(), RegistryError> {
    if name.is_empty() {
        return Err(RegistryError::EmptyName {
            directory: directory.to_string(),
        });
    }
    if name.contains(SEPARATOR) {
        return Err(RegistryError::SeparatorInName { name: name.to_string() });
    }
    Ok(())
}

/// Join a directory path and an entry name.
pub fn join(directory: &str, name: &str) -> String {
    if directory == WHOLE_TREE {
        format!("{SEPARATOR}{name}")
    } else {
        format!("{directory}{SEPARATOR}{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peel_segments() {
        assert_eq!(peel("/"), PathStep::Whole);
        assert_eq!(peel(""), PathStep::Here);
        assert_eq!(peel("/a"), PathStep::Descend { head: "a", rest: "" });
        assert_eq!(peel("/a/b/c"), PathStep::Descend { head: "a", rest: "/b/c" });
        assert_eq!(peel("/a/"), PathStep::Descend { head: "a", rest: "/" });
    }

    #[test]
    fn test_peel_malformed() {
        assert_eq!(peel("a/b"), PathStep::Malformed);
        assert_eq!(peel("//a"), PathStep::Malformed);
        assert_eq!(peel("relative"), PathStep::Malformed);
    }

    #[test]
    fn test_check_name() {
        assert!(check_name("/", "tensor").is_ok());
        assert!(matches!(check_name("/", ""), Err(RegistryError::EmptyName { .. })));
        assert!(matches!(
            check_name("/", "a/b"),
            Err(RegistryError::SeparatorInName { .. })
        ));
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
    }
}
