//! Hierarchical test registry.
//!
//! The registry is a tree of [`Directory`] nodes. Each node owns its subdirectories and its [`TestCase`]s outright,
//! keyed by name in sorted order, so every walk over the tree (listing, scheduling, spawning) visits entries in the
//! same stable order: a directory's own test cases first, then its subdirectories.
//!
//! ## Paths
//!
//! Entries are addressed with slash-delimited paths (`/tensor/add/commutes`). `/` addresses a directory's whole
//! subtree and, below the root, `""` addresses the directory itself. See [`path`] for the peeling rules.
//!
//! ## Programmer errors
//!
//! Malformed registrations are defects in test-writing code, not runtime conditions. [`Directory::register`] and
//! [`Directory::subdirectory`] panic on them; the `try_` variants return the [`RegistryError`] instead.

pub mod case;
pub mod path;

use std::any::Any;
use std::collections::BTreeMap;
use std::io::{self, Write};

use forkcase_core::{ExpectedOutcome, OutcomeError};
use miette::Diagnostic;
use thiserror::Error;

pub use case::{Fixture, FixtureFactory, Runnable, TestCase, TestFn};
use path::{PathStep, WHOLE_TREE, check_name, join, peel};

/// Errors raised while building or scheduling the registry.
#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("'{name}' already exists in {directory}")]
    #[diagnostic(code(forkcase::registry::name_collision))]
    NameCollision { directory: String, name: String },

    #[error("empty name registered in {directory}")]
    #[diagnostic(code(forkcase::registry::empty_name))]
    EmptyName { directory: String },

    #[error("name '{name}' contains a path separator")]
    #[diagnostic(code(forkcase::registry::separator_in_name))]
    SeparatorInName { name: String },

    #[error("a test path needs at least one component")]
    #[diagnostic(code(forkcase::registry::empty_path))]
    EmptyPath,

    #[error("invalid test path '{path}'")]
    #[diagnostic(
        code(forkcase::registry::invalid_path),
        help("paths look like /suite/case; `/` selects every test; run with --print-all to list them")
    )]
    InvalidPath { path: String },

    #[error("illegal expected outcome: {0}")]
    #[diagnostic(code(forkcase::registry::illegal_expectation))]
    IllegalExpectation(#[from] OutcomeError),
}

/// A scheduled test case found by [`Directory::scheduled_cases`].
#[derive(Debug)]
pub struct ScheduledCase<'a> {
    /// Full path of the test case.
    pub path: String,
    pub name: &'a str,
    pub case: &'a TestCase,
    /// Directory that owns the case.
    pub directory: &'a Directory,
}

/// One namespace level of the test hierarchy.
#[derive(Debug)]
pub struct Directory {
    path: String,
    subdirectories: BTreeMap<String, Directory>,
    cases: BTreeMap<String, TestCase>,
}

impl Default for Directory {
    fn default() -> Self {
        Self::root()
    }
}

impl Directory {
    /// Create an empty root directory (`/`).
    pub fn root() -> Self {
        Self::at(WHOLE_TREE.to_string())
    }

    fn at(path: String) -> Self {
        Self {
            path,
            subdirectories: BTreeMap::new(),
            cases: BTreeMap::new(),
        }
    }

    /// Full path of this directory (`/` for the root).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment (empty for the root).
    pub fn name(&self) -> &str {
        self.path.rsplit(path::SEPARATOR).next().unwrap_or_default()
    }

    pub fn is_root(&self) -> bool {
        self.path == WHOLE_TREE
    }

    pub fn get_subdirectory(&self, name: &str) -> Option<&Directory> {
        self.subdirectories.get(name)
    }

    pub fn test_case(&self, name: &str) -> Option<&TestCase> {
        self.cases.get(name)
    }

    /// Get or create the child directory `name`.
    ///
    /// ## Errors
    /// - Empty names, names containing `/`, and names already taken by a test case.
    pub fn try_subdirectory(&mut self, name: &str) -> Result<&mut Directory, RegistryError> {
        check_name(&self.path, name)?;
        if self.cases.contains_key(name) {
            return Err(RegistryError::NameCollision {
                directory: self.path.clone(),
                name: name.to_string(),
            });
        }
        let child_path = join(&self.path, name);
        Ok(self
            .subdirectories
            .entry(name.to_string())
            .or_insert_with(|| Directory::at(child_path)))
    }

    /// Get or create the child directory `name`.
    ///
    /// # Panics
    ///
    /// Panics on any error [`Directory::try_subdirectory`] would return.
    pub fn subdirectory(&mut self, name: &str) -> &mut Directory {
        match self.try_subdirectory(name) {
            Ok(dir) => dir,
            Err(e) => panic!("invalid test registration: {e}"),
        }
    }

    /// Register a test case at `path`, relative to this directory.
    ///
    /// ## Parameters
    /// - `path`: directory components followed by the test name (`&["tensor", "add", "commutes"]`).
    ///   Missing directories are created.
    /// - `runnable`: the code to execute.
    /// - `expected`: the outcome the run must produce to pass.
    /// - `data`: optional payload handed to the test through its [`Context`](crate::context::Context).
    ///
    /// ## Returns
    /// - The new test case, scheduled.
    ///
    /// ## Errors
    /// - [`RegistryError`] for an empty path, an illegal expectation, an invalid name, or a collision with any
    ///   existing entry.
    pub fn try_register(
        &mut self,
        path: &[&str],
        runnable: Runnable,
        expected: ExpectedOutcome,
        data: Option<Box<dyn Any>>,
    ) -> Result<&mut TestCase, RegistryError> {
        let Some((name, parents)) = path.split_last() else {
            return Err(RegistryError::EmptyPath);
        };
        expected.validate()?;

        // Every name is checked before any directory is created, so a rejected path leaves the tree untouched.
        let mut prefix = self.path.clone();
        for component in path {
            check_name(&prefix, component)?;
            prefix = join(&prefix, component);
        }

        let mut dir = self;
        for component in parents {
            dir = dir.try_subdirectory(component)?;
        }
        dir.insert_case(name, TestCase::new(runnable, expected, data))
    }

    /// Register a test case at `path`.
    ///
    /// # Panics
    ///
    /// Panics on any error [`Directory::try_register`] would return.
    pub fn register(
        &mut self,
        path: &[&str],
        runnable: Runnable,
        expected: ExpectedOutcome,
        data: Option<Box<dyn Any>>,
    ) -> &mut TestCase {
        match self.try_register(path, runnable, expected, data) {
            Ok(case) => case,
            Err(e) => panic!("invalid test registration at {}: {e}", path.join("/")),
        }
    }

    /// Register a function-style test expected to pass.
    pub fn register_fn<F>(&mut self, path: &[&str], body: F) -> &mut TestCase
    where
        F: Fn(&crate::context::Context<'_>) -> miette::Result<()> + 'static,
    {
        self.register(path, Runnable::function(body), ExpectedOutcome::no_error(), None)
    }

    fn insert_case(&mut self, name: &str, case: TestCase) -> Result<&mut TestCase, RegistryError> {
        check_name(&self.path, name)?;
        if self.subdirectories.contains_key(name) || self.cases.contains_key(name) {
            return Err(RegistryError::NameCollision {
                directory: self.path.clone(),
                name: name.to_string(),
            });
        }
        Ok(self.cases.entry(name.to_string()).or_insert(case))
    }

    /// Whether `path` addresses this directory's subtree, a subdirectory, or a test case.
    pub fn is_path_valid(&self, path: &str) -> bool {
        match peel(path) {
            PathStep::Whole => true,
            PathStep::Here => !self.is_root(),
            PathStep::Malformed => false,
            PathStep::Descend { head, rest } => {
                if let Some(sub) = self.subdirectories.get(head) {
                    sub.is_path_valid(rest)
                } else if self.cases.contains_key(head) {
                    rest.is_empty()
                } else {
                    false
                }
            }
        }
    }

    /// Schedule (`true`) or unschedule (`false`) everything addressed by `path`.
    ///
    /// ## Errors
    /// - [`RegistryError::InvalidPath`] if [`Directory::is_path_valid`] rejects `path`; nothing is changed.
    pub fn set_scheduled(&mut self, path: &str, scheduled: bool) -> Result<(), RegistryError> {
        if !self.is_path_valid(path) {
            return Err(RegistryError::InvalidPath { path: path.to_string() });
        }
        self.apply_schedule(path, scheduled);
        Ok(())
    }

    fn apply_schedule(&mut self, path: &str, scheduled: bool) {
        match peel(path) {
            PathStep::Whole | PathStep::Here => self.schedule_subtree(scheduled),
            PathStep::Descend { head, rest } => {
                if let Some(sub) = self.subdirectories.get_mut(head) {
                    sub.apply_schedule(rest, scheduled);
                } else if let Some(case) = self.cases.get_mut(head) {
                    case.scheduled = scheduled;
                }
            }
            // Rejected by `is_path_valid` before we get here.
            PathStep::Malformed => {}
        }
    }

    fn schedule_subtree(&mut self, scheduled: bool) {
        for case in self.cases.values_mut() {
            case.scheduled = scheduled;
        }
        for sub in self.subdirectories.values_mut() {
            sub.schedule_subtree(scheduled);
        }
    }

    /// Number of test cases in this subtree, optionally counting only scheduled ones.
    pub fn subordinate_test_count(&self, only_scheduled: bool) -> usize {
        let own = self.cases.values().filter(|c| !only_scheduled || c.scheduled).count();
        own + self
            .subdirectories
            .values()
            .map(|sub| sub.subordinate_test_count(only_scheduled))
            .sum::<usize>()
    }

    /// Write the scheduled test paths of this subtree, one per line.
    ///
    /// Directories without any entries print their own path so they still show up in the listing.
    pub fn print<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        if self.cases.is_empty() && self.subdirectories.is_empty() {
            return writeln!(out, "{}", self.path);
        }
        for (name, case) in &self.cases {
            if case.scheduled {
                writeln!(out, "{}", join(&self.path, name))?;
            }
        }
        for sub in self.subdirectories.values() {
            sub.print(out)?;
        }
        Ok(())
    }

    /// Scheduled test cases of this subtree in listing order.
    pub fn scheduled_cases(&self) -> Vec<ScheduledCase<'_>> {
        let mut found = Vec::new();
        self.collect_scheduled(&mut found);
        found
    }

    fn collect_scheduled<'a>(&'a self, found: &mut Vec<ScheduledCase<'a>>) {
        for (name, case) in &self.cases {
            if case.scheduled {
                found.push(ScheduledCase {
                    path: join(&self.path, name),
                    name,
                    case,
                    directory: self,
                });
            }
        }
        for sub in self.subdirectories.values() {
            sub.collect_scheduled(found);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use forkcase_core::Stage;

    fn pass(_: &crate::context::Context<'_>) -> miette::Result<()> {
        Ok(())
    }

    fn sample_tree() -> Directory {
        let mut root = Directory::root();
        root.register_fn(&["top"], pass);
        root.register_fn(&["foo", "a"], pass);
        root.register_fn(&["foo", "b"], pass);
        root.register_fn(&["foo", "deep", "c"], pass);
        root.register_fn(&["bar", "d"], pass);
        root.subdirectory("empty");
        root
    }

    fn listing(dir: &Directory) -> String {
        let mut out = Vec::new();
        dir.print(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_register_schedules_by_default() {
        let root = sample_tree();
        assert_eq!(root.subordinate_test_count(false), 5);
        assert_eq!(root.subordinate_test_count(true), 5);
        assert!(root.get_subdirectory("foo").unwrap().test_case("a").unwrap().is_scheduled());
    }

    #[test]
    fn test_directory_paths() {
        let root = sample_tree();
        let deep = root.get_subdirectory("foo").unwrap().get_subdirectory("deep").unwrap();
        assert_eq!(deep.path(), "/foo/deep");
        assert_eq!(deep.name(), "deep");
        assert!(!deep.is_root());
        assert!(root.is_root());
        assert_eq!(root.name(), "");
    }

    #[test]
    fn test_duplicate_case_collides() {
        let mut root = sample_tree();
        let err = root
            .try_register(&["foo", "a"], Runnable::function(pass), ExpectedOutcome::no_error(), None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::NameCollision { ref name, .. } if name == "a"));
    }

    #[test]
    fn test_case_and_directory_names_collide() {
        let mut root = sample_tree();
        // A case where a directory already lives.
        let err = root
            .try_register(&["foo"], Runnable::function(pass), ExpectedOutcome::no_error(), None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::NameCollision { .. }));
        // A directory where a case already lives.
        assert!(matches!(
            root.try_subdirectory("top"),
            Err(RegistryError::NameCollision { .. })
        ));
        let err = root
            .try_register(&["top", "x"], Runnable::function(pass), ExpectedOutcome::no_error(), None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::NameCollision { .. }));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut root = Directory::root();
        let err = root
            .try_register(&[""], Runnable::function(pass), ExpectedOutcome::no_error(), None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::EmptyName { .. }));
        let err = root
            .try_register(&["a/b"], Runnable::function(pass), ExpectedOutcome::no_error(), None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::SeparatorInName { .. }));
        let err = root
            .try_register(&[], Runnable::function(pass), ExpectedOutcome::no_error(), None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::EmptyPath));
    }

    #[test]
    fn test_rejected_path_creates_no_directories() {
        let mut root = Directory::root();
        let err = root
            .try_register(&["new", "a/b"], Runnable::function(pass), ExpectedOutcome::no_error(), None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::SeparatorInName { .. }));
        let err = root
            .try_register(&["new", "", "leaf"], Runnable::function(pass), ExpectedOutcome::no_error(), None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::EmptyName { ref directory } if directory == "/new"));
        assert!(root.get_subdirectory("new").is_none());
    }

    #[test]
    fn test_illegal_expectation_rejected() {
        let mut root = Directory::root();
        let err = root
            .try_register(
                &["x"],
                Runnable::function(pass),
                ExpectedOutcome::uncaught_exception(Stage::Completed),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::IllegalExpectation(_)));
        assert_eq!(root.subordinate_test_count(false), 0);
    }

    #[test]
    #[should_panic(expected = "invalid test registration")]
    fn test_register_panics_on_collision() {
        let mut root = Directory::root();
        root.register_fn(&["same"], pass);
        root.register_fn(&["same"], pass);
    }

    #[test]
    fn test_subdirectory_is_idempotent() {
        let mut root = Directory::root();
        root.subdirectory("a").register_fn(&["x"], pass);
        root.subdirectory("a").register_fn(&["y"], pass);
        assert_eq!(root.get_subdirectory("a").unwrap().subordinate_test_count(false), 2);
    }

    #[test]
    fn test_path_validation() {
        let root = sample_tree();
        assert!(root.is_path_valid("/"));
        assert!(root.is_path_valid("/foo"));
        assert!(root.is_path_valid("/foo/"));
        assert!(root.is_path_valid("/foo/deep/c"));
        assert!(root.is_path_valid("/top"));
        assert!(root.is_path_valid("/empty"));
        assert!(!root.is_path_valid(""));
        assert!(!root.is_path_valid("foo"));
        assert!(!root.is_path_valid("/top/extra"));
        assert!(!root.is_path_valid("/missing"));
        assert!(!root.is_path_valid("//foo"));
        let foo = root.get_subdirectory("foo").unwrap();
        assert!(foo.is_path_valid(""));
        assert!(foo.is_path_valid("/a"));
    }

    #[test]
    fn test_remove_subtree_then_add_leaf() {
        let mut root = sample_tree();
        root.set_scheduled("/", false).unwrap();
        assert_eq!(root.subordinate_test_count(true), 0);
        root.set_scheduled("/foo/deep/c", true).unwrap();
        let scheduled: Vec<String> = root.scheduled_cases().into_iter().map(|c| c.path).collect();
        assert_eq!(scheduled, vec!["/foo/deep/c"]);
    }

    #[test]
    fn test_add_all_remove_subtree() {
        let mut root = sample_tree();
        root.set_scheduled("/", true).unwrap();
        root.set_scheduled("/foo", false).unwrap();
        let scheduled: Vec<String> = root.scheduled_cases().into_iter().map(|c| c.path).collect();
        assert_eq!(scheduled, vec!["/top", "/bar/d"]);
    }

    #[test]
    fn test_invalid_schedule_path_changes_nothing() {
        let mut root = sample_tree();
        let err = root.set_scheduled("/foo/nope", false).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidPath { ref path } if path == "/foo/nope"));
        assert_eq!(root.subordinate_test_count(true), 5);
    }

    #[test]
    fn test_scheduled_case_order_and_owner() {
        let root = sample_tree();
        let cases = root.scheduled_cases();
        let paths: Vec<&str> = cases.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["/top", "/bar/d", "/foo/a", "/foo/b", "/foo/deep/c"]);
        assert_eq!(cases[4].directory.path(), "/foo/deep");
        assert_eq!(cases[4].name, "c");
    }

    #[test]
    fn test_print_listing() {
        let mut root = sample_tree();
        root.set_scheduled("/foo/b", false).unwrap();
        insta::assert_snapshot!(listing(&root), @r"
        /top
        /bar/d
        /empty
        /foo/a
        /foo/deep/c
        ");
    }

    #[test]
    fn test_print_empty_root() {
        assert_eq!(listing(&Directory::root()), "/\n");
    }
}
