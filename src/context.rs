//! Per-run handle given to an executing test.

use std::any::Any;

use crate::registry::Directory;
use crate::registry::path::join;

/// Identifies the running test and carries its optional data payload.
///
/// A fresh context is built for every run; it borrows from the registry and never outlives the run.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    name: &'a str,
    directory: &'a Directory,
    data: Option<&'a dyn Any>,
}

impl<'a> Context<'a> {
    pub fn new(name: &'a str, directory: &'a Directory, data: Option<&'a dyn Any>) -> Self {
        Self { name, directory, data }
    }

    /// Name of the running test case.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Directory that owns the running test case.
    pub fn directory(&self) -> &'a Directory {
        self.directory
    }

    /// Full path of the running test case.
    pub fn path(&self) -> String {
        join(self.directory.path(), self.name)
    }

    /// The payload registered with the test, if it has one of type `T`.
    pub fn data<T: Any>(&self) -> Option<&'a T> {
        self.data.and_then(|d| d.downcast_ref::<T>())
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("directory", &self.directory.path())
            .field("has_data", &self.data.is_some())
            .finish()
    }
}
