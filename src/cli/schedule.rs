//! Ordered `--add` / `--remove` schedule edits.
//!
//! clap collects each flag's values separately; the edits are re-interleaved by their position on the command line
//! so that `-a / -r /foo` and `-r /foo -a /` mean different things.

use clap::ArgMatches;

use crate::registry::{Directory, RegistryError};

/// One schedule edit from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOp {
    Add(String),
    Remove(String),
}

impl ScheduleOp {
    pub fn path(&self) -> &str {
        match self {
            ScheduleOp::Add(path) | ScheduleOp::Remove(path) => path,
        }
    }
}

/// Collect the edits of `matches` in command-line order.
pub fn ordered_ops(matches: &ArgMatches) -> Vec<ScheduleOp> {
    let mut indexed: Vec<(usize, ScheduleOp)> = Vec::new();
    collect(matches, "add", ScheduleOp::Add, &mut indexed);
    collect(matches, "remove", ScheduleOp::Remove, &mut indexed);
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, op)| op).collect()
}

fn collect(matches: &ArgMatches, id: &str, make: fn(String) -> ScheduleOp, out: &mut Vec<(usize, ScheduleOp)>) {
    if let (Some(values), Some(indices)) = (matches.get_many::<String>(id), matches.indices_of(id)) {
        out.extend(indices.zip(values).map(|(index, value)| (index, make(value.clone()))));
    }
}

/// Apply the edits to `root` in order.
///
/// ## Errors
/// - The first [`RegistryError::InvalidPath`]; earlier edits stay applied.
pub fn apply(root: &mut Directory, ops: &[ScheduleOp]) -> Result<(), RegistryError> {
    for op in ops {
        let scheduled = matches!(op, ScheduleOp::Add(_));
        tracing::debug!(path = op.path(), scheduled, "schedule edit");
        root.set_scheduled(op.path(), scheduled)?;
    }
    Ok(())
}
