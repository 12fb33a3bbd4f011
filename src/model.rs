//! In-memory coverage model: Package → Function → Statement trees built from
//! a structural pass over the source plus the cover profile, decorated with
//! diff state and ignore annotations.

use std::collections::HashMap;

use serde::Serialize;

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// Whether a statement counts toward reported metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    Keep,
    Ignore,
}

/// Diff classification of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum State {
    /// The statement predates the change set.
    Original,
    /// At least one diff hunk line falls inside the statement.
    Changed,
}

/// One minimal executable unit inside a function.
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub start_line: usize,
    pub end_line: usize,
    /// Byte offset of the statement start in its file.
    pub start: usize,
    /// Byte offset just past the statement end.
    pub end: usize,
    /// Summed execution count of all overlapping profile blocks.
    pub reached: i64,
    pub mode: Mode,
    pub state: State,
}

impl Statement {
    #[must_use]
    pub fn is_covered(&self) -> bool {
        self.reached > 0
    }
}

/// A function (or method, or closure) and its statements, in source order.
#[derive(Debug, Clone, Serialize)]
pub struct Function {
    /// Name, qualified with the receiver type for methods; `@line:col` for
    /// anonymous closures.
    pub name: String,
    pub file: String,
    pub start: usize,
    pub end: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub statements: Vec<Statement>,
}

/// All functions discovered for one import path.
#[derive(Debug, Clone, Serialize)]
pub struct Package {
    /// Import path, e.g. `example.com/mod/pkg`.
    pub name: String,
    pub functions: Vec<Function>,
}

impl Package {
    pub fn new(name: String) -> Self {
        Self {
            name,
            functions: Vec::new(),
        }
    }
}

/// Aggregate root: packages keyed by import path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Packages {
    packages: HashMap<String, Package>,
}

impl Packages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a package, merging its functions into an existing entry with
    /// the same import path.
    pub fn add_package(&mut self, pkg: Package) {
        match self.packages.get_mut(&pkg.name) {
            Some(existing) => existing.functions.extend(pkg.functions),
            None => {
                self.packages.insert(pkg.name.clone(), pkg);
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// One contiguous line range from a diff hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeSection {
    pub start_line: usize,
    pub end_line: usize,
}

/// Diff hunks for one file, as reported by the version-control side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    /// Path as the diff tool sees it (typically repo-relative).
    pub file_name: String,
    pub sections: Vec<ChangeSection>,
}
