//! Diff hunk extraction.
//!
//! Parses a unified diff into per-file [`Change`] records: each change
//! carries the line ranges that were added or modified in the new version
//! of the file. The coverage core consumes these pre-computed hunk lists;
//! it never talks to the version-control system itself.
//!
//! Also provides a [`DiffSource`] trait that abstracts over different ways
//! to obtain a diff (stdin, git).

use std::process::Command;

use anyhow::{Context, Result};

use crate::model::{Change, ChangeSection};

// ---------------------------------------------------------------------------
// Diff sources
// ---------------------------------------------------------------------------

/// A source for obtaining a unified diff.
pub trait DiffSource {
    /// Fetch the diff text.
    fn fetch_diff(&self) -> Result<String>;
}

/// Diff from stdin.
pub struct StdinDiff;

impl DiffSource for StdinDiff {
    fn fetch_diff(&self) -> Result<String> {
        std::io::read_to_string(std::io::stdin()).context("Failed to read diff from stdin")
    }
}

/// Diff from a git command (e.g., `git diff HEAD~1`).
pub struct GitDiff {
    /// Arguments to pass to `git diff`.
    pub args: String,
}

impl DiffSource for GitDiff {
    fn fetch_diff(&self) -> Result<String> {
        let diff_args: Vec<&str> = self.args.split_whitespace().collect();
        let output = Command::new("git")
            .arg("diff")
            .args(&diff_args)
            .output()
            .context("Failed to run git diff")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git diff failed: {stderr}");
        }

        String::from_utf8(output.stdout).context("git diff output not valid UTF-8")
    }
}

// ---------------------------------------------------------------------------
// Diff parsing
// ---------------------------------------------------------------------------

/// Parse a unified diff (e.g., `git diff`) into one [`Change`] per touched
/// file, with consecutive added lines coalesced into sections.
pub fn parse_changes(diff_text: &str) -> Vec<Change> {
    let mut changes: Vec<Change> = Vec::new();
    let mut current: Option<ChangeBuilder> = None;
    let mut new_line_number: usize = 0;

    for line in diff_text.lines() {
        if let Some(rest) = line.strip_prefix("+++ ") {
            if let Some(change) = current.take() {
                changes.extend(change.finish());
            }
            if rest == "/dev/null" {
                current = None; // File was deleted
            } else {
                // Strip common VCS prefixes: "b/" (default git), "a/" (some
                // tools). Also handles --no-prefix diffs.
                let path = rest
                    .strip_prefix("b/")
                    .or_else(|| rest.strip_prefix("a/"))
                    .unwrap_or(rest);
                current = Some(ChangeBuilder::new(path.to_string()));
            }
        } else if line.starts_with("@@ ") {
            // Hunk header: @@ -old_start[,old_count] +new_start[,new_count] @@
            if let Some(new_range) = parse_hunk_header(line) {
                new_line_number = new_range;
            }
        } else if let Some(ref mut change) = current {
            if line.starts_with('\\') {
                // "\ No newline at end of file" is diff metadata, not a line
            } else if line.starts_with('+') && !line.starts_with("+++") {
                change.add_line(new_line_number);
                new_line_number += 1;
            } else if line.starts_with('-') && !line.starts_with("---") {
                // Deleted line; does not advance the new-file line counter
            } else {
                // Context line or other
                new_line_number += 1;
            }
        }
    }

    if let Some(change) = current.take() {
        changes.extend(change.finish());
    }
    changes
}

/// Accumulates added line numbers for one file, coalescing runs of
/// consecutive lines into sections.
struct ChangeBuilder {
    file_name: String,
    sections: Vec<ChangeSection>,
}

impl ChangeBuilder {
    fn new(file_name: String) -> Self {
        Self {
            file_name,
            sections: Vec::new(),
        }
    }

    fn add_line(&mut self, line: usize) {
        if let Some(last) = self.sections.last_mut() {
            if line == last.end_line + 1 {
                last.end_line = line;
                return;
            }
        }
        self.sections.push(ChangeSection {
            start_line: line,
            end_line: line,
        });
    }

    /// Files with no added lines (pure deletions) produce no change.
    fn finish(self) -> Option<Change> {
        if self.sections.is_empty() {
            None
        } else {
            Some(Change {
                file_name: self.file_name,
                sections: self.sections,
            })
        }
    }
}

/// Parse the "new" start line from a hunk header like "@@ -10,5 +20,8 @@".
fn parse_hunk_header(line: &str) -> Option<usize> {
    let after_at = line.strip_prefix("@@ ")?;
    let parts: Vec<&str> = after_at.split(' ').collect();
    // parts[0] = "-old_start,old_count"
    // parts[1] = "+new_start,new_count" or "+new_start"
    if parts.len() < 2 {
        return None;
    }
    let new_part = parts[1].strip_prefix('+')?;
    let start_str = new_part.split(',').next()?;
    start_str.parse::<usize>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hunk_header() {
        assert_eq!(parse_hunk_header("@@ -10,5 +20,8 @@"), Some(20));
        assert_eq!(parse_hunk_header("@@ -0,0 +1,3 @@"), Some(1));
        assert_eq!(parse_hunk_header("@@ -5 +5 @@"), Some(5));
    }

    #[test]
    fn test_parse_changes_coalesces_sections() {
        let diff = "diff --git a/pkg/a.go b/pkg/a.go\n\
                    --- a/pkg/a.go\n\
                    +++ b/pkg/a.go\n\
                    @@ -8,6 +8,8 @@\n\
                     context\n\
                    +added one\n\
                    +added two\n\
                     context\n\
                    +added later\n\
                     context\n";
        let changes = parse_changes(diff);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].file_name, "pkg/a.go");
        assert_eq!(
            changes[0].sections,
            vec![
                ChangeSection {
                    start_line: 9,
                    end_line: 10
                },
                ChangeSection {
                    start_line: 12,
                    end_line: 12
                },
            ]
        );
    }

    #[test]
    fn test_parse_changes_new_file() {
        let diff = "--- /dev/null\n\
                    +++ b/pkg/new.go\n\
                    @@ -0,0 +1,3 @@\n\
                    +package pkg\n\
                    +\n\
                    +func New() {}\n";
        let changes = parse_changes(diff);
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[0].sections,
            vec![ChangeSection {
                start_line: 1,
                end_line: 3
            }]
        );
    }

    #[test]
    fn test_parse_changes_deleted_file() {
        let diff = "--- a/pkg/old.go\n\
                    +++ /dev/null\n\
                    @@ -1,3 +0,0 @@\n\
                    -package pkg\n\
                    -\n\
                    -func Old() {}\n";
        assert!(parse_changes(diff).is_empty());
    }

    #[test]
    fn test_parse_changes_no_newline_marker() {
        let diff = "--- a/pkg/a.go\n\
                    +++ b/pkg/a.go\n\
                    @@ -1,3 +1,3 @@\n\
                     package pkg\n\
                    -func F() {}\n\
                    +func F() { work() }\n\
                    \\ No newline at end of file\n";
        let changes = parse_changes(diff);
        // The marker must not shift line numbers.
        assert_eq!(
            changes[0].sections,
            vec![ChangeSection {
                start_line: 2,
                end_line: 2
            }]
        );
    }

    #[test]
    fn test_parse_changes_multiple_files() {
        let diff = "--- a/a.go\n\
                    +++ b/a.go\n\
                    @@ -1,2 +1,2 @@\n\
                     package a\n\
                    +var A = 1\n\
                    --- a/b.go\n\
                    +++ b/b.go\n\
                    @@ -1,2 +1,2 @@\n\
                     package b\n\
                    +var B = 2\n";
        let changes = parse_changes(diff);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].file_name, "a.go");
        assert_eq!(changes[1].file_name, "b.go");
        assert_eq!(changes[1].sections[0].start_line, 2);
    }

    #[test]
    fn test_parse_changes_pure_deletion_hunk() {
        let diff = "--- a/a.go\n\
                    +++ b/a.go\n\
                    @@ -3,2 +3,1 @@\n\
                     kept\n\
                    -dropped\n";
        assert!(parse_changes(diff).is_empty());
    }
}
