//! The change-aware coverage core.
//!
//! [`Parser::parse`] consumes cover profiles and pre-computed diff hunks and
//! produces the Package → Function → Statement model: each statement carries
//! the summed execution count of the profile blocks overlapping it, its diff
//! classification, and its ignore mode. Processing is a single synchronous
//! pass per profile file; any failure aborts the whole run, since coverage
//! data is meaningless if a contributing file failed to parse.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::annotation::{self, IgnoreProfile, IgnoreType};
use crate::error::{CovError, Result};
use crate::extents::{self, StmtExtent};
use crate::model::{Change, Function, Mode, Package, Packages, State, Statement};
use crate::profile::{self, ProfileBlock, ProfileEntry};
use crate::resolver::Resolver;

/// Builds the coverage model from one or more cover profile files.
pub struct Parser {
    profile_files: Vec<PathBuf>,
    packages: HashMap<String, Package>,
    resolver: Resolver,
}

impl Parser {
    pub fn new(profile_files: Vec<PathBuf>, resolver: Resolver) -> Self {
        Self {
            profile_files,
            packages: HashMap::new(),
            resolver,
        }
    }

    /// Parse the cover profiles into statements, decorated with their diff
    /// state from `changes`. Returns the fully populated aggregate or the
    /// first fatal error, tagged with the stage it occurred in.
    pub fn parse(mut self, changes: &[Change]) -> Result<Packages> {
        let profile_files = std::mem::take(&mut self.profile_files);
        for profile_file in &profile_files {
            let entries = profile::parse_file(profile_file)
                .map_err(|e| CovError::stage("parse cover profile", e))?;
            for entry in entries {
                let change = find_change(&entry, changes);
                self.convert_profile(&entry, change)
                    .map_err(|e| CovError::stage("covert cover profile", e))?;
            }
        }

        // Assemble the aggregate once, after every profile file has been
        // consumed; re-adding accumulated packages per profile file would
        // duplicate functions across multi-profile runs.
        let mut result = Packages::new();
        for pkg in self.packages.into_values() {
            result.add_package(pkg);
        }
        Ok(result)
    }

    fn convert_profile(&mut self, entry: &ProfileEntry, change: Option<&Change>) -> Result<()> {
        let (file, pkg_path) = self
            .resolver
            .resolve(&entry.file_name)
            .map_err(|e| CovError::stage("find file", e))?;
        debug!(file = %file.display(), package = pkg_path, "converting profile entry");

        let ignore = annotation::parse_ignore_profile(&file, entry)
            .map_err(|e| CovError::stage("parse ignore profile", e))?;

        // Find function and statement extents; create the corresponding
        // Functions and Statements.
        let func_extents =
            extents::find_funcs(&file).map_err(|e| CovError::stage("find Functions", e))?;

        let file_str = file.to_string_lossy().into_owned();
        let mut functions: Vec<Function> = Vec::with_capacity(func_extents.len());
        for fe in &func_extents {
            let statements = fe
                .stmts
                .iter()
                .map(|se| Statement {
                    start_line: se.start_line,
                    end_line: se.end_line,
                    start: se.start_offset,
                    end: se.end_offset,
                    reached: 0,
                    mode: Mode::Keep,
                    state: find_state(se, change),
                })
                .collect();
            functions.push(Function {
                name: fe.name.clone(),
                file: file_str.clone(),
                start: fe.extent.start_offset,
                end: fe.extent.end_offset,
                start_line: fe.extent.start_line,
                end_line: fe.extent.end_line,
                statements,
            });
        }

        // For each statement, sum the counts of the profile blocks covering
        // it. Statements within one function are sorted by start position,
        // so a cursor advances over the block list without rewinding. Func
        // literals become separate entries appended after their enclosing
        // function, so their statements sit earlier in the source than the
        // cursor has reached; the scan restarts per function.
        for (function, fe) in functions.iter_mut().zip(&func_extents) {
            let mut cursor = 0usize;
            for (stmt, se) in function.statements.iter_mut().zip(&fe.stmts) {
                if ignore.kind == IgnoreType::FileIgnore {
                    // File-level ignore dominates: no block matching, the
                    // statement reads as trivially covered.
                    stmt.mode = Mode::Ignore;
                    stmt.reached = 1;
                    continue;
                }
                reconcile(stmt, se, &entry.blocks, &mut cursor, &ignore);
            }
        }

        let pkg = self
            .packages
            .entry(pkg_path.clone())
            .or_insert_with(|| Package::new(pkg_path));
        pkg.functions.extend(functions);
        Ok(())
    }
}

/// Sum the counts of every profile block overlapping the statement.
fn reconcile(
    stmt: &mut Statement,
    se: &StmtExtent,
    blocks: &[ProfileBlock],
    cursor: &mut usize,
    ignore: &IgnoreProfile,
) {
    // Blocks that end before this statement starts cannot affect any later
    // statement either; discard them for good.
    while *cursor < blocks.len() && block_ends_before(&blocks[*cursor], se) {
        *cursor += 1;
    }

    let mut i = *cursor;
    while i < blocks.len() {
        let block = &blocks[i];
        if block_starts_after(block, se) {
            // This and all subsequent blocks belong to later statements.
            break;
        }
        if !block_ends_before(block, se) {
            stmt.reached += block.count;
            // Ignore is sticky: a later non-ignored overlapping block does
            // not revert it.
            if ignore.blocks.contains(block) {
                stmt.mode = Mode::Ignore;
            }
        }
        i += 1;
    }
}

fn block_ends_before(block: &ProfileBlock, se: &StmtExtent) -> bool {
    block.end_line < se.start_line
        || (block.end_line == se.start_line && block.end_col <= se.start_col)
}

fn block_starts_after(block: &ProfileBlock, se: &StmtExtent) -> bool {
    block.start_line > se.end_line
        || (block.start_line == se.end_line && block.start_col >= se.end_col)
}

/// `Changed` iff some hunk section shares a line with the statement.
fn find_state(se: &StmtExtent, change: Option<&Change>) -> State {
    let Some(change) = change else {
        return State::Original;
    };
    for section in &change.sections {
        if section.start_line <= se.end_line && se.start_line <= section.end_line {
            return State::Changed;
        }
    }
    State::Original
}

/// Find the change matching a profile entry by file name.
fn find_change<'a>(entry: &ProfileEntry, changes: &'a [Change]) -> Option<&'a Change> {
    changes.iter().find(|c| in_folder(&entry.file_name, &c.file_name))
}

/// Whether `file_path` names the same file as `parent_path`, tolerating
/// differing path roots between the coverage tool's view and the diff
/// tool's view.
pub fn in_folder(parent_path: &str, file_path: &str) -> bool {
    parent_path.ends_with(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeSection;
    use std::collections::HashSet;

    fn extent(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> StmtExtent {
        StmtExtent {
            start_offset: start_line * 100 + start_col,
            start_line,
            start_col,
            end_offset: end_line * 100 + end_col,
            end_line,
            end_col,
        }
    }

    fn statement(se: &StmtExtent) -> Statement {
        Statement {
            start_line: se.start_line,
            end_line: se.end_line,
            start: se.start_offset,
            end: se.end_offset,
            reached: 0,
            mode: Mode::Keep,
            state: State::Original,
        }
    }

    fn block(
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
        count: i64,
    ) -> ProfileBlock {
        ProfileBlock {
            start_line,
            start_col,
            end_line,
            end_col,
            num_stmt: 1,
            count,
        }
    }

    fn no_ignore() -> IgnoreProfile {
        IgnoreProfile {
            kind: IgnoreType::None,
            blocks: HashSet::new(),
        }
    }

    #[test]
    fn test_in_folder_suffix_match() {
        assert!(in_folder("/repo/pkg/a.go", "pkg/a.go"));
        assert!(!in_folder("/repo/pkg/a.go", "pkg/b.go"));
    }

    #[test]
    fn test_find_state() {
        let change = Change {
            file_name: "pkg/a.go".to_string(),
            sections: vec![ChangeSection {
                start_line: 10,
                end_line: 12,
            }],
        };

        // Overlapping at one line is enough.
        assert_eq!(
            find_state(&extent(12, 1, 14, 2), Some(&change)),
            State::Changed
        );
        assert_eq!(
            find_state(&extent(5, 1, 9, 2), Some(&change)),
            State::Original
        );
        assert_eq!(
            find_state(&extent(13, 1, 14, 2), Some(&change)),
            State::Original
        );
        // No change for the file means everything is original.
        assert_eq!(find_state(&extent(10, 1, 12, 2), None), State::Original);
    }

    #[test]
    fn test_reconcile_sums_all_overlapping_blocks() {
        let se = extent(5, 1, 9, 10);
        let mut stmt = statement(&se);
        let blocks = vec![
            block(1, 1, 4, 20, 7),  // ends before: discarded
            block(4, 1, 5, 1, 3),   // ends exactly at statement start col: before
            block(4, 1, 6, 2, 2),   // overlaps
            block(7, 1, 8, 2, 4),   // overlaps
            block(9, 10, 11, 2, 9), // starts at statement end col: after
        ];

        let mut cursor = 0;
        reconcile(&mut stmt, &se, &blocks, &mut cursor, &no_ignore());
        assert_eq!(stmt.reached, 6);
        assert_eq!(stmt.mode, Mode::Keep);
        // The first two blocks are consumed for good; the overlap at index 2
        // stays available for the next statement.
        assert_eq!(cursor, 2);
    }

    #[test]
    fn test_reconcile_cursor_never_rewinds() {
        let first = extent(2, 1, 2, 20);
        let second = extent(4, 1, 4, 20);
        let blocks = vec![block(1, 1, 2, 30, 5), block(3, 1, 5, 2, 1)];

        let mut cursor = 0;
        let mut s1 = statement(&first);
        reconcile(&mut s1, &first, &blocks, &mut cursor, &no_ignore());
        let mut s2 = statement(&second);
        reconcile(&mut s2, &second, &blocks, &mut cursor, &no_ignore());

        assert_eq!(s1.reached, 5);
        assert_eq!(s2.reached, 1);
    }

    #[test]
    fn test_reconcile_block_ignore_is_sticky() {
        let se = extent(5, 1, 9, 10);
        let mut stmt = statement(&se);
        let ignored = block(4, 1, 6, 2, 2);
        let blocks = vec![ignored, block(7, 1, 8, 2, 4)];
        let ignore = IgnoreProfile {
            kind: IgnoreType::None,
            blocks: HashSet::from([ignored]),
        };

        let mut cursor = 0;
        reconcile(&mut stmt, &se, &blocks, &mut cursor, &ignore);
        // Count still accumulates; mode stays Ignore despite the later
        // non-ignored block.
        assert_eq!(stmt.reached, 6);
        assert_eq!(stmt.mode, Mode::Ignore);
    }

    #[test]
    fn test_find_change_by_suffix() {
        let entry = ProfileEntry {
            file_name: "example.com/mod/pkg/a.go".to_string(),
            blocks: vec![],
        };
        let changes = vec![
            Change {
                file_name: "pkg/b.go".to_string(),
                sections: vec![],
            },
            Change {
                file_name: "pkg/a.go".to_string(),
                sections: vec![],
            },
        ];
        let found = find_change(&entry, &changes).unwrap();
        assert_eq!(found.file_name, "pkg/a.go");
        assert!(find_change(
            &ProfileEntry {
                file_name: "example.com/mod/pkg/c.go".to_string(),
                blocks: vec![],
            },
            &changes
        )
        .is_none());
    }
}
