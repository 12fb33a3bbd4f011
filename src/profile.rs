//! Decoder for Go's `-coverprofile` text format.
//!
//! Format:
//!   mode: set|count|atomic
//!   <file>:<startLine>.<startCol>,<endLine>.<endCol> <numStatements> <count>
//!
//! Each line describes one profile block: a contiguous source span the
//! instrumenter treated as a single execution unit, with its hit count.
//! Unlike line-oriented coverage stores, the block list is kept intact with
//! full line/column granularity; statement reconciliation needs columns.
//!
//! Blocks for one file arrive sorted by start position; that is an invariant
//! of the format and is not re-established here.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{CovError, Result};

/// One instrumented block from the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileBlock {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
    pub num_stmt: usize,
    pub count: i64,
}

/// All blocks for one source file, in profile order.
#[derive(Debug, Clone)]
pub struct ProfileEntry {
    /// File path as recorded in the profile (import path + file name).
    pub file_name: String,
    pub blocks: Vec<ProfileBlock>,
}

/// Parse a cover profile from disk.
pub fn parse_file(path: &Path) -> Result<Vec<ProfileEntry>> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

/// Parse cover profile text into per-file block lists, preserving the order
/// in which files first appear.
pub fn parse(input: &str) -> Result<Vec<ProfileEntry>> {
    let mut file_order: Vec<String> = Vec::new();
    let mut file_blocks: HashMap<String, Vec<ProfileBlock>> = HashMap::new();

    for (idx, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with("mode:") {
            continue;
        }

        let (file, block) = parse_block_line(line).ok_or_else(|| CovError::ProfileFormat {
            line: idx + 1,
            message: format!("expected 'file.go:sl.sc,el.ec numStmt count', got {line:?}"),
        })?;

        let file_str = file.to_string();
        if !file_blocks.contains_key(&file_str) {
            file_order.push(file_str.clone());
        }
        file_blocks.entry(file_str).or_default().push(block);
    }

    Ok(file_order
        .into_iter()
        .map(|file_name| {
            let blocks = file_blocks.remove(&file_name).unwrap_or_default();
            ProfileEntry { file_name, blocks }
        })
        .collect())
}

/// Parse a single block line, returning (file_path, block).
fn parse_block_line(line: &str) -> Option<(&str, ProfileBlock)> {
    // Anchor on the last ':' to split the file path from the block range.
    // This naturally handles paths containing colons.
    let colon_pos = line.rfind(':')?;
    let file = &line[..colon_pos];
    let rest = &line[colon_pos + 1..];
    if file.is_empty() {
        return None;
    }

    // rest = "startLine.startCol,endLine.endCol numStmt count"
    let (range, tail) = rest.split_once(' ')?;
    let (start, end) = range.split_once(',')?;

    let (start_line, start_col) = parse_position(start)?;
    let (end_line, end_col) = parse_position(end)?;

    let mut parts = tail.split_whitespace();
    let num_stmt: usize = parts.next()?.parse().ok()?;
    let count: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    Some((
        file,
        ProfileBlock {
            start_line,
            start_col,
            end_line,
            end_col,
            num_stmt,
            count,
        },
    ))
}

/// Parse "line.col" into a (line, col) pair.
fn parse_position(s: &str) -> Option<(usize, usize)> {
    let (line, col) = s.split_once('.')?;
    Some((line.parse().ok()?, col.parse().ok()?))
}
