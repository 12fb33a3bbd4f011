//! Inline ignore annotations.
//!
//! Source files can opt statements out of coverage accounting with comment
//! directives:
//!
//!   //+gocover:ignore:file    suppress the whole file
//!   //+gocover:ignore:block   suppress the profile block containing the line
//!
//! The parsed result is applied during reconciliation: ignored statements
//! keep `Mode::Ignore` and are excluded from reported metrics.

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::error::{CovError, Result};
use crate::profile::{ProfileBlock, ProfileEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreType {
    None,
    FileIgnore,
}

/// Per-file ignore classification.
#[derive(Debug)]
pub struct IgnoreProfile {
    pub kind: IgnoreType,
    /// Profile blocks annotated with a block-level directive.
    pub blocks: HashSet<ProfileBlock>,
}

fn directive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*//\s*\+gocover:ignore:(\S+)").unwrap())
}

/// Scan a source file for ignore directives and relate block-level ones to
/// the profile blocks whose span contains them.
pub fn parse_ignore_profile(file: &Path, entry: &ProfileEntry) -> Result<IgnoreProfile> {
    let source = std::fs::read_to_string(file)?;
    parse_ignore_source(&source, entry)
}

/// As [`parse_ignore_profile`], but over already-loaded source text.
pub fn parse_ignore_source(source: &str, entry: &ProfileEntry) -> Result<IgnoreProfile> {
    let mut profile = IgnoreProfile {
        kind: IgnoreType::None,
        blocks: HashSet::new(),
    };

    for (idx, line) in source.lines().enumerate() {
        let Some(captures) = directive_pattern().captures(line) else {
            continue;
        };
        let line_number = idx + 1;
        match &captures[1] {
            "file" => {
                debug!(line = line_number, "file-level ignore directive");
                profile.kind = IgnoreType::FileIgnore;
            }
            "block" => {
                for block in entry
                    .blocks
                    .iter()
                    .filter(|b| b.start_line <= line_number && line_number <= b.end_line)
                {
                    profile.blocks.insert(*block);
                }
            }
            other => {
                return Err(CovError::Annotation(format!(
                    "unknown ignore kind {other:?} at line {line_number}"
                )));
            }
        }
    }

    Ok(profile)
}
