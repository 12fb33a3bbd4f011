//! Property-based tests for block–statement reconciliation.
//!
//! A generated function with one statement per line is reconciled against
//! randomly generated block layouts; the summed `reached` counts must match
//! a naive quadratic oracle over line intersection.

mod common;

use proptest::prelude::*;

use covdelta::parser::Parser;
use covdelta::resolver::Resolver;

const STMT_COUNT: usize = 8;
const FIRST_STMT_LINE: usize = 4;

/// A generated function: `x += 1` .. `x += 8` then `return x`, one statement
/// per line starting at line 4.
fn generated_source() -> String {
    let mut src = String::from("package pkg\n\nfunc F(x int) int {\n");
    for i in 1..=STMT_COUNT {
        src.push_str(&format!("\tx += {i}\n"));
    }
    src.push_str("\treturn x\n}\n");
    src
}

/// (start line offset, extra lines spanned, count) triples turned into
/// profile blocks sorted by start position, all spanning full columns.
fn arb_blocks() -> impl Strategy<Value = Vec<(usize, usize, i64)>> {
    prop::collection::vec(
        (0..=STMT_COUNT, 0..3usize, 0..10i64),
        0..12,
    )
    .prop_map(|mut blocks| {
        blocks.sort();
        blocks
    })
}

fn profile_text(blocks: &[(usize, usize, i64)]) -> String {
    let last_line = FIRST_STMT_LINE + STMT_COUNT;
    let mut text = String::from("mode: count\n");
    for &(offset, extra, count) in blocks {
        let start = FIRST_STMT_LINE + offset;
        let end = (start + extra).min(last_line);
        text.push_str(&format!(
            "example.com/mod/pkg/p.go:{start}.2,{end}.100 1 {count}\n"
        ));
    }
    text
}

/// Naive oracle: the reached count of the statement on `line` is the sum of
/// counts of every block whose line span contains it.
fn oracle(blocks: &[(usize, usize, i64)], line: usize) -> i64 {
    let last_line = FIRST_STMT_LINE + STMT_COUNT;
    blocks
        .iter()
        .filter(|&&(offset, extra, _)| {
            let start = FIRST_STMT_LINE + offset;
            let end = (start + extra).min(last_line);
            start <= line && line <= end
        })
        .map(|&(_, _, count)| count)
        .sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reconciliation_totality(blocks in arb_blocks()) {
        let source = generated_source();
        let repo = common::setup_repo(&[("pkg/p.go", source.as_str())]);
        let profile = common::write_profile(repo.path(), "cover.out", &profile_text(&blocks));

        let parser = Parser::new(
            vec![profile],
            Resolver::new(vec![repo.path().to_path_buf()]),
        );
        let packages = parser.parse(&[]).unwrap();

        let f = &packages.get("example.com/mod/pkg").unwrap().functions[0];
        prop_assert_eq!(f.statements.len(), STMT_COUNT + 1);

        for (i, stmt) in f.statements.iter().enumerate() {
            let line = FIRST_STMT_LINE + i;
            prop_assert_eq!(stmt.start_line, line);
            prop_assert_eq!(
                stmt.reached,
                oracle(&blocks, line),
                "statement at line {} disagrees with oracle (blocks: {:?})",
                line,
                &blocks
            );
        }
    }
}
