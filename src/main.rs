use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;

use covdelta::diff::{DiffSource, GitDiff, StdinDiff};
use covdelta::model::Change;
use covdelta::parser::Parser;
use covdelta::report::{CoverageReport, MarkdownFormatter, TextFormatter};
use covdelta::resolver::Resolver;

/// Statement-level Go coverage, correlated with diff hunks.
#[derive(ClapParser)]
#[command(name = "covdelta", version, about)]
struct Cli {
    /// Cover profile files (as produced by `go test -coverprofile`).
    #[arg(required = true)]
    profiles: Vec<PathBuf>,

    /// Source roots to resolve profile paths against (default: cwd).
    #[arg(long = "root")]
    roots: Vec<PathBuf>,

    /// Git diff arguments, e.g. "HEAD~1" or "main..HEAD".
    #[arg(long)]
    git_diff: Option<String>,

    /// Read a unified diff from stdin instead of running git.
    #[arg(long, conflicts_with = "git_diff")]
    diff_stdin: bool,

    /// Output format (text, markdown, json).
    #[arg(long, default_value = "text")]
    format: String,

    /// Fail (exit 1) when changed-code coverage is below this percentage.
    #[arg(long)]
    threshold: Option<f64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let changes = load_changes(&cli)?;

    let roots = if cli.roots.is_empty() {
        vec![std::env::current_dir().context("Failed to get current directory")?]
    } else {
        cli.roots.clone()
    };

    let parser = Parser::new(cli.profiles.clone(), Resolver::new(roots));
    let packages = parser.parse(&changes)?;
    let report = CoverageReport::build(&packages);

    match cli.format.as_str() {
        "text" => print!("{}", report.format(&TextFormatter)),
        "markdown" => print!("{}", report.format(&MarkdownFormatter)),
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        other => anyhow::bail!("Unknown format: '{other}'. Supported: text, markdown, json"),
    }

    if let Some(threshold) = cli.threshold {
        let pct = report.changed_coverage() * 100.0;
        if report.changed_statements > 0 && pct < threshold {
            eprintln!("Changed-code coverage {pct:.1}% is below threshold {threshold:.1}%");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn load_changes(cli: &Cli) -> Result<Vec<Change>> {
    let diff_text = if let Some(ref args) = cli.git_diff {
        Some(GitDiff { args: args.clone() }.fetch_diff()?)
    } else if cli.diff_stdin {
        Some(StdinDiff.fetch_diff()?)
    } else {
        None
    };

    Ok(diff_text
        .as_deref()
        .map(covdelta::diff::parse_changes)
        .unwrap_or_default())
}
