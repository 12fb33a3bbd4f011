//! Output formatting for change-aware coverage results.

use std::fmt::Write;

use serde::Serialize;

use crate::model::{rate, Mode, Packages, State};

/// Per-package coverage rollup. Ignored statements are excluded everywhere.
#[derive(Debug, Clone, Serialize)]
pub struct PackageSummary {
    pub name: String,
    pub total_statements: u64,
    pub covered_statements: u64,
    /// Statements whose span intersects a diff hunk.
    pub changed_statements: u64,
    pub covered_changed_statements: u64,
}

impl PackageSummary {
    #[must_use]
    pub fn coverage(&self) -> f64 {
        rate(self.covered_statements, self.total_statements)
    }

    #[must_use]
    pub fn changed_coverage(&self) -> f64 {
        rate(self.covered_changed_statements, self.changed_statements)
    }
}

/// Aggregated coverage data, ready to be formatted.
#[derive(Debug, Serialize)]
pub struct CoverageReport {
    pub packages: Vec<PackageSummary>,
    pub total_statements: u64,
    pub covered_statements: u64,
    pub changed_statements: u64,
    pub covered_changed_statements: u64,
}

impl CoverageReport {
    /// Roll up a parsed coverage model.
    #[must_use]
    pub fn build(packages: &Packages) -> Self {
        let mut rows: Vec<PackageSummary> = packages
            .iter()
            .map(|pkg| {
                let mut summary = PackageSummary {
                    name: pkg.name.clone(),
                    total_statements: 0,
                    covered_statements: 0,
                    changed_statements: 0,
                    covered_changed_statements: 0,
                };
                for function in &pkg.functions {
                    for stmt in &function.statements {
                        if stmt.mode == Mode::Ignore {
                            continue;
                        }
                        summary.total_statements += 1;
                        if stmt.is_covered() {
                            summary.covered_statements += 1;
                        }
                        if stmt.state == State::Changed {
                            summary.changed_statements += 1;
                            if stmt.is_covered() {
                                summary.covered_changed_statements += 1;
                            }
                        }
                    }
                }
                summary
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));

        let total_statements = rows.iter().map(|r| r.total_statements).sum();
        let covered_statements = rows.iter().map(|r| r.covered_statements).sum();
        let changed_statements = rows.iter().map(|r| r.changed_statements).sum();
        let covered_changed_statements =
            rows.iter().map(|r| r.covered_changed_statements).sum();

        Self {
            packages: rows,
            total_statements,
            covered_statements,
            changed_statements,
            covered_changed_statements,
        }
    }

    #[must_use]
    pub fn coverage(&self) -> f64 {
        rate(self.covered_statements, self.total_statements)
    }

    /// Coverage over changed statements only; 0.0 when nothing changed.
    #[must_use]
    pub fn changed_coverage(&self) -> f64 {
        rate(self.covered_changed_statements, self.changed_statements)
    }

    /// Format using a specific formatter.
    #[must_use]
    pub fn format(&self, formatter: &dyn ReportFormatter) -> String {
        formatter.format(self)
    }
}

/// Trait for formatting coverage reports.
pub trait ReportFormatter {
    /// Format the report to a string.
    fn format(&self, report: &CoverageReport) -> String;
}

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, report: &CoverageReport) -> String {
        let mut out = String::new();

        if report.total_statements == 0 {
            out.push_str("No statements found in coverage profiles.\n");
            return out;
        }

        writeln!(
            out,
            "{:<50} {:>10} {:>8} {:>10} {:>10}",
            "PACKAGE", "STMTS", "COVER", "CHANGED", "CHG COVER"
        )
        .unwrap();
        writeln!(out, "{}", "-".repeat(92)).unwrap();

        for pkg in &report.packages {
            let changed_cover = if pkg.changed_statements > 0 {
                format!("{:.1}%", pkg.changed_coverage() * 100.0)
            } else {
                "-".to_string()
            };
            writeln!(
                out,
                "{:<50} {:>10} {:>7.1}% {:>10} {:>10}",
                pkg.name,
                pkg.total_statements,
                pkg.coverage() * 100.0,
                pkg.changed_statements,
                changed_cover,
            )
            .unwrap();
        }

        out.push('\n');
        let covered = report.covered_statements;
        let total = report.total_statements;
        let pct = report.coverage() * 100.0;
        writeln!(out, "Total coverage: {pct:.1}% ({covered}/{total} statements)").unwrap();

        if report.changed_statements > 0 {
            let covered = report.covered_changed_statements;
            let total = report.changed_statements;
            let pct = report.changed_coverage() * 100.0;
            writeln!(
                out,
                "Changed-code coverage: {pct:.1}% ({covered}/{total} statements)"
            )
            .unwrap();
        } else {
            writeln!(out, "No changed statements in this diff.").unwrap();
        }

        out
    }
}

/// Markdown formatter.
pub struct MarkdownFormatter;

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &CoverageReport) -> String {
        let mut md = String::new();

        if report.changed_statements > 0 {
            let pct = report.changed_coverage() * 100.0;
            writeln!(md, "### Changed-Code Coverage: {pct:.1}%\n").unwrap();
            let covered = report.covered_changed_statements;
            let total = report.changed_statements;
            writeln!(md, "**{covered}** of **{total}** changed statements covered\n").unwrap();
        } else {
            writeln!(md, "### Coverage\n").unwrap();
            md.push_str("No changed statements in this diff.\n\n");
        }

        md.push_str("| Package | Stmts | Cover | Changed | Changed cover |\n");
        md.push_str("|:--------|------:|------:|--------:|--------------:|\n");
        for pkg in &report.packages {
            let changed_cover = if pkg.changed_statements > 0 {
                format!("{:.0}%", pkg.changed_coverage() * 100.0)
            } else {
                "-".to_string()
            };
            writeln!(
                md,
                "| `{}` | {} | {:.0}% | {} | {} |",
                pkg.name,
                pkg.total_statements,
                pkg.coverage() * 100.0,
                pkg.changed_statements,
                changed_cover,
            )
            .unwrap();
        }

        let pct = report.coverage() * 100.0;
        writeln!(md, "\n<sub>Total coverage: **{pct:.1}%**</sub>").unwrap();

        md
    }
}
