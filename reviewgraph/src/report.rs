use std::fmt::Write as _;
use std::io;

use serde::Serialize;

use crate::finding::{Finding, GeneratedFix, Severity};
use crate::state::{ReviewState, StageError};

pub trait ReportFormatter {
    fn write_report(&self, state: &ReviewState, writer: &mut dyn io::Write) -> io::Result<()>;
}

/// Render the review as Markdown. Findings below `threshold` are omitted
/// from the detail sections but still counted in the summary.
pub fn render_markdown(state: &ReviewState, threshold: Severity) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Code Review Report\n");
    let _ = writeln!(
        out,
        "- Repository: `{}`",
        state.repository_path.display()
    );
    let _ = writeln!(out, "- Files analyzed: {}", state.files_analyzed);
    let _ = writeln!(out, "- Findings: {}", state.all_findings.len());

    if state.all_findings.is_empty() {
        let _ = writeln!(out, "\nNo issues found.");
        return out;
    }

    let _ = writeln!(out, "\n## Summary by severity\n");
    for severity in [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ] {
        let count = state
            .all_findings
            .iter()
            .filter(|f| f.severity == severity)
            .count();
        if count > 0 {
            let _ = writeln!(out, "- {severity}: {count}");
        }
    }

    let _ = writeln!(out, "\n## Findings\n");
    for finding in state
        .prioritized_issues
        .iter()
        .filter(|f| f.severity.is_at_least(threshold))
    {
        write_finding(&mut out, finding);
    }

    if !state.generated_fixes.is_empty() {
        let _ = writeln!(out, "## Proposed fixes\n");
        for fix in &state.generated_fixes {
            let _ = writeln!(out, "- `{}` ({})", fix.finding_id, fix.status);
        }
        let _ = writeln!(out);
    }

    if !state.errors.is_empty() {
        let _ = writeln!(out, "## Stage errors\n");
        for StageError { stage, message } in &state.errors {
            let _ = writeln!(out, "- `{stage}`: {message}");
        }
    }

    out
}

fn write_finding(out: &mut String, finding: &Finding) {
    let _ = writeln!(out, "### {}\n", finding.title);
    let _ = writeln!(out, "- **Severity**: {}", finding.severity);
    let _ = writeln!(out, "- **Category**: {}", finding.category);
    let _ = writeln!(out, "- **File**: `{}:{}`", finding.file, finding.line);
    if let Some(cwe) = &finding.cwe_id {
        let _ = writeln!(out, "- **CWE**: {cwe}");
    }
    if !finding.description.is_empty() {
        let _ = writeln!(out, "- **Description**: {}", finding.description);
    }
    if !finding.recommendation.is_empty() {
        let _ = writeln!(out, "- **Recommendation**: {}", finding.recommendation);
    }
    let _ = writeln!(out);
}

pub struct MarkdownReport {
    pub threshold: Severity,
}

impl ReportFormatter for MarkdownReport {
    fn write_report(&self, state: &ReviewState, writer: &mut dyn io::Write) -> io::Result<()> {
        writer.write_all(render_markdown(state, self.threshold).as_bytes())
    }
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    repository: String,
    files_analyzed: usize,
    total_files: usize,
    findings: &'a [Finding],
    quick_wins: &'a [Finding],
    generated_fixes: &'a [GeneratedFix],
    errors: &'a [StageError],
}

pub struct JsonReport;

impl ReportFormatter for JsonReport {
    fn write_report(&self, state: &ReviewState, writer: &mut dyn io::Write) -> io::Result<()> {
        let doc = JsonDocument {
            repository: state.repository_path.display().to_string(),
            files_analyzed: state.files_analyzed,
            total_files: state.total_files,
            findings: &state.prioritized_issues,
            quick_wins: &state.quick_wins,
            generated_fixes: &state.generated_fixes,
            errors: &state.errors,
        };
        serde_json::to_writer_pretty(&mut *writer, &doc)?;
        writeln!(writer)?;
        Ok(())
    }
}

pub fn formatter(json: bool, threshold: Severity) -> Box<dyn ReportFormatter> {
    if json {
        Box::new(JsonReport)
    } else {
        Box::new(MarkdownReport { threshold })
    }
}
