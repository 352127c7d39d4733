//! Check reporting and export
//!
//! Generates reports in various formats for CI/CD integration. Every entry
//! carries its seed so a failing check can be replayed with `TEST_SEED`.

use crate::runner::CheckResult;
use serde::{Deserialize, Serialize};

// ============================================================================
// Report Formats
// ============================================================================

/// Full run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    /// Report timestamp (Unix ms)
    pub timestamp_ms: i64,
    /// Git commit hash
    pub git_commit: Option<String>,
    /// Branch name
    pub git_branch: Option<String>,
    /// Test environment
    pub environment: String,
    /// Total duration (ms)
    pub total_duration_ms: u64,
    /// All check results
    pub results: Vec<CheckResult>,
    /// Summary stats
    pub summary: ReportSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportSummary {
    pub total_checks: u32,
    pub checks_passed: u32,
    pub checks_failed: u32,
    /// Configured cases summed over all checks
    pub total_cases: u64,
    /// Seeds of failing checks, in run order
    pub failing_seeds: Vec<i64>,
}

impl CheckReport {
    pub fn new(results: Vec<CheckResult>) -> Self {
        let total_checks = results.len() as u32;
        let checks_passed = results.iter().filter(|r| r.passed).count() as u32;
        let checks_failed = total_checks - checks_passed;
        let total_cases: u64 = results.iter().map(|r| r.cases as u64).sum();
        let failing_seeds = results.iter().filter(|r| !r.passed).map(|r| r.seed).collect();
        let total_duration_ms = results.iter().map(|r| r.duration_ms).sum();

        Self {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            git_commit: git_commit(),
            git_branch: git_branch(),
            environment: environment_name(),
            total_duration_ms,
            results,
            summary: ReportSummary {
                total_checks,
                checks_passed,
                checks_failed,
                total_cases,
                failing_seeds,
            },
        }
    }

    pub fn passed(&self) -> bool {
        self.summary.checks_failed == 0
    }

    /// Export as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Export as compact JSON (for CI)
    pub fn to_json_compact(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Plain text, one line per check
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            out.push_str(&result.summary_line());
            out.push('\n');
        }
        out.push_str(&format!(
            "TOTAL: {} checks, {} passed, {} failed ({} ms)\n",
            self.summary.total_checks,
            self.summary.checks_passed,
            self.summary.checks_failed,
            self.total_duration_ms
        ));
        for seed in &self.summary.failing_seeds {
            out.push_str(&format!("replay: TEST_SEED={}\n", seed));
        }
        out
    }

    /// Export as JUnit XML (for CI systems)
    pub fn to_junit_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<testsuite name=\"quick-check\" tests=\"{}\" failures=\"{}\" time=\"{}\">\n",
            self.summary.total_checks,
            self.summary.checks_failed,
            seconds(self.total_duration_ms)
        ));

        for result in &self.results {
            let name = escape_xml(&result.name);
            match &result.failure {
                None => xml.push_str(&format!(
                    "  <testcase name=\"{}\" time=\"{}\"/>\n",
                    name,
                    seconds(result.duration_ms)
                )),
                Some(failure) => {
                    xml.push_str(&format!(
                        "  <testcase name=\"{}\" time=\"{}\">\n",
                        name,
                        seconds(result.duration_ms)
                    ));
                    xml.push_str(&format!(
                        "    <failure message=\"{}\">seed={}{}</failure>\n",
                        escape_xml(&failure.to_string()),
                        result.seed,
                        failure
                            .counterexample()
                            .map(|c| format!(" input={}", escape_xml(c)))
                            .unwrap_or_default()
                    ));
                    xml.push_str("  </testcase>\n");
                }
            }
        }

        xml.push_str("</testsuite>\n");
        xml
    }

    /// Export as Markdown summary
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# Quick Check Report\n\n");
        md.push_str(&format!("**Date:** {}\n", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")));
        if let Some(ref commit) = self.git_commit {
            md.push_str(&format!("**Commit:** `{}`\n", commit));
        }
        if let Some(ref branch) = self.git_branch {
            md.push_str(&format!("**Branch:** `{}`\n", branch));
        }
        md.push_str(&format!("**Environment:** {}\n\n", self.environment));

        md.push_str("## Summary\n\n");
        md.push_str("| Metric | Value |\n");
        md.push_str("|--------|-------|\n");
        md.push_str(&format!("| Checks | {} ({} passed, {} failed) |\n",
            self.summary.total_checks, self.summary.checks_passed, self.summary.checks_failed));
        md.push_str(&format!("| Cases | {} |\n", self.summary.total_cases));
        md.push_str(&format!("| Duration | {} ms |\n\n", self.total_duration_ms));

        md.push_str("## Results\n\n");
        md.push_str("| Check | Seed | Cases | Status |\n");
        md.push_str("|-------|------|-------|--------|\n");

        for result in &self.results {
            let status = if result.passed { "✓" } else { "✗" };
            md.push_str(&format!("| {} | {} | {} | {} |\n",
                result.name, result.seed, result.cases, status));
        }

        let failed: Vec<_> = self.results.iter().filter(|r| !r.passed).collect();
        if !failed.is_empty() {
            md.push_str("\n## Failures\n\n");
            for result in failed {
                md.push_str(&format!("### {}\n\n", result.name));
                if let Some(ref failure) = result.failure {
                    md.push_str(&format!("- `{}`\n", failure));
                }
                md.push_str(&format!("- Replay: `TEST_SEED={}`\n\n", result.seed));
            }
        }

        md
    }

    /// Print to console
    pub fn print(&self) {
        print!("{}", self.to_text());
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

fn git_commit() -> Option<String> {
    git_output(&["rev-parse", "--short", "HEAD"])
}

fn git_branch() -> Option<String> {
    git_output(&["branch", "--show-current"])
}

fn git_output(args: &[&str]) -> Option<String> {
    std::process::Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn environment_name() -> String {
    if std::env::var("CI").is_ok() {
        "CI".to_string()
    } else {
        "local".to_string()
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
