//! Severity grouping and report rendering.

use std::fmt::Write as FmtWrite;

use serde_json::{json, Value};

use crate::classifier::Severity;
use crate::detector::{Finding, ScanResult};

/// Longest code snippet shown per finding, in characters.
pub const SNIPPET_WIDTH: usize = 100;

const RULE_WIDTH: usize = 70;

/// Findings bucketed by severity. Each bucket keeps scan order.
pub struct Report<'a> {
    files_scanned: usize,
    buckets: [Vec<&'a Finding>; 3],
}

impl<'a> Report<'a> {
    pub fn new(findings: &'a [Finding], files_scanned: usize) -> Self {
        let mut buckets: [Vec<&'a Finding>; 3] = Default::default();
        for finding in findings {
            buckets[bucket_index(finding.severity)].push(finding);
        }
        Self {
            files_scanned,
            buckets,
        }
    }

    pub fn from_result(result: &'a ScanResult) -> Self {
        Self::new(&result.findings, result.files_scanned)
    }

    pub fn files_scanned(&self) -> usize {
        self.files_scanned
    }

    pub fn bucket(&self, severity: Severity) -> &[&'a Finding] {
        &self.buckets[bucket_index(severity)]
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn render_text(&self) -> String {
        if self.total() == 0 {
            return format!(
                "No vulnerabilities found ({} files scanned)\n",
                self.files_scanned
            );
        }

        let rule = "=".repeat(RULE_WIDTH);
        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Vulnerability Scan Results");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Files Scanned: {}", self.files_scanned);
        let _ = writeln!(out, "Issues Found: {}", self.total());
        for severity in Severity::ALL {
            let label = format!("{}:", severity.as_str());
            let _ = writeln!(out, "  - {label:<7} {}", self.bucket(severity).len());
        }
        let _ = writeln!(out, "{rule}");

        for severity in Severity::ALL {
            let items = self.bucket(severity);
            if items.is_empty() {
                continue;
            }

            let _ = writeln!(out);
            let _ = writeln!(out, "{} Severity Issues ({}):", severity, items.len());
            let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));

            for (i, finding) in items.iter().enumerate() {
                let _ = writeln!(out);
                let _ = writeln!(out, "{}. {}", i + 1, finding.category);
                let _ = writeln!(out, "   File: {}:{}", finding.file, finding.line);
                let _ = writeln!(out, "   Issue: {}", finding.description);
                let _ = writeln!(out, "   Code: {}", truncate(&finding.snippet, SNIPPET_WIDTH));
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "{rule}");
        out
    }

    pub fn to_json(&self) -> Value {
        let ordered = Severity::ALL
            .iter()
            .flat_map(|severity| self.bucket(*severity).iter().copied())
            .collect::<Vec<_>>();

        json!({
            "files_scanned": self.files_scanned,
            "total": self.total(),
            "by_severity": {
                "high": self.bucket(Severity::High).len(),
                "medium": self.bucket(Severity::Medium).len(),
                "low": self.bucket(Severity::Low).len(),
            },
            "findings": ordered,
        })
    }
}

fn bucket_index(severity: Severity) -> usize {
    match severity {
        Severity::High => 0,
        Severity::Medium => 1,
        Severity::Low => 2,
    }
}

fn truncate(input: &str, width: usize) -> &str {
    match input.char_indices().nth(width) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}
