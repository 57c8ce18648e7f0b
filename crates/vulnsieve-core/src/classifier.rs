//! Severity tiers and the fixed category → tier table.

use std::fmt;

use serde::Serialize;

use crate::rules::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Report order: most severe first.
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];

    pub fn rank(self) -> u8 {
        match self {
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Injection-style flaws are HIGH, traversal-style flaws MEDIUM, the rest LOW.
pub fn severity_of(category: Category) -> Severity {
    match category {
        Category::SqlInjection | Category::CommandInjection | Category::Xss => Severity::High,
        Category::PathTraversal => Severity::Medium,
        Category::HardcodedSecrets => Severity::Low,
    }
}
