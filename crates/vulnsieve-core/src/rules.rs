//! Built-in pattern catalog.
//!
//! Rules are grouped by [`Category`] and kept in declaration order. The
//! line scanner walks categories, then rules, in exactly this order, so
//! changing the tables below changes the order of reported findings.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::classifier::{severity_of, Severity};
use crate::error::CatalogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    #[serde(rename = "SQL Injection")]
    SqlInjection,
    #[serde(rename = "XSS")]
    Xss,
    #[serde(rename = "Command Injection")]
    CommandInjection,
    #[serde(rename = "Path Traversal")]
    PathTraversal,
    #[serde(rename = "Hardcoded Secrets")]
    HardcodedSecrets,
}

impl Category {
    /// Declaration order.
    pub const ALL: [Category; 5] = [
        Category::SqlInjection,
        Category::Xss,
        Category::CommandInjection,
        Category::PathTraversal,
        Category::HardcodedSecrets,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::SqlInjection => "SQL Injection",
            Category::Xss => "XSS",
            Category::CommandInjection => "Command Injection",
            Category::PathTraversal => "Path Traversal",
            Category::HardcodedSecrets => "Hardcoded Secrets",
        }
    }

    pub fn severity(self) -> Severity {
        severity_of(self)
    }

    fn builtin_patterns(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Category::SqlInjection => SQL_INJECTION,
            Category::Xss => XSS,
            Category::CommandInjection => COMMAND_INJECTION,
            Category::PathTraversal => PATH_TRAVERSAL,
            Category::HardcodedSecrets => HARDCODED_SECRETS,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// (pattern, description)
// The last rule needs statement shape (SELECT..FROM, UPDATE x SET) inside the
// literal, so prose such as "update your profile" is not flagged.
const SQL_INJECTION: &[(&str, &str)] = &[
    (
        r#"execute\s*\(\s*['"].*%.*['"]\s*%"#,
        "String formatting in SQL query",
    ),
    (r"execute\s*\(\s*.*\+.*\)", "String concatenation in SQL query"),
    (r"\.format\s*\(.*SELECT", "String formatting with SELECT"),
    (
        r#"\b(?:select\b[^'"]*\bfrom|insert\s+into|update\s+\w+\s+set|delete\s+from)\b[^'"]*['"]\s*\+"#,
        "SQL statement built by string concatenation",
    ),
];

const XSS: &[(&str, &str)] = &[
    (r"innerHTML\s*=\s*[^;]+", "Potential XSS via innerHTML"),
    (r"document\.write\s*\(", "Unsafe document.write usage"),
    (r"eval\s*\(", "Dangerous eval() usage"),
];

const COMMAND_INJECTION: &[(&str, &str)] = &[
    (r"os\.system\s*\(.*\+", "Command injection via os.system"),
    (r"subprocess\..*shell\s*=\s*True", "Shell injection risk"),
    (r"exec\s*\(.*input", "Executing user input"),
];

const PATH_TRAVERSAL: &[(&str, &str)] = &[
    (r"open\s*\(.*input.*\)", "User input in file path"),
    (r"os\.path\.join\s*\(.*request\.", "Request data in path"),
];

// A literal directly followed by `{` is a template placeholder, not a secret.
const HARDCODED_SECRETS: &[(&str, &str)] = &[
    (
        r#"password\s*=\s*['"][^'"]+['"](?:[^{]|$)"#,
        "Hardcoded password",
    ),
    (
        r#"api[_-]?key\s*=\s*['"][^'"]+['"](?:[^{]|$)"#,
        "Hardcoded API key",
    ),
    (
        r#"secret\s*=\s*['"][^'"]+['"](?:[^{]|$)"#,
        "Hardcoded secret",
    ),
    (
        r#"token\s*=\s*['"][^'"]{20,}['"](?:[^{]|$)"#,
        "Hardcoded token",
    ),
];

#[derive(Debug, Clone)]
pub struct PatternRule {
    pub category: Category,
    pub pattern: Regex,
    pub description: &'static str,
}

impl PatternRule {
    pub fn compile(
        category: Category,
        pattern: &str,
        description: &'static str,
    ) -> Result<Self, CatalogError> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| CatalogError {
                category: category.name(),
                description,
                source,
            })?;
        Ok(Self {
            category,
            pattern,
            description,
        })
    }

    pub fn matches_line(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }

    pub fn severity(&self) -> Severity {
        self.category.severity()
    }
}

/// Ordered category → rules mapping. Read-only once built.
#[derive(Debug, Clone)]
pub struct Catalog {
    groups: Vec<(Category, Vec<PatternRule>)>,
}

impl Catalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        let mut groups = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let rules = category
                .builtin_patterns()
                .iter()
                .map(|&(pattern, description)| PatternRule::compile(category, pattern, description))
                .collect::<Result<Vec<_>, _>>()?;
            groups.push((category, rules));
        }
        Ok(Self { groups })
    }

    pub fn rules_for(&self, category: Category) -> &[PatternRule] {
        self.groups
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, rules)| rules.as_slice())
            .unwrap_or(&[])
    }

    /// Categories with their rules, in declaration order.
    pub fn groups(&self) -> impl Iterator<Item = (Category, &[PatternRule])> + '_ {
        self.groups
            .iter()
            .map(|(category, rules)| (*category, rules.as_slice()))
    }

    pub fn rules(&self) -> impl Iterator<Item = &PatternRule> + '_ {
        self.groups.iter().flat_map(|(_, rules)| rules.iter())
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, rules)| rules.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
