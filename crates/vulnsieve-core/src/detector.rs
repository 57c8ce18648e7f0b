use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::classifier::Severity;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::rules::{Catalog, Category};
use crate::scanner::SourceWalker;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub file: String,
    pub line: usize,
    pub category: Category,
    pub description: &'static str,
    pub snippet: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub findings: Vec<Finding>,
    pub files_scanned: usize,
}

pub struct Analyzer {
    catalog: Arc<Catalog>,
}

impl Analyzer {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Walk `target` and scan every eligible file, up to `config.max_files`.
    ///
    /// Only an unusable root fails the scan. Files that cannot be read still
    /// count as scanned but contribute no findings; bytes that are not valid
    /// UTF-8 are replaced and the rest of the file is scanned.
    pub fn analyze_path(&self, target: &Path, config: &ScanConfig) -> Result<ScanResult, ScanError> {
        let mut walker = SourceWalker::new(target, config)?;
        info!(target = %target.display(), max_files = config.max_files, "scanning");

        let mut findings = Vec::new();
        for path in walker.by_ref() {
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping unreadable file");
                    continue;
                }
            };
            let content = String::from_utf8_lossy(&bytes);
            let relative = relative_path(target, &path);
            findings.extend(self.scan_content(&relative, &content));
        }

        let files_scanned = walker.files_yielded();
        info!(files_scanned, findings = findings.len(), "scan finished");
        Ok(ScanResult {
            findings,
            files_scanned,
        })
    }

    /// Match the catalog against one file's text.
    ///
    /// Order is category, then rule, then ascending line number. A line can
    /// produce several findings; nothing is deduplicated.
    pub fn scan_content(&self, file: &str, content: &str) -> Vec<Finding> {
        let lines = content.split('\n').collect::<Vec<_>>();
        let mut findings = Vec::new();

        for (category, rules) in self.catalog.groups() {
            let severity = category.severity();
            for rule in rules {
                for (line_no, line) in lines.iter().enumerate() {
                    if !rule.matches_line(line) {
                        continue;
                    }
                    findings.push(Finding {
                        file: file.to_string(),
                        line: line_no + 1,
                        category,
                        description: rule.description,
                        snippet: line.trim().to_string(),
                        severity,
                    });
                }
            }
        }

        findings
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    if root.is_file() {
        if let Some(name) = path.file_name() {
            return name.to_string_lossy().to_string();
        }
        return path.display().to_string();
    }

    match path.strip_prefix(root) {
        Ok(p) => p.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn analyzer() -> Analyzer {
        Analyzer::new(Arc::new(Catalog::builtin().expect("catalog")))
    }

    // One line per rule, each triggering that rule and nothing else.
    const RULE_SAMPLES: &[(&str, Category, &str)] = &[
        (
            r#"cursor.execute("SELECT * FROM t WHERE id=%s" % uid)"#,
            Category::SqlInjection,
            "String formatting in SQL query",
        ),
        (
            "cursor.execute(sql + where)",
            Category::SqlInjection,
            "String concatenation in SQL query",
        ),
        (
            r#"query = "{}".format("SELECT id FROM users")"#,
            Category::SqlInjection,
            "String formatting with SELECT",
        ),
        (
            r#"query = "SELECT * FROM t WHERE id=" + user_id"#,
            Category::SqlInjection,
            "SQL statement built by string concatenation",
        ),

        (
            "el.innerHTML = userValue;",
            Category::Xss,
            "Potential XSS via innerHTML",
        ),
        (
            "document.write(msg);",
            Category::Xss,
            "Unsafe document.write usage",
        ),
        ("result = eval(expr)", Category::Xss, "Dangerous eval() usage"),
        (
            r#"os.system("ping " + host)"#,
            Category::CommandInjection,
            "Command injection via os.system",
        ),
        (
            "subprocess.run(cmd, shell=True)",
            Category::CommandInjection,
            "Shell injection risk",
        ),
        (
            r#"exec(input("code: "))"#,
            Category::CommandInjection,
            "Executing user input",
        ),
        (
            "fh = open(user_input)",
            Category::PathTraversal,
            "User input in file path",
        ),
        (
            r#"full = os.path.join(base, request.args["name"])"#,
            Category::PathTraversal,
            "Request data in path",
        ),
        (
            r#"password = "hunter2""#,
            Category::HardcodedSecrets,
            "Hardcoded password",
        ),
        (
            r#"api_key = "abc123""#,
            Category::HardcodedSecrets,
            "Hardcoded API key",
        ),
        (
            r#"secret = "s3cr3t""#,
            Category::HardcodedSecrets,
            "Hardcoded secret",
        ),
        (
            r#"token = "abcdefghijklmnopqrstuvwxyz""#,
            Category::HardcodedSecrets,
            "Hardcoded token",
        ),
    ];

    // Lines that look close to a rule but must not trigger anything.
    const NEAR_MISSES: &[&str] = &[
        r#"msg = "Please update your profile, " + name"#,
        r#"title = "Select an option" + suffix"#,
        r#"note = "deleted " + count"#,
        r#"token = "short""#,
        r#"password = "{{ vault }}"{"#,
    ];

    #[test]
    fn near_misses_produce_no_findings() {
        let analyzer = analyzer();
        for line in NEAR_MISSES {
            let findings = analyzer.scan_content("sample.py", line);
            assert!(findings.is_empty(), "unexpected findings for {line:?}: {findings:?}");
        }
    }

    #[test]
    fn concatenated_statements_need_sql_shape() {
        let analyzer = analyzer();
        for line in [
            r#"stmt = "UPDATE users SET active=0 WHERE id=" + uid"#,
            r#"stmt = "DELETE FROM sessions WHERE user=" + uid"#,
            r#"stmt = "INSERT INTO audit VALUES (" + row + ")""#,
        ] {
            let findings = analyzer.scan_content("sample.py", line);
            assert_eq!(findings.len(), 1, "expected one finding for {line:?}: {findings:?}");
            assert_eq!(findings[0].description, "SQL statement built by string concatenation");
        }
    }

    #[test]
    fn every_rule_has_a_single_line_trigger() {
        let analyzer = analyzer();
        assert_eq!(RULE_SAMPLES.len(), analyzer.catalog().len());

        for (line, category, description) in RULE_SAMPLES {
            let findings = analyzer.scan_content("sample.py", line);
            assert_eq!(findings.len(), 1, "expected one finding for {line:?}: {findings:?}");
            let finding = &findings[0];
            assert_eq!(finding.category, *category);
            assert_eq!(finding.description, *description);
            assert_eq!(finding.severity, category.severity());
            assert_eq!(finding.line, 1);
        }
    }

    #[test]
    fn clean_content_has_no_findings() {
        let analyzer = analyzer();
        let content = "def add(a, b):\n    return a + b\n\nprint(add(1, 2))\n";
        assert!(analyzer.scan_content("clean.py", content).is_empty());
    }

    #[test]
    fn findings_follow_category_then_rule_then_line_order() {
        let analyzer = analyzer();
        let content = [
            r#"password = "hunter2""#,
            "result = eval(expr)",
            r#"query = "SELECT * FROM t WHERE id=" + user_id"#,
            "other = eval(more)",
        ]
        .join("\n");

        let found = analyzer
            .scan_content("mixed.py", &content)
            .into_iter()
            .map(|f| (f.category, f.line))
            .collect::<Vec<_>>();
        assert_eq!(
            found,
            vec![
                (Category::SqlInjection, 3),
                (Category::Xss, 2),
                (Category::Xss, 4),
                (Category::HardcodedSecrets, 1),
            ]
        );
    }

    #[test]
    fn one_line_can_trigger_several_rules() {
        let analyzer = analyzer();
        let line = r#"cursor.execute("SELECT * FROM t WHERE id=" + uid)"#;
        let descriptions = analyzer
            .scan_content("db.py", line)
            .into_iter()
            .map(|f| f.description)
            .collect::<Vec<_>>();
        assert_eq!(
            descriptions,
            vec![
                "String concatenation in SQL query",
                "SQL statement built by string concatenation",
            ]
        );
    }

    #[test]
    fn snippet_is_trimmed_and_lines_are_one_based() {
        let analyzer = analyzer();
        let content = "\n\n        result = eval(expr)   \r\n";
        let findings = analyzer.scan_content("app.js", content);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 3);
        assert_eq!(findings[0].snippet, "result = eval(expr)");
    }

    #[test]
    fn scanning_is_idempotent() {
        let analyzer = analyzer();
        let content = "a = eval(x)\npassword = \"p\"\nos.system(\"rm \" + f)\n";
        let first = analyzer.scan_content("f.py", content);
        let second = analyzer.scan_content("f.py", content);
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_utf8_bytes_do_not_hide_findings() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("bad.py"), [0xff, 0xfe, b'e', b'v', b'a', b'l', b'(']).expect("write");
        fs::write(dir.path().join("good.py"), "x = eval(y)\n").expect("write");

        let result = analyzer()
            .analyze_path(dir.path(), &ScanConfig::default())
            .expect("scan");
        assert_eq!(result.files_scanned, 2);
        let files = result
            .findings
            .iter()
            .map(|f| f.file.as_str())
            .collect::<Vec<_>>();
        assert_eq!(files, vec!["bad.py", "good.py"]);
    }

    #[test]
    fn latin1_comment_keeps_matches_on_other_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("legacy.py"), b"# caf\xe9\nx = eval(user)\n").expect("write");

        let result = analyzer()
            .analyze_path(dir.path(), &ScanConfig::default())
            .expect("scan");
        assert_eq!(result.files_scanned, 1);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].line, 2);
        assert_eq!(result.findings[0].snippet, "x = eval(user)");
    }

    #[test]
    fn single_file_findings_use_the_file_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("handler.py");
        fs::write(&file, "data = open(input_path)\n").expect("write");

        let result = analyzer()
            .analyze_path(&file, &ScanConfig::default())
            .expect("scan");
        assert_eq!(result.files_scanned, 1);
        assert_eq!(result.findings[0].file, "handler.py");
        assert_eq!(result.findings[0].severity, Severity::Medium);
    }

    #[test]
    fn capped_scan_reports_exactly_the_cap() {
        let dir = tempfile::tempdir().expect("tempdir");
        for i in 0..7 {
            fs::write(dir.path().join(format!("f{i}.py")), "print('hi')\n").expect("write");
        }

        let result = analyzer()
            .analyze_path(dir.path(), &ScanConfig::default().with_max_files(4))
            .expect("scan");
        assert_eq!(result.files_scanned, 4);
    }
}
