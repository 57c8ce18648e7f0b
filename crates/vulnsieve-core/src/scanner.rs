//! File eligibility and bounded directory traversal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, FilterEntry, WalkDir};

use crate::config::ScanConfig;
use crate::error::ScanError;

pub const SCANNABLE_EXTENSIONS: [&str; 13] = [
    "py", "js", "java", "php", "rb", "go", "c", "cpp", "h", "cs", "ts", "jsx", "tsx",
];

pub const PRUNED_DIRECTORIES: [&str; 9] = [
    "node_modules",
    ".git",
    "__pycache__",
    "venv",
    "env",
    ".venv",
    "dist",
    "build",
    "target",
];

/// True iff the extension (any case) is one we know how to scan.
pub fn is_scannable(path: &Path) -> bool {
    let Some(ext) = path.extension() else {
        return false;
    };
    let ext = ext.to_string_lossy().to_ascii_lowercase();
    SCANNABLE_EXTENSIONS.contains(&ext.as_str())
}

/// True iff a directory with this base name must not be descended into.
pub fn is_pruned_dir(name: &str) -> bool {
    PRUNED_DIRECTORIES.contains(&name)
}

type Entries = FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>;

enum Source {
    File(Option<PathBuf>),
    Tree(Entries),
}

/// Lazy, capped walk over the eligible files under a root.
///
/// Entries are visited depth-first with each directory's children in
/// lexical file-name order, so the files kept under a cap are always the
/// same ones. Pruned directories are filtered before walkdir reads them.
/// A root that is itself a file is yielded once, unfiltered and uncapped.
pub struct SourceWalker {
    source: Source,
    max_files: usize,
    yielded: usize,
}

impl SourceWalker {
    pub fn new(root: &Path, config: &ScanConfig) -> Result<Self, ScanError> {
        let meta = fs::metadata(root).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ScanError::PathNotFound(root.to_path_buf()),
            _ => ScanError::Inaccessible {
                path: root.to_path_buf(),
                reason: err.to_string(),
            },
        })?;

        let source = if meta.is_file() {
            Source::File(Some(root.to_path_buf()))
        } else {
            let mut walk = WalkDir::new(root).follow_links(false).sort_by_file_name();
            if !config.recursive {
                walk = walk.max_depth(1);
            }
            Source::Tree(walk.into_iter().filter_entry(keep_entry as fn(&DirEntry) -> bool))
        };

        Ok(Self {
            source,
            max_files: config.max_files,
            yielded: 0,
        })
    }

    /// Files handed out so far.
    pub fn files_yielded(&self) -> usize {
        self.yielded
    }
}

impl Iterator for SourceWalker {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        match &mut self.source {
            Source::File(slot) => {
                let path = slot.take()?;
                self.yielded += 1;
                Some(path)
            }
            Source::Tree(entries) => {
                if self.yielded >= self.max_files {
                    return None;
                }
                for entry in entries.by_ref() {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(err) => {
                            debug!(error = %err, "skipping unreadable entry");
                            continue;
                        }
                    };
                    if !is_regular_file(&entry) || !is_scannable(entry.path()) {
                        continue;
                    }
                    self.yielded += 1;
                    return Some(entry.into_path());
                }
                None
            }
        }
    }
}

// The root is never pruned, whatever its name.
fn keep_entry(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if is_pruned_dir(&name) {
        debug!(path = %entry.path().display(), "pruned directory");
        return false;
    }
    true
}

fn is_regular_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, "x = 1\n").expect("write file");
    }

    fn walk(root: &Path, config: ScanConfig) -> Vec<String> {
        SourceWalker::new(root, &config)
            .expect("walker")
            .map(|p| {
                p.strip_prefix(root)
                    .expect("under root")
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn extension_check_ignores_case() {
        assert!(is_scannable(Path::new("a/b/Main.JAVA")));
        assert!(is_scannable(Path::new("app.tsx")));
        assert!(!is_scannable(Path::new("notes.txt")));
        assert!(!is_scannable(Path::new("Makefile")));
    }

    #[test]
    fn yields_eligible_files_in_lexical_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "b.py");
        touch(dir.path(), "a.js");
        touch(dir.path(), "readme.md");
        touch(dir.path(), "sub/c.go");
        touch(dir.path(), "c.rb");

        assert_eq!(
            walk(dir.path(), ScanConfig::default()),
            vec!["a.js", "b.py", "c.rb", "sub/c.go"]
        );
    }

    #[test]
    fn pruned_directories_are_skipped_at_any_depth() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "src/app.py");
        touch(dir.path(), "node_modules/lib/index.js");
        touch(dir.path(), "src/deep/.git/hooks/pre-commit.py");
        touch(dir.path(), "src/deep/venv/site.py");
        touch(dir.path(), "src/deep/ok.py");

        assert_eq!(
            walk(dir.path(), ScanConfig::default()),
            vec!["src/app.py", "src/deep/ok.py"]
        );
    }

    #[test]
    fn root_named_like_a_pruned_directory_is_still_walked() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("build");
        touch(&root, "gen.c");

        assert_eq!(walk(&root, ScanConfig::default()), vec!["gen.c"]);
    }

    #[test]
    fn cap_stops_the_whole_traversal() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["a/1.py", "a/2.py", "b/3.py", "b/4.py", "c/5.py"] {
            touch(dir.path(), name);
        }

        let config = ScanConfig::default().with_max_files(3);
        let mut walker = SourceWalker::new(dir.path(), &config).expect("walker");
        let seen = walker.by_ref().count();
        assert_eq!(seen, 3);
        assert_eq!(walker.files_yielded(), 3);
        assert_eq!(walk(dir.path(), config), vec!["a/1.py", "a/2.py", "b/3.py"]);
    }

    #[test]
    fn zero_cap_yields_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "a.py");
        assert!(walk(dir.path(), ScanConfig::default().with_max_files(0)).is_empty());
    }

    #[test]
    fn non_recursive_walk_stays_at_the_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "top.py");
        touch(dir.path(), "nested/inner.py");

        let config = ScanConfig::default().with_recursive(false);
        assert_eq!(walk(dir.path(), config), vec!["top.py"]);
    }

    #[test]
    fn single_file_root_bypasses_the_filter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("notes.txt");
        fs::write(&file, "password = \"x\"\n").expect("write");

        let files = SourceWalker::new(&file, &ScanConfig::default().with_max_files(0))
            .expect("walker")
            .collect::<Vec<_>>();
        assert_eq!(files, vec![file]);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_root_is_not_reported_as_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::os::unix::fs::symlink(&b, &a).expect("symlink a");
        std::os::unix::fs::symlink(&a, &b).expect("symlink b");

        match SourceWalker::new(&a, &ScanConfig::default()) {
            Err(ScanError::Inaccessible { path, .. }) => assert_eq!(path, a),
            Err(other) => panic!("expected an access error, got {other}"),
            Ok(_) => panic!("expected an access error"),
        }
    }

    #[test]
    fn missing_root_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        assert!(matches!(
            SourceWalker::new(&missing, &ScanConfig::default()),
            Err(ScanError::PathNotFound(p)) if p == missing
        ));
    }
}
