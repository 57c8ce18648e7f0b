/// Default cap on files visited by a single scan.
pub const DEFAULT_MAX_FILES: usize = 1000;

/// Scan settings, built once by the caller and handed to the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    pub max_files: usize,
    pub recursive: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            recursive: true,
        }
    }
}

impl ScanConfig {
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}
