pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod registry;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod vuln_scan;

pub use classifier::{severity_of, Severity};
pub use config::ScanConfig;
pub use detector::{Analyzer, Finding, ScanResult};
pub use error::{CatalogError, PluginError, ScanError};
pub use registry::{
    Outcome, Plugin, PluginArgs, PluginDescriptor, PluginOutput, PluginResult, Registry,
    RegistryBuilder,
};
pub use report::Report;
pub use rules::{Catalog, Category, PatternRule};
pub use scanner::{is_pruned_dir, is_scannable, SourceWalker};
pub use vuln_scan::VulnScanPlugin;
