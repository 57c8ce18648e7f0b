//! The scanning collaborator: wires `vuln_scan` to the analyzer.

use std::path::Path;
use std::sync::Arc;

use crate::config::ScanConfig;
use crate::detector::Analyzer;
use crate::error::{PluginError, ScanError};
use crate::registry::{Plugin, PluginArgs, PluginDescriptor, PluginOutput, PluginResult, RegistryBuilder};
use crate::report::Report;
use crate::rules::Catalog;

pub const TASK: &str = "vuln_scan";
pub const CATEGORY: &str = "plugins";
pub const MODULE: &str = "vuln_scanner";
pub const ALIASES: [&str; 2] = ["scan", "vulnerability_scan"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    fn parse(raw: &str) -> Result<Self, PluginError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" | "table" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(PluginError::invalid_argument(
                "format",
                format!("unsupported format `{raw}`, expected text or json"),
            )),
        }
    }
}

/// Accepts `path`, `max_files`, `recursive` and `format`.
pub struct VulnScanPlugin {
    analyzer: Analyzer,
    defaults: ScanConfig,
}

impl VulnScanPlugin {
    pub fn new(catalog: Arc<Catalog>, defaults: ScanConfig) -> Self {
        Self {
            analyzer: Analyzer::new(catalog),
            defaults,
        }
    }

    fn scan(&self, args: &PluginArgs) -> PluginResult {
        let path = args.str_or("path", ".")?;
        let max_files = args.u64_or("max_files", self.defaults.max_files as u64)?;
        let max_files = usize::try_from(max_files)
            .map_err(|_| PluginError::invalid_argument("max_files", "value too large"))?;
        let recursive = args.bool_or("recursive", self.defaults.recursive)?;
        let format = ReportFormat::parse(args.str_or("format", "text")?)?;

        let config = self
            .defaults
            .with_max_files(max_files)
            .with_recursive(recursive);

        let result = match self.analyzer.analyze_path(Path::new(path), &config) {
            Ok(result) => result,
            Err(err @ ScanError::PathNotFound(_)) => {
                return Ok(PluginOutput::Text(format!("[!] {err}")));
            }
            Err(err) => return Err(err.into()),
        };

        let report = Report::from_result(&result);
        Ok(match format {
            ReportFormat::Text => PluginOutput::Text(report.render_text()),
            ReportFormat::Json => PluginOutput::Json(report.to_json()),
        })
    }
}

impl Plugin for VulnScanPlugin {
    fn run_plugin(&self, args: &PluginArgs) -> Option<PluginResult> {
        Some(self.scan(args))
    }
}

impl RegistryBuilder {
    /// Registers `vuln_scan`, its aliases, and its module loader.
    pub fn with_vuln_scan(self, catalog: Arc<Catalog>, defaults: ScanConfig) -> Self {
        let mut builder = self
            .with_plugin(PluginDescriptor::new(TASK, CATEGORY, MODULE))
            .with_module(MODULE, move || -> Result<Box<dyn Plugin>, PluginError> {
                Ok(Box::new(VulnScanPlugin::new(Arc::clone(&catalog), defaults)))
            });
        for alias in ALIASES {
            builder = builder.with_alias(alias, TASK);
        }
        builder
    }
}
