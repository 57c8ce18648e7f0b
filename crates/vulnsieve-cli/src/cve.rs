//! CVE lookup collaborator backed by the NVD CVE API.

use std::fmt::Write as FmtWrite;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;
use vulnsieve_core::{
    Plugin, PluginArgs, PluginDescriptor, PluginError, PluginOutput, PluginResult,
    RegistryBuilder,
};

use crate::config::CveSettings;

pub const NVD_API_BASE: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";

pub const TASK: &str = "cve_lookup";
const CATEGORY: &str = "core";
const MODULE: &str = "cve_lookup";

const DEFAULT_LIMIT: u64 = 10;
const MAX_REFERENCES: usize = 5;
const SEARCH_DESCRIPTION_WIDTH: usize = 200;

pub struct CveClient {
    http: Client,
    base_url: String,
}

impl CveClient {
    pub fn new(settings: &CveSettings) -> Result<Self, PluginError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| PluginError::Load {
                module: MODULE.to_string(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: settings.url.clone(),
        })
    }

    pub fn lookup(&self, raw_id: &str) -> PluginResult {
        let id = normalize_cve_id(raw_id).ok_or_else(|| {
            PluginError::invalid_argument("id", format!("{raw_id} is not a CVE ID (expected CVE-YYYY-NNNN)"))
        })?;
        let body = self.fetch(&[("cveId", id.clone())])?;
        Ok(PluginOutput::Text(render_cve(&body, &id)))
    }

    pub fn search(&self, keyword: &str, limit: u64) -> PluginResult {
        let body = self.fetch(&[
            ("keywordSearch", keyword.to_string()),
            ("resultsPerPage", limit.to_string()),
        ])?;
        Ok(PluginOutput::Text(render_search(&body, keyword)))
    }

    fn fetch(&self, query: &[(&str, String)]) -> Result<Value, PluginError> {
        debug!(url = %self.base_url, ?query, "querying NVD");
        let response = self
            .http
            .get(&self.base_url)
            .query(query)
            .send()
            .map_err(|e| PluginError::Execution(format!("network error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PluginError::Execution(format!("NVD API error: {status}")));
        }

        response
            .json::<Value>()
            .map_err(|e| PluginError::Execution(format!("invalid NVD response: {e}")))
    }
}

/// Accepts `id`, or `keyword` with an optional `limit`.
pub struct CveLookupPlugin {
    client: CveClient,
}

impl CveLookupPlugin {
    pub fn new(client: CveClient) -> Self {
        Self { client }
    }

    fn execute(&self, args: &PluginArgs) -> PluginResult {
        if args.get("id").is_some() {
            return self.client.lookup(args.str_or("id", "")?);
        }
        if args.get("keyword").is_some() {
            let keyword = args.str_or("keyword", "")?;
            let limit = args.u64_or("limit", DEFAULT_LIMIT)?;
            return self.client.search(keyword, limit);
        }
        Err(PluginError::invalid_argument(
            "id",
            "provide either `id` or `keyword`",
        ))
    }
}

impl Plugin for CveLookupPlugin {
    fn run(&self, args: &PluginArgs) -> Option<PluginResult> {
        Some(self.execute(args))
    }
}

/// Registers `cve_lookup` (alias `cve`).
pub fn with_cve_lookup(builder: RegistryBuilder, settings: CveSettings) -> RegistryBuilder {
    builder
        .with_plugin(PluginDescriptor::new(TASK, CATEGORY, MODULE))
        .with_alias("cve", TASK)
        .with_module(MODULE, move || -> Result<Box<dyn Plugin>, PluginError> {
            Ok(Box::new(CveLookupPlugin::new(CveClient::new(&settings)?)))
        })
}

pub fn normalize_cve_id(raw: &str) -> Option<String> {
    let id = raw.trim().to_ascii_uppercase();
    id.starts_with("CVE-").then_some(id)
}

pub fn render_cve(body: &Value, id: &str) -> String {
    let Some(cve) = body["vulnerabilities"].get(0).map(|v| &v["cve"]) else {
        return format!("[!] CVE not found: {id}\n");
    };

    let rule = "=".repeat(60);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "CVE ID: {}", cve["id"].as_str().unwrap_or("N/A"));
    let _ = writeln!(out, "{rule}");

    if let Some(desc) = english_description(cve) {
        let _ = writeln!(out, "\nDescription:\n{desc}");
    }

    let metrics = &cve["metrics"];
    if metrics.as_object().is_some_and(|m| !m.is_empty()) {
        let _ = writeln!(out, "\nCVSS Scores:");
        if let Some(cvss) = cvss_v3(metrics) {
            let _ = writeln!(
                out,
                "  - CVSS v3: {} ({})",
                display(&cvss["baseScore"]),
                display(&cvss["baseSeverity"])
            );
            let _ = writeln!(out, "    Vector: {}", display(&cvss["vectorString"]));
        }
        if let Some(cvss) = metrics["cvssMetricV2"].get(0).map(|m| &m["cvssData"]) {
            let _ = writeln!(out, "  - CVSS v2: {}", display(&cvss["baseScore"]));
        }
    }

    let _ = writeln!(out, "\nPublished: {}", display(&cve["published"]));
    let _ = writeln!(out, "Last Modified: {}", display(&cve["lastModified"]));

    if let Some(references) = cve["references"].as_array().filter(|r| !r.is_empty()) {
        let _ = write!(out, "\nReferences ({}):", references.len());
        for (i, reference) in references.iter().take(MAX_REFERENCES).enumerate() {
            let _ = write!(out, "\n  {}. {}", i + 1, display(&reference["url"]));
        }
        if references.len() > MAX_REFERENCES {
            let _ = write!(out, "\n  ... and {} more", references.len() - MAX_REFERENCES);
        }
        out.push('\n');
    }

    let _ = writeln!(out, "{rule}");
    out
}

pub fn render_search(body: &Value, keyword: &str) -> String {
    let items = body["vulnerabilities"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    if items.is_empty() {
        return format!("[!] No results found for: {keyword}\n");
    }

    let rule = "=".repeat(60);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Search Results for '{keyword}' ({} found)", items.len());
    let _ = writeln!(out, "{rule}");

    for (i, item) in items.iter().enumerate() {
        let cve = &item["cve"];
        let desc = english_description(cve).unwrap_or("N/A");
        let (score, severity) = cvss_v3(&cve["metrics"])
            .map(|cvss| (display(&cvss["baseScore"]), display(&cvss["baseSeverity"])))
            .unwrap_or_else(|| ("N/A".to_string(), "N/A".to_string()));

        let _ = writeln!(out, "\n{}. {}", i + 1, cve["id"].as_str().unwrap_or("N/A"));
        let _ = writeln!(out, "   Score: {score} ({severity})");
        let _ = writeln!(out, "   {}", truncate_description(desc));
    }

    let _ = writeln!(out, "\n{rule}");
    out
}

fn english_description(cve: &Value) -> Option<&str> {
    cve["descriptions"]
        .as_array()?
        .iter()
        .find(|d| d["lang"] == "en")
        .and_then(|d| d["value"].as_str())
}

fn cvss_v3(metrics: &Value) -> Option<&Value> {
    ["cvssMetricV31", "cvssMetricV30"]
        .iter()
        .find_map(|key| metrics[*key].get(0))
        .map(|m| &m["cvssData"])
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate_description(desc: &str) -> String {
    match desc.char_indices().nth(SEARCH_DESCRIPTION_WIDTH) {
        Some((idx, _)) => format!("{}...", &desc[..idx]),
        None => desc.to_string(),
    }
}
