//! CLI argument parsing via `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vulnsieve",
    version,
    about = "Pattern-based vulnerability scanner",
    long_about = "vulnsieve scans source trees for likely security defects and dispatches named tasks (vulnerability scan, CVE lookup).\n\nConfiguration precedence: CLI > environment > config.toml > defaults.",
    after_help = "Examples:\n  vulnsieve scan ./src\n  vulnsieve scan . --max-files 200 --format json\n  vulnsieve run scan --arg path=./app --arg max_files=50\n  vulnsieve cve CVE-2021-44228\n  vulnsieve cve --search openssl --limit 5",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a file or directory for vulnerable patterns
    Scan {
        #[arg(default_value = ".", help = "File or directory to scan")]
        path: String,
        #[arg(long, help = "Maximum number of files to scan (default: from config, 1000)")]
        max_files: Option<u64>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Only scan files directly under PATH")]
        no_recursive: bool,
        #[arg(long, default_value = "text", help = "Output format: text|json")]
        format: String,
    },
    /// Run any registered task by name or alias
    Run {
        task: String,
        #[arg(long = "arg", value_name = "KEY=VALUE", help = "Task argument; values are parsed as JSON when possible")]
        args: Vec<String>,
    },
    /// Look up a CVE by ID or search by keyword
    Cve {
        #[arg(help = "CVE identifier, e.g. CVE-2024-1234")]
        id: Option<String>,
        #[arg(long, conflicts_with = "id", help = "Keyword search instead of ID lookup")]
        search: Option<String>,
        #[arg(long, default_value_t = 10, help = "Maximum search results")]
        limit: u64,
    },
    /// List registered tasks and aliases
    Plugins,
    /// Read or change the config file
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Print the config file location
    Path,
    /// Print a value by dot-notation key (e.g. scan.max_files)
    Get { key: String },
    /// Set a value by dot-notation key and save
    Set { key: String, value: String },
}
