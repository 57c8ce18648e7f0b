mod cli;
mod config;
mod cve;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vulnsieve_core::{Catalog, Outcome, PluginArgs, Registry};

use cli::{Cli, Commands, ConfigCmd};
use config::Config;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::get_config_path()?,
    };
    let file_config = Config::load_from(&config_path)?;
    let config = file_config.clone().merge_with_env();
    init_tracing(config.log.level.as_deref());
    debug!(path = %config_path.display(), "configuration loaded");

    match cli.cmd {
        Commands::Scan {
            path,
            max_files,
            no_recursive,
            format,
        } => {
            let mut args = PluginArgs::new().with("path", path).with("format", format);
            if let Some(max_files) = max_files {
                args.insert("max_files", max_files);
            }
            if no_recursive {
                args.insert("recursive", false);
            }
            dispatch(&config, vulnsieve_core::vuln_scan::TASK, &args)
        }
        Commands::Run { task, args } => {
            let args = args
                .iter()
                .map(|raw| parse_assignment(raw))
                .collect::<anyhow::Result<PluginArgs>>()?;
            dispatch(&config, &task, &args)
        }
        Commands::Cve { id, search, limit } => {
            let args = match (id, search) {
                (Some(id), None) => PluginArgs::new().with("id", id),
                (None, Some(keyword)) => PluginArgs::new().with("keyword", keyword).with("limit", limit),
                _ => bail!("pass either a CVE ID or --search KEYWORD"),
            };
            dispatch(&config, cve::TASK, &args)
        }
        Commands::Plugins => {
            print_plugins(&build_registry(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { cmd } => run_config(cmd, file_config, &config_path),
    }
}

fn build_registry(config: &Config) -> anyhow::Result<Registry> {
    let catalog = Arc::new(Catalog::builtin().context("failed to compile detection patterns")?);
    let builder = Registry::builder().with_vuln_scan(catalog, config.scan_config());
    Ok(cve::with_cve_lookup(builder, config.cve.clone()).build())
}

fn dispatch(config: &Config, task: &str, args: &PluginArgs) -> anyhow::Result<ExitCode> {
    let registry = build_registry(config)?;
    let outcome = registry.dispatch(task, args);
    let rendered = outcome.to_string();
    if outcome.is_success() {
        println!("{}", rendered.trim_end());
        return Ok(ExitCode::SUCCESS);
    }
    eprintln!("{rendered}");
    Ok(match outcome {
        Outcome::UnknownPlugin(_) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    })
}

fn print_plugins(registry: &Registry) {
    println!("Available plugins:");
    for descriptor in registry.descriptors() {
        println!(
            "  {:<20} -> {}.{}",
            descriptor.task, descriptor.category, descriptor.module
        );
    }
    println!("Aliases:");
    for (alias, task) in registry.aliases() {
        println!("  {alias:<20} -> {task}");
    }
}

fn run_config(
    cmd: ConfigCmd,
    mut file_config: Config,
    config_path: &std::path::Path,
) -> anyhow::Result<ExitCode> {
    match cmd {
        ConfigCmd::Path => println!("{}", config_path.display()),
        ConfigCmd::Get { key } => match file_config.merge_with_env().get(&key) {
            Some(value) => println!("{value}"),
            None => bail!("no value for `{key}`"),
        },
        ConfigCmd::Set { key, value } => {
            file_config.set(&key, &value)?;
            file_config.save_to(config_path)?;
            println!("{key} = {value}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// `key=value`; the value is read as JSON when it parses, else as a string.
fn parse_assignment(raw: &str) -> anyhow::Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("invalid argument `{raw}`, expected KEY=VALUE");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("invalid argument `{raw}`, key is empty");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
