use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tfgate::config::{Config, DEFAULT_CONFIG_FILE};
use tfgate::enrich::EnrichmentFlags;
use tfgate::error::TfGateError;
use tfgate::gate::Thresholds;
use tfgate::output::OutputFormat;
use tfgate::rules::PolicyRegistry;
use tfgate::ScanOptions;

#[derive(Parser)]
#[command(
    name = "tfgate",
    about = "Policy gate for Terraform configurations",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan Terraform JSON configuration or plan documents
    Scan {
        /// Directory (or single document) to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Scan only these documents instead of discovering them
        #[arg(long = "file")]
        files: Vec<PathBuf>,

        /// Config file path
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output format (json, csv, text, markdown, sarif); repeatable
        #[arg(long, short = 'f', default_value = "text")]
        format: Vec<String>,

        /// Write output to this file, or to this directory when several
        /// formats are requested
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Add an infracost monthly cost estimate
        #[arg(long)]
        cost: bool,

        /// Add drift from `terraform plan -refresh-only`
        #[arg(long)]
        drift: bool,

        /// Add `terraform validate` results
        #[arg(long)]
        validate: bool,

        /// Add LLM explanations of findings
        #[arg(long)]
        explain: bool,

        /// Maximum non-waived high findings
        #[arg(long)]
        max_high: Option<i64>,

        /// Maximum non-waived medium findings
        #[arg(long)]
        max_medium: Option<i64>,

        /// Maximum non-waived low findings
        #[arg(long)]
        max_low: Option<i64>,

        /// Per-rule evaluation timeout in milliseconds (0 disables)
        #[arg(long)]
        rule_timeout_ms: Option<u64>,

        /// Skip documents matching this glob (relative to PATH); repeatable
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// List all registered policy rules
    ListRules {
        /// Output format (table, json)
        #[arg(long, short = 'f', default_value = "table")]
        format: String,
    },

    /// Generate a starter .tfgate.toml config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TFGATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Scan {
            path,
            files,
            config,
            format,
            output,
            cost,
            drift,
            validate,
            explain,
            max_high,
            max_medium,
            max_low,
            rule_timeout_ms,
            exclude,
        } => {
            let options = ScanOptions {
                config_path: config,
                files,
                enrichment: EnrichmentFlags {
                    cost,
                    drift,
                    validation: validate,
                    explanation: explain,
                },
                rule_timeout: rule_timeout_ms.map(Duration::from_millis),
                threshold_overrides: Thresholds {
                    high: max_high,
                    medium: max_medium,
                    low: max_low,
                },
                exclude,
                now: None,
            };
            cmd_scan(&path, &options, &format, output.as_deref())
        }
        Commands::ListRules { format } => cmd_list_rules(&format),
        Commands::Init { force } => cmd_init(force),
    };

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn cmd_scan(
    path: &Path,
    options: &ScanOptions,
    format_names: &[String],
    output_path: Option<&Path>,
) -> Result<i32, TfGateError> {
    let mut formats = Vec::new();
    for name in format_names {
        let format = OutputFormat::from_str_lenient(name)
            .ok_or_else(|| TfGateError::Config(format!("unknown output format '{name}'")))?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }

    let report = tfgate::scan(path, options)?;

    match (output_path, formats.as_slice()) {
        (None, _) => {
            for format in &formats {
                print!("{}", tfgate::render_report(&report, *format)?);
            }
        }
        (Some(out), [format]) => {
            std::fs::write(out, tfgate::render_report(&report, *format)?)?;
        }
        (Some(dir), _) => {
            std::fs::create_dir_all(dir)?;
            for format in &formats {
                let file = dir.join(format!("tfgate-report.{}", format.extension()));
                std::fs::write(&file, tfgate::render_report(&report, *format)?)?;
                tracing::info!(file = %file.display(), %format, "report written");
            }
        }
    }

    Ok(report.exit_code())
}

fn cmd_list_rules(format: &str) -> Result<i32, TfGateError> {
    let registry = PolicyRegistry::builtin()?;
    let rules = registry.list();

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&rules)?;
            println!("{}", json);
        }
        _ => {
            println!(
                "{:<12} {:<8} {:<8} {:<30} NAME",
                "ID", "SEVERITY", "PROVIDER", "RESOURCE TYPE"
            );
            println!("{}", "-".repeat(96));
            for rule in &rules {
                println!(
                    "{:<12} {:<8} {:<8} {:<30} {}",
                    rule.id,
                    rule.severity.to_string(),
                    rule.provider.to_string(),
                    rule.resource_type.to_string(),
                    rule.name,
                );
            }
        }
    }

    Ok(0)
}

fn cmd_init(force: bool) -> Result<i32, TfGateError> {
    let path = PathBuf::from(DEFAULT_CONFIG_FILE);

    if path.exists() && !force {
        eprintln!("{DEFAULT_CONFIG_FILE} already exists. Use --force to overwrite.");
        return Ok(1);
    }

    std::fs::write(&path, Config::starter_toml())?;
    println!("Created {DEFAULT_CONFIG_FILE}");

    Ok(0)
}
