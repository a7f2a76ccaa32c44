// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! mcp-assess entry point.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use mcp_assess::config::{self, AssessConfig, CliOptions};
use mcp_assess::mcp::{
    Assessment, AssessmentCache, AssessmentError, Assessor, ConnectionTestResult, MemoryCache,
    SavingsSummary, ServerDescriptor, TestStep, TokenMetrics,
};
use mcp_assess::telemetry::{init_telemetry, TelemetryConfig, GLOBAL_METRICS};
use mcp_assess::VERSION;

/// Check MCP servers: handshake, tool listing, and token cost.
#[derive(Parser)]
#[command(name = "mcp-assess")]
#[command(author, version, about = "Assess MCP servers and estimate their token cost", long_about = None)]
struct Cli {
    /// Config file (JSON or YAML), layered over workspace and global config
    #[arg(short, long, global = true, env = "MCP_ASSESS_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Per-request HTTP timeout in seconds
    #[arg(long, global = true)]
    http_timeout: Option<u64>,

    /// Whole-handshake stdio timeout in seconds
    #[arg(long, global = true)]
    stdio_timeout: Option<u64>,

    /// Skip the reference-client cross-check for HTTP servers
    #[arg(long, global = true)]
    no_sdk_validation: bool,

    /// Look up the latest published version of package-runner servers
    #[arg(long, global = true)]
    check_versions: bool,

    /// Print the diagnostics bundle of failed assessments
    #[arg(long, global = true)]
    details: bool,

    /// Print assessment metrics to stderr before exiting
    #[arg(long, global = true)]
    metrics: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess every server in a server list (or one with --name)
    Assess {
        /// Server list file: {"mcpServers": {...}}
        servers: PathBuf,

        /// Only assess this server
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Step-by-step connection test for one HTTP server
    Test {
        /// Server list file
        servers: PathBuf,

        /// Server to test
        name: String,
    },

    /// Assess unassessed servers in bounded batches
    Sweep {
        /// Server list file
        servers: PathBuf,

        /// Run a single batch instead of sweeping until done
        #[arg(long)]
        once: bool,

        /// Servers per batch
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Estimate tokens saved by guarding servers
    Savings {
        /// Server list file
        servers: PathBuf,

        /// Guarded server names (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        guarded: Vec<String>,

        /// Assess guarded servers first instead of using default estimates
        #[arg(long)]
        assess: bool,
    },

    /// Show the resolved configuration
    Config,

    /// Show version information
    Version,
}

struct Output {
    format: OutputFormat,
    details: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let telemetry = TelemetryConfig::from_verbosity(cli.verbose);
    let _guard = init_telemetry(&telemetry)?;

    let sweep_limit = match &cli.command {
        Commands::Sweep { limit, .. } => *limit,
        _ => None,
    };
    let cli_options = CliOptions {
        http_timeout_secs: cli.http_timeout,
        stdio_timeout_secs: cli.stdio_timeout,
        sweep_limit,
        no_sdk_validation: cli.no_sdk_validation,
        check_package_versions: cli.check_versions,
    };

    let workspace_root = std::env::current_dir()?;
    let config = config::load_config(&workspace_root, cli.config.as_deref(), cli_options)?;
    let output = Output {
        format: cli.format,
        details: cli.details,
    };

    let ok = handle_command(cli.command, config, &output).await?;

    if cli.metrics {
        eprintln!("{}", GLOBAL_METRICS.snapshot().format_report());
    }
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

/// Run one subcommand. Returns `false` when any server failed.
async fn handle_command(
    command: Commands,
    config: AssessConfig,
    output: &Output,
) -> anyhow::Result<bool> {
    match command {
        Commands::Assess { servers, name } => {
            let servers = select_servers(&servers, name.as_deref())?;
            handle_assess(&Assessor::new(config), &servers, output).await
        }
        Commands::Test { servers, name } => {
            let servers = config::load_servers_file(&servers)?;
            let server = config::find_server(&servers, &name)?;
            handle_test(&Assessor::new(config), server, output).await
        }
        Commands::Sweep { servers, once, .. } => {
            let servers = config::load_servers_file(&servers)?;
            handle_sweep(&Assessor::new(config), &servers, once, output).await
        }
        Commands::Savings {
            servers,
            guarded,
            assess,
        } => {
            let servers = config::load_servers_file(&servers)?;
            let guarded: HashSet<String> = guarded.into_iter().collect();
            for name in &guarded {
                config::find_server(&servers, name)?;
            }
            handle_savings(&Assessor::new(config), &servers, &guarded, assess, output).await
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(true)
        }
        Commands::Version => {
            println!("mcp-assess {}", VERSION);
            Ok(true)
        }
    }
}

fn select_servers(path: &Path, name: Option<&str>) -> anyhow::Result<Vec<ServerDescriptor>> {
    let servers = config::load_servers_file(path)?;
    match name {
        Some(name) => Ok(vec![config::find_server(&servers, name)?.clone()]),
        None => Ok(servers),
    }
}

fn spinner(output: &Output) -> ProgressBar {
    if output.format == OutputFormat::Json {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn handle_assess(
    assessor: &Assessor,
    servers: &[ServerDescriptor],
    output: &Output,
) -> anyhow::Result<bool> {
    let pb = spinner(output);
    let mut results = Vec::with_capacity(servers.len());

    for server in servers {
        pb.set_message(format!("Assessing {}...", server.name));
        let assessment = assessor.assess(server).await;
        pb.suspend(|| {
            if output.format == OutputFormat::Text {
                print_assessment(&server.name, &assessment, output.details);
            }
        });
        results.push((server.name.clone(), assessment));
    }
    pb.finish_and_clear();

    let ok = results.iter().all(|(_, a)| a.is_success());
    match output.format {
        OutputFormat::Json => print_json_results(&results)?,
        OutputFormat::Text => {
            let passed = results.iter().filter(|(_, a)| a.is_success()).count();
            println!(
                "\n{} of {} servers assessed successfully",
                passed.to_string().bold(),
                results.len()
            );
        }
    }
    Ok(ok)
}

async fn handle_test(
    assessor: &Assessor,
    server: &ServerDescriptor,
    output: &Output,
) -> anyhow::Result<bool> {
    if output.format == OutputFormat::Text {
        println!("{}", format!("Connection test: {}", server.name).bright_blue().bold());
    }

    let result = assessor
        .test_connection(server, |step| {
            if output.format == OutputFormat::Text {
                print_step(step, output.details);
            }
        })
        .await;

    match output.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_test_summary(&result, output.details),
    }
    Ok(result.success)
}

async fn handle_sweep(
    assessor: &Assessor,
    servers: &[ServerDescriptor],
    once: bool,
    output: &Output,
) -> anyhow::Result<bool> {
    let mut cache = MemoryCache::new();
    let pb = spinner(output);
    let mut round = 0;

    loop {
        round += 1;
        pb.set_message(format!("Sweep {}...", round));
        let batch = assessor.sweep(servers, &mut cache).await;
        if batch.is_empty() {
            break;
        }

        pb.suspend(|| {
            if output.format == OutputFormat::Text {
                println!("{}", format!("Sweep {}", round).bright_cyan());
                for (name, assessment) in &batch {
                    print_assessment(name, assessment, output.details);
                }
            }
        });

        if once {
            break;
        }
    }
    pb.finish_and_clear();

    let results: Vec<(String, Assessment)> = servers
        .iter()
        .filter_map(|s| {
            let assessment = match (cache.metrics(&s.name), cache.error(&s.name)) {
                (Some(m), _) => Assessment::Metrics(m),
                (None, Some(e)) => Assessment::Error(e),
                (None, None) => return None,
            };
            Some((s.name.clone(), assessment))
        })
        .collect();

    let pending = servers.len() - results.len();
    match output.format {
        OutputFormat::Json => print_json_results(&results)?,
        OutputFormat::Text if pending > 0 => {
            println!("{} servers still pending", pending.to_string().yellow());
        }
        OutputFormat::Text => {}
    }
    Ok(results.iter().all(|(_, a)| a.is_success()))
}

async fn handle_savings(
    assessor: &Assessor,
    servers: &[ServerDescriptor],
    guarded: &HashSet<String>,
    assess: bool,
    output: &Output,
) -> anyhow::Result<bool> {
    let mut cache = MemoryCache::new();

    if assess {
        let pb = spinner(output);
        for server in servers.iter().filter(|s| guarded.contains(&s.name)) {
            pb.set_message(format!("Assessing {}...", server.name));
            assessor.assess_into(server, &mut cache).await;
        }
        pb.finish_and_clear();
    }

    let summary = assessor.savings(servers, guarded, &cache);
    match output.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print_savings(&summary),
    }
    Ok(true)
}

fn print_json_results(results: &[(String, Assessment)]) -> anyhow::Result<()> {
    let mut map = serde_json::Map::new();
    for (name, assessment) in results {
        map.insert(name.clone(), serde_json::to_value(assessment)?);
    }
    println!("{}", serde_json::to_string_pretty(&map)?);
    Ok(())
}

fn print_assessment(name: &str, assessment: &Assessment, details: bool) {
    match assessment {
        Assessment::Metrics(metrics) => print_metrics(name, metrics),
        Assessment::Error(error) => print_error(name, error, details),
    }
}

fn print_metrics(name: &str, metrics: &TokenMetrics) {
    println!(
        "{} {}  {} tools, ~{} tokens ({} schema chars)",
        "✓".green(),
        name.bright_white(),
        metrics.tool_count,
        metrics.estimated_tokens.to_string().bold(),
        metrics.schema_chars
    );

    if let Some(package) = &metrics.package_name {
        let installed = metrics.installed_version.as_deref().unwrap_or("unpinned");
        let mut line = format!("    package {} ({})", package, installed);
        if let Some(latest) = &metrics.latest_version {
            if metrics.installed_version.as_deref() != Some(latest.as_str()) {
                line.push_str(&format!(", latest {}", latest.yellow()));
            }
        }
        println!("{}", line.dimmed());
    }
}

fn print_error(name: &str, error: &AssessmentError, details: bool) {
    println!(
        "{} {}  [{}] {}",
        "✗".red(),
        name.bright_white(),
        error.kind.to_string().red(),
        error.message
    );

    if let Some(oauth) = &error.oauth_metadata {
        let servers = if oauth.authorization_servers.is_empty() {
            "none advertised".to_string()
        } else {
            oauth.authorization_servers.join(", ")
        };
        println!("    {}", format!("OAuth authorization servers: {}", servers).dimmed());
    }

    if let Some(validation) = &error.sdk_validation {
        println!(
            "    {}",
            format!(
                "direct fetch: {} tools, SDK transport: {}",
                validation.direct_fetch_tools, validation.sdk_transport_tools
            )
            .dimmed()
        );
    }

    if details {
        if let Some(diag) = &error.diagnostics {
            println!("    {} {}", diag.request_method, diag.request_url);
            for (header, value) in sorted(&diag.request_headers) {
                println!("      {}: {}", header, value);
            }
            if let Some(raw) = &diag.raw_error {
                println!("    error: {}", raw);
            }
            if !diag.response_body.is_empty() {
                println!("    response: {}", diag.response_body.dimmed());
            }
        }
    }
}

fn sorted(map: &std::collections::HashMap<String, String>) -> Vec<(&String, &String)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort();
    entries
}

fn print_step(step: &TestStep, details: bool) {
    let mark = if step.success { "✓".green() } else { "✗".red() };
    let duration = step
        .duration_ms
        .map(|ms| format!(" ({}ms)", ms))
        .unwrap_or_default();
    println!(
        "  {} {}{}  {}",
        mark,
        step.name,
        duration.dimmed(),
        step.details.as_deref().unwrap_or("")
    );

    if details {
        if let Some(data) = &step.data {
            println!("{}", indent(&data.request, 6).dimmed());
            println!("{}", indent(&data.response, 6).dimmed());
        }
    }
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_test_summary(result: &ConnectionTestResult, details: bool) {
    if result.success {
        println!("\n{} in {}ms", "Connection OK".green().bold(), result.duration_ms);
        return;
    }

    println!("\n{} after {}ms", "Connection failed".red().bold(), result.duration_ms);
    if let Some(error) = &result.error {
        print_error(&result.mcp_name, error, details);
    }
}

fn print_savings(summary: &SavingsSummary) {
    println!("{}", "Token savings".bright_blue().bold());
    for server in &summary.servers {
        let note = if server.estimated { " (estimate)".yellow().to_string() } else { String::new() };
        println!("  {}  {} tokens{}", server.name.bright_white(), server.tokens, note);
    }
    println!(
        "\nWithout guard: {} tokens across {} guarded servers",
        summary.total_tokens_without_guard, summary.guarded_mcps
    );
    println!("Guard baseline: {} tokens", summary.guard_baseline_tokens);
    println!("Saved: {} tokens", summary.tokens_saved.to_string().green().bold());
    if summary.has_estimates {
        println!(
            "{}",
            "Some servers are unassessed; run with --assess for measured numbers".dimmed()
        );
    }
}
