//! Codeweave CLI - code graph queries and refactors from the command line
//!
//! Commands:
//! - `stats` - Show node and edge counts for a repository
//! - `validate` - Run the post-build health checks
//! - `usages` - List where a symbol is used
//! - `deps` - List what a symbol depends on
//! - `rename` - Rename a symbol across the repository

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use codeweave_config::{ConfigLoader, ConfigOverrides};
use codeweave_core::linker::uses_breakdown;
use codeweave_core::{BuildOptions, Codebase, HasName, Node, UsageType};

/// Codeweave - code graph queries and transactional refactors
#[derive(Parser)]
#[command(name = "codeweave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Repository root to analyze
    #[arg(short, long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Only analyze one language family (python, typescript, javascript)
    #[arg(short, long, global = true)]
    language: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show node and edge counts
    Stats,

    /// Run the post-build health checks
    Validate {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List where a symbol is used
    Usages {
        /// Node id (`path:Name`) or top-level name
        symbol: String,

        /// Usage kinds to include (e.g. `direct,aliased` or `all`)
        #[arg(short, long, default_value = "all")]
        types: UsageType,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the symbols a symbol depends on
    Deps {
        /// Node id (`path:Name`) or top-level name
        symbol: String,

        /// Maximum traversal depth
        #[arg(short, long, default_value_t = 1)]
        depth: usize,

        /// Usage kinds to follow
        #[arg(short, long, default_value = "all")]
        types: UsageType,
    },

    /// Rename a symbol and every reference to it
    Rename {
        /// Node id (`path:Name`) or top-level name
        symbol: String,

        /// New name
        new_name: String,

        /// Print the diff without writing files
        #[arg(long)]
        dry_run: bool,

        /// Fail when more than this many edits are queued
        #[arg(long)]
        max_transactions: Option<usize>,

        /// Fail when the session runs longer than this many seconds
        #[arg(long)]
        max_seconds: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (max_transactions, max_seconds) = match &cli.command {
        Commands::Rename {
            max_transactions,
            max_seconds,
            ..
        } => (*max_transactions, *max_seconds),
        _ => (None, None),
    };
    let overrides = ConfigOverrides {
        max_transactions,
        max_seconds,
        language: cli.language.clone(),
        log_level: cli.verbose.then(|| "debug".to_string()),
    };
    let config = ConfigLoader::new()
        .load(&cli.repo, Some(&overrides))
        .context("Failed to load configuration")?;

    // Setup logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let start = Instant::now();
    info!("Building code graph for {:?}", cli.repo);
    let options = BuildOptions::from_config(&config).context("Invalid analysis configuration")?;
    let mut codebase = Codebase::build_with_options(&cli.repo, options)
        .with_context(|| format!("Failed to build code graph for {:?}", cli.repo))?;
    debug!("Graph built in {:.2}s", start.elapsed().as_secs_f64());

    match cli.command {
        Commands::Stats => cmd_stats(&codebase),
        Commands::Validate { json } => cmd_validate(&codebase, json),
        Commands::Usages {
            symbol,
            types,
            json,
        } => cmd_usages(&codebase, &symbol, types, json),
        Commands::Deps {
            symbol,
            depth,
            types,
        } => cmd_deps(&codebase, &symbol, depth, types),
        Commands::Rename {
            symbol,
            new_name,
            dry_run,
            ..
        } => cmd_rename(&mut codebase, &symbol, &new_name, dry_run),
    }
}

/// Find a node by id, falling back to a top-level, class or function name.
fn lookup<'a>(codebase: &'a Codebase, symbol: &str) -> Result<&'a Node> {
    codebase
        .get_node(symbol)
        .or_else(|| codebase.get_symbol(symbol))
        .or_else(|| codebase.get_class(symbol))
        .or_else(|| codebase.get_function(symbol))
        .ok_or_else(|| anyhow!("Symbol not found: {}", symbol))
}

fn cmd_stats(codebase: &Codebase) -> Result<()> {
    let stats = codebase.stats();

    println!("\nCodebase: {:?}", codebase.root());
    println!("  Files: {}", stats.files);
    println!("  Symbols: {}", stats.symbols);
    println!("  Imports: {}", stats.imports);
    println!("  External modules: {}", stats.external_modules);
    println!(
        "  Imports resolved: {}/{}",
        stats.link.resolved_imports, stats.link.imports
    );
    println!("\nEdges:");
    for (edge_type, count) in &stats.edges {
        println!("  {}: {}", edge_type, count);
    }
    println!("\nUses by kind:");
    for (usage_type, count) in uses_breakdown(codebase.graph()) {
        println!("  {}: {}", usage_type, count);
    }

    Ok(())
}

fn cmd_validate(codebase: &Codebase, json_output: bool) -> Result<()> {
    let report = codebase.validation_report();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Status: {}", report.status);
        println!("  Nodes: {}", report.nodes);
        println!("  Files: {}", report.files);
        println!(
            "  Imports resolved: {}/{} ({:.0}%)",
            report.resolved_imports,
            report.imports,
            report.import_resolution_rate() * 100.0
        );
        println!("  Dangling edges: {}", report.dangling_edges);
        for path in &report.missing_files {
            println!("  Missing: {}", path);
        }
    }

    if !report.is_success() {
        bail!("Validation failed: {}", report.status);
    }
    Ok(())
}

fn cmd_usages(codebase: &Codebase, symbol: &str, types: UsageType, json_output: bool) -> Result<()> {
    let target = lookup(codebase, symbol)?;
    let usages = codebase.usages(&target.id, types)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&usages)?);
        return Ok(());
    }

    println!("{} usages of {}", usages.len(), target.id);
    for usage in &usages {
        let text = codebase
            .file_text(&usage.file)
            .map(|t| usage.match_range.slice(t))
            .unwrap_or_default();
        println!(
            "  {}:{}  {}  [{}] in {}",
            usage.file, usage.match_range.start, text, usage.usage_type, usage.usage_symbol
        );
    }
    Ok(())
}

fn cmd_deps(codebase: &Codebase, symbol: &str, depth: usize, types: UsageType) -> Result<()> {
    let source = lookup(codebase, symbol)?;
    let dependencies = codebase.dependencies(&source.id, depth, types)?;

    println!("{} dependencies of {} (depth {})", dependencies.len(), source.id, depth);
    for node in dependencies {
        println!("  {} ({})", node.id, node.node_type().as_str());
    }
    Ok(())
}

fn cmd_rename(codebase: &mut Codebase, symbol: &str, new_name: &str, dry_run: bool) -> Result<()> {
    let target = lookup(codebase, symbol)?;
    let id = target.id.clone();
    let old_name = target.name().to_string();

    let edits = codebase
        .rename(&id, new_name)
        .with_context(|| format!("Failed to rename {}", id))?;
    info!("Queued {} edits renaming {} to {}", edits, old_name, new_name);

    if dry_run {
        print!("{}", codebase.preview_diff()?);
        return Ok(());
    }

    let summary = codebase.commit().context("Failed to commit rename")?;
    print!("{}", codebase.get_diff());
    println!(
        "\nRenamed {} -> {}: {} edits across {} files",
        old_name,
        new_name,
        summary.transactions,
        summary.files.len()
    );
    Ok(())
}
