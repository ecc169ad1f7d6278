use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

use proclineage_catalog::{CatalogSnapshot, JsonFileSource, SharedCatalog};
use proclineage_core::{Config, ExtractionResult, LineageReport, ObjectKind, Severity};
use proclineage_engine::{BatchExtractor, CancelToken, RoutineInput};
use proclineage_sql::LineageExtractor;

const DEFAULT_CONFIG_FILE: &str = "proclineage.toml";

/// ProcLineage - column-level lineage for T-SQL routines
#[derive(Parser)]
#[command(name = "proclineage")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: proclineage.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract lineage from a single routine file
    Extract {
        /// SQL file holding the routine
        file: PathBuf,

        /// Catalog export (JSON)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Object name when the file has no CREATE wrapper (default: file stem)
        #[arg(long)]
        name: Option<String>,

        /// Object kind when the file has no CREATE wrapper
        #[arg(long, default_value = "batch")]
        kind: ObjectKind,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Extract lineage from every .sql file under a directory
    Batch {
        /// Directory to scan
        dir: PathBuf,

        /// Catalog export (JSON)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output file for report.json
        #[arg(short, long, default_value = "lineage-report.json")]
        output: PathBuf,

        /// Routines extracted concurrently (default: batch.max_parallel)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.verbose)?;
    if cli.verbose {
        eprintln!("{} dialect: {:?}", "Using".cyan(), config.dialect);
    }

    let failed = match cli.command {
        Commands::Extract {
            file,
            catalog,
            name,
            kind,
            format,
        } => extract_command(config, &file, catalog.as_deref(), name, kind, format, cli.verbose).await?,
        Commands::Batch {
            dir,
            catalog,
            output,
            jobs,
        } => batch_command(config, &dir, catalog.as_deref(), &output, jobs, cli.verbose).await?,
    };

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

/// `--config`, then ./proclineage.toml, then defaults; env overrides last
fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let mut config = if let Some(path) = path {
        Config::from_file(path).with_context(|| format!("loading config {}", path.display()))?
    } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG_FILE))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };
    config.apply_env_overrides();
    debug!(dialect = ?config.dialect, max_depth = config.max_depth, "configuration loaded");
    Ok(config)
}

async fn load_catalog(path: Option<&Path>, verbose: bool) -> Result<SharedCatalog> {
    let Some(path) = path else {
        eprintln!(
            "{}",
            "No catalog given; only alias-qualified columns will resolve".yellow()
        );
        return Ok(SharedCatalog::new(CatalogSnapshot::new()));
    };

    if verbose {
        eprintln!("{} {}", "Loading catalog from:".cyan(), path.display());
    }
    let catalog = SharedCatalog::load(&JsonFileSource::new(path))
        .await
        .with_context(|| format!("loading catalog {}", path.display()))?;
    Ok(catalog)
}

/// Extract command - one routine, printed to stdout
async fn extract_command(
    config: Config,
    file: &Path,
    catalog: Option<&Path>,
    name: Option<String>,
    kind: ObjectKind,
    format: OutputFormat,
    verbose: bool,
) -> Result<bool> {
    let sql = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let catalog = load_catalog(catalog, verbose).await?;
    let extractor = LineageExtractor::new(Arc::new(catalog)).with_config(config);

    let name = name.unwrap_or_else(|| file_stem(file));
    debug!(file = %file.display(), routine = %name, "extracting single routine");
    let result = tokio::task::spawn_blocking(move || extractor.extract(&sql, &name, kind)).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_result(&result),
    }
    Ok(result.has_parse_errors())
}

/// Batch command - every .sql file under a directory, written as report.json
async fn batch_command(
    config: Config,
    dir: &Path,
    catalog: Option<&Path>,
    output: &Path,
    jobs: Option<usize>,
    verbose: bool,
) -> Result<bool> {
    let files = discover_sql_files(dir);
    info!(root = %dir.display(), files = files.len(), "discovered sql files");
    if files.is_empty() {
        eprintln!("{} {}", "No .sql files found under".yellow(), dir.display());
    }

    let mut routines = Vec::with_capacity(files.len());
    for path in &files {
        let sql = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        routines.push(RoutineInput::new(file_stem(path), ObjectKind::Batch, sql));
    }

    let catalog = load_catalog(catalog, verbose).await?;
    let extractor = Arc::new(LineageExtractor::new(Arc::new(catalog)).with_config(config));
    let mut batch = BatchExtractor::new(extractor);
    if let Some(jobs) = jobs {
        batch = batch.with_max_parallel(jobs);
    }

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted; finishing in-flight routines".yellow());
            on_interrupt.cancel();
        }
    });

    if verbose {
        eprintln!(
            "{} {} routines ({} at a time)...",
            "Extracting".cyan(),
            routines.len(),
            batch.max_parallel()
        );
    }

    let report = batch
        .run(routines, &cancel)
        .await?
        .with_metadata(serde_json::json!({ "root": dir.display().to_string() }));
    report
        .save_to_file(output)
        .with_context(|| format!("writing {}", output.display()))?;

    print_report_summary(&report);
    if verbose {
        eprintln!("{} {}", "Report saved to:".green(), output.display());
    }
    Ok(report.has_parse_failures())
}

/// `.sql` files under `dir`, sorted so report order is stable
fn discover_sql_files(dir: &Path) -> Vec<PathBuf> {
    let mut sql_files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    sql_files.sort();
    sql_files
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn confidence_label(confidence: f64) -> colored::ColoredString {
    let text = format!("{:.2}", confidence);
    if confidence >= 0.9 {
        text.green()
    } else if confidence >= 0.5 {
        text.yellow()
    } else {
        text.red().bold()
    }
}

/// Print one extraction result to stdout
fn print_result(result: &ExtractionResult) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!(
        "{} {} ({})",
        "Lineage for".bold().bright_blue(),
        result.object_name.bold(),
        result.object_kind
    );
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Confidence: {}", confidence_label(result.overall_confidence));
    println!("Edges:      {}", result.edges.len());
    println!();

    if !result.edges.is_empty() {
        println!("{}", "Edges:".bold());
        for edge in &result.edges {
            println!(
                "  {} -> {} [{}] line {}",
                edge.source.to_string().cyan(),
                edge.target.to_string().green(),
                edge.kind,
                edge.source_line
            );
        }
        println!();
    }

    if !result.temp_tables.is_empty() {
        println!("{}", "Temp tables:".bold());
        for temp in &result.temp_tables {
            println!(
                "  {} ({}) line {}",
                temp.name,
                temp.column_names().join(", "),
                temp.definition_line
            );
        }
        println!();
    }

    if !result.dynamic_sql_usages.is_empty() {
        println!("{}", "Dynamic SQL:".bold());
        for usage in &result.dynamic_sql_usages {
            println!("  [{}] line {}: {}", usage.kind, usage.line, usage.fragment);
        }
        println!();
    }

    if result.warnings.is_empty() {
        println!("{}", "✓ No warnings".green().bold());
    } else {
        println!("{}", "Warnings:".bold());
        for diag in &result.warnings {
            let severity_str = match diag.severity {
                Severity::Error => "ERROR".red().bold(),
                Severity::Warn => "WARN".yellow().bold(),
                Severity::Info => "INFO".cyan(),
            };
            print!("  [{}] {}: {}", severity_str, diag.code, diag.message);
            if let Some(loc) = &diag.location {
                print!(" (line {})", loc.line);
            }
            println!();
        }
    }
    println!();
}

/// Print batch report summary to stdout
fn print_report_summary(report: &LineageReport) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Lineage Extraction Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!();

    let s = &report.summary;
    println!("{}", "Summary:".bold());
    println!("  Routines:    {}", s.routines);
    println!("  Edges:       {}", s.edges);
    println!("  Warnings:    {}", s.warnings);
    println!("  Dynamic SQL: {}", s.dynamic_sql);
    if s.parse_failures > 0 {
        println!("  Parse failures: {}", s.parse_failures.to_string().red().bold());
    } else {
        println!("  Parse failures: {}", s.parse_failures.to_string().green());
    }
    if s.cancelled > 0 {
        println!("  Cancelled:   {}", s.cancelled.to_string().yellow());
    }
    println!("  Mean confidence: {}", confidence_label(s.mean_confidence));
    println!();

    for result in report.results.iter().filter(|r| r.has_parse_errors()) {
        println!("  {} {}", "✗".red(), result.object_name);
        for diag in &result.warnings {
            println!("      {}", diag.message);
        }
    }

    println!("{}", "=".repeat(60).bright_blue());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_sql_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.sql"), "SELECT 1").unwrap();
        std::fs::write(dir.path().join("nested").join("a.SQL"), "SELECT 1").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let stems: Vec<_> = discover_sql_files(dir.path()).iter().map(|p| file_stem(p)).collect();
        assert_eq!(stems, vec!["b", "a"]);
    }

    #[test]
    fn config_file_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proclineage.toml");
        std::fs::write(&path, "default_schema = \"sales\"\n[batch]\nmax_parallel = 2\n").unwrap();

        let config = load_config(Some(&path), false).unwrap();
        assert_eq!(config.batch.max_parallel, 2);
        assert_eq!(config.project_root, dir.path());
    }

    #[test]
    fn cli_parses_extract() {
        let cli = Cli::try_parse_from([
            "proclineage", "extract", "p.sql", "--kind", "procedure", "--format", "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Extract { kind, format, .. } => {
                assert_eq!(kind, ObjectKind::Procedure);
                assert_eq!(format, OutputFormat::Json);
            }
            Commands::Batch { .. } => panic!("expected extract"),
        }
    }
}
