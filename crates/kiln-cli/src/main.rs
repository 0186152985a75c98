use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kiln_core::{BuildError, BuildReport, BuildSummary, Config, ProjectContext};
use kiln_graph::{GraphStore, Source};
use kiln_incremental::{
    BuildDriver, CommandCompiler, Compiler, Invalidation, PatternFinder, SourceFinder,
};

/// Kiln - incremental builds for compiled-language projects
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: kiln.toml)
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
    /// Recompile sources affected by changes since the last build
    Build {
        /// Also write a JSON build report
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Show what the next build would recompile
    Status,

    /// Delete all compiled outputs and forget the dependency graph
    Clean,

    /// Show dependencies and dependents of a source
    Deps {
        /// Source file (absolute, or relative to the current directory)
        source: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let ctx = ProjectContext::from_config(&config);
    tracing::debug!(project = %ctx.name, root = %ctx.root.display(), "loaded project");

    match cli.command {
        Commands::Build { report } => build_command(&config, &ctx, report.as_deref()),
        Commands::Status => status_command(&ctx),
        Commands::Clean => clean_command(&ctx),
        Commands::Deps { source } => deps_command(&ctx, &source),
    }
}

fn open_store(ctx: &ProjectContext) -> Result<GraphStore> {
    GraphStore::open(&ctx.snapshot_path).with_context(|| {
        format!(
            "Failed to load dependency graph from {}. Run 'kiln clean' to start over.",
            ctx.snapshot_path.display()
        )
    })
}

/// Log to stderr; RUST_LOG wins over --verbose
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let default_path = Path::new("kiln.toml");
    let mut config = if let Some(path) = path {
        Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?
    } else if default_path.exists() {
        Config::from_file(default_path)?
    } else {
        tracing::info!("No kiln.toml found, using defaults");
        Config::default()
    };

    // A bare file name has an empty parent
    if config.project_root.as_os_str().is_empty() {
        config.project_root = std::env::current_dir()?;
    }
    config.project_root = config.project_root.canonicalize().with_context(|| {
        format!("Failed to resolve project root {}", config.project_root.display())
    })?;
    Ok(config)
}

/// Build command - incremental compile
fn build_command(config: &Config, ctx: &ProjectContext, report_path: Option<&Path>) -> Result<()> {
    let finder = PatternFinder::from_context(ctx);
    let mut compiler = CommandCompiler::from_config(&config.compiler);

    let report = run_build(ctx, &finder, &mut compiler);

    if let Some(path) = report_path {
        report.save_to_file(path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        tracing::info!(path = %path.display(), "report saved");
    }

    print_build_summary(&report);

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

/// Load the graph and build; an unreadable snapshot is a failed build
fn run_build(
    ctx: &ProjectContext,
    finder: &dyn SourceFinder,
    compiler: &mut dyn Compiler,
) -> BuildReport {
    match GraphStore::open(&ctx.snapshot_path) {
        Ok(mut store) => BuildDriver::new(ctx, &mut store).build(finder, compiler),
        Err(err) => {
            let err = BuildError::from(err);
            tracing::error!(project = %ctx.name, kind = err.kind(), "build failed: {}", err);
            BuildReport::failure(
                &ctx.name,
                BuildSummary::default(),
                format!("{}. Run 'kiln clean' to start over.", err),
            )
        }
    }
}

/// Status command - dry-run invalidation
fn status_command(ctx: &ProjectContext) -> Result<()> {
    let mut store = open_store(ctx)?;
    let finder = PatternFinder::from_context(ctx);
    let plan = BuildDriver::new(ctx, &mut store).plan(&finder)?;

    print_status(ctx, &plan);
    Ok(())
}

/// Clean command - remove outputs and graph
///
/// Works without a readable snapshot; only the outputs it records are lost.
fn clean_command(ctx: &ProjectContext) -> Result<()> {
    let mut store = GraphStore::open(&ctx.snapshot_path).unwrap_or_else(|err| {
        tracing::warn!("discarding unreadable dependency graph: {}", err);
        GraphStore::new(&ctx.snapshot_path)
    });
    let removed = BuildDriver::new(ctx, &mut store).clean()?;
    println!("{} {} output files", "Removed".green(), removed);
    Ok(())
}

/// Deps command - show both directions of the dependency graph
fn deps_command(ctx: &ProjectContext, path: &Path) -> Result<()> {
    let store = open_store(ctx)?;
    let source = resolve_source(ctx, path);

    let Some(record) = store.record(&source) else {
        return Err(anyhow::anyhow!(
            "{} is not tracked. Run 'kiln build' first or check the path.",
            source
        ));
    };

    let reverse = store.reverse_index();
    let upstream = store.upstream(&source);
    let downstream = reverse.downstream(&source);

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Dependency Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();
    println!("{} {}", "Source:".bold(), source.to_string().green());
    println!("{} {}", "Outputs:".bold(), record.outputs.len());
    println!();

    print_list("Depends on (transitively):", upstream.iter().map(|s| s.to_string()));
    print_list("Rebuilt when it changes:", downstream.iter().map(|s| s.to_string()));

    println!("{}", "=".repeat(60).bright_blue());
    Ok(())
}

fn resolve_source(ctx: &ProjectContext, path: &Path) -> Source {
    let candidates = [path.to_path_buf(), ctx.source_dir.join(path)];

    candidates
        .iter()
        .find_map(|p| p.canonicalize().ok())
        .map(Source::new)
        .unwrap_or_else(|| Source::new(path))
}

fn print_list(title: &str, items: impl ExactSizeIterator<Item = String>) {
    println!("{} {}", title.bold(), items.len());
    for (i, item) in items.enumerate() {
        println!("  {}. {}", i + 1, item.yellow());
    }
    println!();
}

fn print_status(ctx: &ProjectContext, plan: &Invalidation) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{} {}", "Build Status:".bold().bright_blue(), ctx.name.bold());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    if plan.is_empty() && plan.removed.is_empty() {
        println!("{}", "✓ Up to date".green().bold());
    } else {
        for source in &plan.directly_modified {
            println!("  {} {}", "modified   ".yellow(), source);
        }
        for source in &plan.indirectly_invalidated {
            println!("  {} {}", "invalidated".cyan(), source);
        }
        for source in &plan.removed {
            println!("  {} {}", "removed    ".red(), source);
        }
        println!();
        println!("{} sources would be recompiled", plan.dirty().len());
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

fn print_build_summary(report: &BuildReport) {
    let summary = &report.summary;

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{} {}", "Build Report:".bold().bright_blue(), report.project.bold());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!();

    println!("{}", "Summary:".bold());
    println!("  Sources:     {}", summary.sources);
    println!("  Modified:    {}", summary.directly_modified);
    println!("  Invalidated: {}", summary.indirectly_invalidated);
    println!("  Removed:     {}", summary.removed);
    println!("  Compiled:    {}", summary.compiled);
    println!("  Outputs:     {}", summary.outputs);
    println!();

    match &report.failure {
        None if summary.compiled == 0 => println!("{}", "✓ Nothing to compile".green().bold()),
        None => println!("{}", "✓ Build succeeded".green().bold()),
        Some(message) => {
            println!("{}", "✗ Build failed".red().bold());
            for line in message.lines() {
                println!("  {}", line);
            }
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    fn scratch_project(dir: &Path) -> ProjectContext {
        let mut config = Config::default();
        config.project_root = dir.to_path_buf();
        let ctx = ProjectContext::from_config(&config);
        std::fs::create_dir_all(ctx.snapshot_path.parent().unwrap()).unwrap();
        std::fs::write(&ctx.snapshot_path, "garbage").unwrap();
        ctx
    }

    #[test]
    fn corrupt_graph_fails_build_with_report() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = scratch_project(dir.path());
        let finder = PatternFinder::from_context(&ctx);
        let mut compiler = CommandCompiler::from_config(&Config::default().compiler);

        let report = run_build(&ctx, &finder, &mut compiler);

        let failure = report.failure.unwrap_or_default();
        assert!(failure.starts_with("Persistence failure"), "{}", failure);
        assert!(failure.ends_with("Run 'kiln clean' to start over."));
    }

    #[test]
    fn clean_recovers_from_corrupt_graph() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = scratch_project(dir.path());

        clean_command(&ctx).unwrap();

        assert!(GraphStore::open(&ctx.snapshot_path).unwrap().is_empty());
    }

    #[test]
    fn config_path_resolves_to_absolute_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        Config::default().save_to_file(&dir.path().join("kiln.toml")).unwrap();

        let config = load_config(Some(dir.path().join("sub/../kiln.toml").as_path())).unwrap();

        assert_eq!(config.project_root, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn unknown_source_resolves_to_given_path() {
        let mut config = Config::default();
        config.project_root = PathBuf::from("/nonexistent-kiln-root");
        let ctx = ProjectContext::from_config(&config);

        assert_eq!(
            resolve_source(&ctx, Path::new("Missing.scala")),
            Source::from("Missing.scala")
        );
    }
}
