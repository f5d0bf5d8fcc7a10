use anyhow::{Context, Result};
use autofix_patcher::change::{load_document, parse_document, FixDocument};
use autofix_patcher::{
    apply_change_set, load_or_default, ApplyMode, ChangeStatus, FileChange, PatchApplier,
    PolicyValidator, RunStatus, SecretScanner, ValidationOutcome,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Conventional batch file looked up when `--fix-data` does not resolve.
const DEFAULT_FIX_DATA: &str = "fix_data.json";
/// Conventional policy file inside the workspace.
const DEFAULT_POLICY_FILE: &str = "safety_rules.json";

#[derive(Parser)]
#[command(name = "autofix-patcher")]
#[command(about = "Apply generated code fixes under a safety policy", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a change batch and apply it to the workspace
    Apply {
        /// Change batch as inline JSON or a path to a JSON file
        #[arg(short, long)]
        fix_data: Option<String>,

        /// Workspace root (defaults to AUTOFIX_WORKSPACE, then the current directory)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Policy document (defaults to AUTOFIX_POLICY, then <workspace>/safety_rules.json)
        #[arg(short, long)]
        policy: Option<PathBuf>,

        /// Dry run - validate and resolve snippets, print the diff, write nothing
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Write machine-readable run status (JSON) to this path
        #[arg(long)]
        status_file: Option<PathBuf>,
    },

    /// Check a change batch against the policy without touching files
    Validate {
        /// Change batch as inline JSON or a path to a JSON file
        #[arg(short, long)]
        fix_data: Option<String>,

        /// Workspace root used to locate the default policy file
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Policy document
        #[arg(short, long)]
        policy: Option<PathBuf>,
    },

    /// Scan files for committed credentials
    ScanSecrets {
        /// Files or directories to scan (defaults to the current directory)
        paths: Vec<PathBuf>,

        /// Only report through the exit code
        #[arg(short, long)]
        quiet: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Apply {
            fix_data,
            workspace,
            policy,
            dry_run,
            diff,
            status_file,
        } => cmd_apply(fix_data, workspace, policy, dry_run, diff, status_file),

        Commands::Validate {
            fix_data,
            workspace,
            policy,
        } => cmd_validate(fix_data, workspace, policy),

        Commands::ScanSecrets { paths, quiet } => cmd_scan_secrets(paths, quiet),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Resolve workspace path
///
/// Priority order:
/// 1. Explicit --workspace flag
/// 2. AUTOFIX_WORKSPACE environment variable
/// 3. Current directory
fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_workspace {
        return path
            .canonicalize()
            .with_context(|| format!("workspace not found: {}", path.display()));
    }

    if let Ok(env_path) = env::var("AUTOFIX_WORKSPACE") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: AUTOFIX_WORKSPACE is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    Ok(env::current_dir()?)
}

/// Resolve the policy document path, if any.
///
/// Priority order:
/// 1. Explicit --policy flag
/// 2. AUTOFIX_POLICY environment variable
/// 3. `<workspace>/safety_rules.json` when present
fn resolve_policy_path(cli_policy: Option<PathBuf>, workspace: &Path) -> Option<PathBuf> {
    if let Some(path) = cli_policy {
        return Some(path);
    }

    if let Ok(env_path) = env::var("AUTOFIX_POLICY") {
        return Some(PathBuf::from(env_path));
    }

    let conventional = workspace.join(DEFAULT_POLICY_FILE);
    conventional.is_file().then_some(conventional)
}

/// Load the change batch from a path or inline JSON, falling back to
/// `fix_data.json` in the current directory when the input cannot be resolved.
fn load_fix_data(fix_data: Option<&str>) -> Result<FixDocument> {
    let primary = match fix_data {
        Some(value) if Path::new(value).is_file() => load_document(value),
        Some(value) => parse_document(value),
        None => {
            return load_document(DEFAULT_FIX_DATA).with_context(|| {
                format!("no --fix-data given and {DEFAULT_FIX_DATA} could not be loaded")
            });
        }
    };

    match primary {
        Ok(document) => Ok(document),
        // Readable JSON that fails boundary checks is reported, never replaced.
        Err(error) if !error.is_unreadable() => Err(error).context("Error loading fix data"),
        Err(error) => {
            if Path::new(DEFAULT_FIX_DATA).is_file() {
                tracing::warn!(%error, "falling back to {DEFAULT_FIX_DATA}");
                return load_document(DEFAULT_FIX_DATA)
                    .with_context(|| format!("Error loading fix data from {DEFAULT_FIX_DATA}"));
            }
            Err(error).context("Error loading fix data")
        }
    }
}

fn write_status(path: Option<&Path>, status: &RunStatus) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let json = serde_json::to_string_pretty(status)?;
    fs::write(path, json)
        .with_context(|| format!("failed to write status file {}", path.display()))
}

/// Helper: Show unified diff between original and modified content
fn display_diff(change: &FileChange<'_>) {
    println!();
    for line in change.unified_diff().lines() {
        let styled = if line.starts_with("---") || line.starts_with("+++") {
            line.dimmed()
        } else if line.starts_with("@@") {
            line.cyan()
        } else if line.starts_with('+') {
            line.green()
        } else if line.starts_with('-') {
            line.red()
        } else {
            line.normal()
        };
        println!("{}", styled);
    }
}

fn cmd_apply(
    fix_data: Option<String>,
    workspace: Option<PathBuf>,
    policy: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
    status_file: Option<PathBuf>,
) -> Result<()> {
    // 1. Resolve inputs
    let workspace = resolve_workspace(workspace)?;
    let document = load_fix_data(fix_data.as_deref())?;
    let policy = load_or_default(resolve_policy_path(policy, &workspace).as_deref());

    println!("Workspace: {}", workspace.display());
    if let Some(summary) = &document.summary {
        println!("Fix: {}", summary);
    }
    println!("Changes: {}", document.changes.len());
    println!();

    // 2. Gate, then apply
    let mode = if dry_run {
        ApplyMode::DryRun
    } else {
        ApplyMode::Write
    };
    let mut applier = PatchApplier::new(&workspace, mode)?;

    let report = match apply_change_set(&document.changes, &policy, &mut applier) {
        Ok(report) => report,
        Err(violation) => {
            println!("{} Validation failed: {}", "✗".red(), violation);
            let status = RunStatus::rejected(ValidationOutcome::rejected(&violation), dry_run);
            write_status(status_file.as_deref(), &status)?;
            std::process::exit(1);
        }
    };

    println!(
        "{} Validation passed: {}",
        "✓".green(),
        ValidationOutcome::PASSED_REASON
    );
    if dry_run {
        println!("{}", "[DRY RUN - no files will be written]".cyan());
    }
    println!();

    // 3. Per-change results
    for outcome in report.outcomes() {
        match &outcome.status {
            ChangeStatus::Applied { recovered } => {
                let verb = if dry_run { "Would fix" } else { "Fixed" };
                let note = if *recovered {
                    " (reformatted snippet recovered)".dimmed().to_string()
                } else {
                    String::new()
                };
                println!("{} {}: {}{}", "✓".green(), verb, outcome.file, note);
            }
            ChangeStatus::Unchanged => {
                println!("{} Unchanged: {}", "⊙".yellow(), outcome.file);
            }
            ChangeStatus::Failed { message, .. } => {
                println!("{} {}", "✗".red(), message);
            }
        }
    }

    if dry_run || show_diff {
        for change in applier.file_changes() {
            display_diff(&change);
        }
    }

    // 4. Summary
    println!();
    println!("{}", "Files:".bold());
    for (file, tally) in report.file_tallies() {
        println!(
            "  {}: {} applied, {} failed",
            file,
            format!("{}", tally.succeeded).green(),
            format!("{}", tally.failed).red()
        );
    }

    println!();
    println!(
        "{} {}/{} changes applied successfully",
        "Summary:".bold(),
        report.succeeded(),
        report.total()
    );

    let failed_files = report.failed_files().join(", ");
    let success = report.is_success();
    write_status(
        status_file.as_deref(),
        &RunStatus::completed(ValidationOutcome::passed(), report, dry_run),
    )?;

    if !success {
        println!("{} Failed files: {}", "✗".red(), failed_files);
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_validate(
    fix_data: Option<String>,
    workspace: Option<PathBuf>,
    policy: Option<PathBuf>,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let document = load_fix_data(fix_data.as_deref())?;
    let policy = load_or_default(resolve_policy_path(policy, &workspace).as_deref());

    match PolicyValidator::new(&policy).validate(&document.changes) {
        Ok(()) => {
            println!(
                "{} Validation passed: {}",
                "✓".green(),
                ValidationOutcome::PASSED_REASON
            );
            Ok(())
        }
        Err(violation) => {
            println!("{} Validation failed: {}", "✗".red(), violation);
            std::process::exit(1);
        }
    }
}

fn cmd_scan_secrets(paths: Vec<PathBuf>, quiet: bool) -> Result<()> {
    let paths = if paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        paths
    };

    let scanner = SecretScanner::new();
    let findings: Vec<_> = paths
        .iter()
        .flat_map(|path| scanner.scan_tree(path))
        .collect();

    if findings.is_empty() {
        if !quiet {
            println!("{} No secrets found", "✓".green());
        }
        return Ok(());
    }

    if !quiet {
        println!(
            "{}",
            "Found potential secrets in the following files:".yellow()
        );
        for finding in &findings {
            let path = finding
                .path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!();
            println!("  File: {}", path);
            println!("  Line: {}", finding.line);
            println!("  Type: {}", finding.kind);
            println!("  Content: {}", finding.excerpt.dimmed());
        }
        println!();
        println!("{} Remove these secrets before committing.", "✗".red());
    }

    std::process::exit(1);
}
