use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use vibe_patcher::patch::{
    apply_batch, parse_file, validate, ApplyOutcome, BatchError, RawPatch, RecordOutcome,
};
use vibe_patcher::{preview_in_scratch, settings, WorkspaceGuard};
use walkdir::WalkDir;

/// Extension of patch documents picked up from a directory.
const PATCH_EXTENSION: &str = "vibe";

#[derive(Parser)]
#[command(name = "vibe")]
#[command(about = "Apply structured patch documents to Python sources", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (defaults to <root>/vibe.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log engine decisions at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate patch documents without touching any file
    Lint {
        /// Patch document, or a directory of *.vibe documents
        patch: PathBuf,
    },

    /// Apply patch documents to a scratch copy and show the diffs
    Preview {
        /// Patch document, or a directory of *.vibe documents
        patch: PathBuf,

        /// Workspace root (defaults to the current directory)
        #[arg(short, long, env = "VIBE_ROOT")]
        root: Option<PathBuf>,
    },

    /// Apply patch documents to a workspace
    Apply {
        /// Patch document, or a directory of *.vibe documents
        patch: PathBuf,

        /// Workspace root (defaults to the current directory)
        #[arg(short, long, env = "VIBE_ROOT")]
        root: Option<PathBuf>,

        /// Dry run - compute results without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Lint { patch } => cmd_lint(&patch),
        Commands::Preview { patch, root } => cmd_preview(&patch, root, cli.config.as_deref()),
        Commands::Apply {
            patch,
            root,
            dry_run,
            diff,
            json,
        } => cmd_apply(&patch, root, cli.config.as_deref(), dry_run, diff, json),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("vibe_patcher=debug")
    } else {
        EnvFilter::try_from_env("VIBE_LOG").unwrap_or_else(|_| EnvFilter::new("vibe_patcher=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    let root = match root {
        Some(root) => root,
        None => env::current_dir().context("cannot determine current directory")?,
    };
    root.canonicalize()
        .with_context(|| format!("workspace root {} does not exist", root.display()))
}

/// A single document, or every `*.vibe` file under a directory in sorted order.
fn collect_documents(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some(PATCH_EXTENSION)
        {
            files.push(entry.path().to_path_buf());
        }
    }

    if files.is_empty() {
        anyhow::bail!("No .{} patch documents found in {}", PATCH_EXTENSION, path.display());
    }
    Ok(files)
}

fn relative<'a>(file: &'a Path, root: &Path) -> &'a Path {
    file.strip_prefix(root).unwrap_or(file)
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);
    for change in diff.iter_all_changes() {
        let line = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", line);
    }
}

fn cmd_lint(patch: &Path) -> Result<()> {
    let mut total_valid = 0;
    let mut total_invalid = 0;

    for document in collect_documents(patch)? {
        println!("Checking {}...", document.display());
        let records = match parse_file(&document) {
            Ok(records) => records,
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                total_invalid += 1;
                continue;
            }
        };

        for raw in &records {
            match validate(raw) {
                Ok(record) => {
                    println!(
                        "{} line {}: {} (schema {})",
                        "✓".green(),
                        record.line,
                        record,
                        record.version
                    );
                    total_valid += 1;
                }
                Err(e) => {
                    eprintln!("{} {}", "✗".red(), e);
                    total_invalid += 1;
                }
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} valid", format!("{}", total_valid).green());
    println!("  {} invalid", format!("{}", total_invalid).red());

    if total_invalid > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_preview(patch: &Path, root: Option<PathBuf>, config: Option<&Path>) -> Result<()> {
    let root = resolve_root(root)?;
    let settings = settings::discover(&root, config)?;
    let options = settings.apply_options(false);

    let mut failed = false;
    for document in collect_documents(patch)? {
        println!("Previewing {}...", document.display());
        let records = parse_file(&document)?;

        match preview_in_scratch(&records, &root, &options) {
            Ok(previews) => {
                for preview in previews {
                    if !preview.changed() {
                        println!("{} {}: no changes", "⊙".yellow(), preview.file.display());
                        continue;
                    }
                    display_diff(
                        &preview.file,
                        preview.before.as_deref().unwrap_or_default(),
                        preview.after.as_deref().unwrap_or_default(),
                    );
                }
            }
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                failed = true;
            }
        }
        println!();
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Current content of every file `records` target, for diffing afterwards.
fn snapshot_targets(records: &[RawPatch], root: &Path) -> Result<BTreeMap<PathBuf, String>> {
    let guard = WorkspaceGuard::new(root)?;
    let mut contents = BTreeMap::new();
    for file in records.iter().filter_map(|r| r.get("file")) {
        let Ok(path) = guard.resolve(file.trim()) else {
            continue;
        };
        if let Ok(text) = fs::read_to_string(&path) {
            contents.insert(path, text);
        }
    }
    Ok(contents)
}

#[derive(Default)]
struct Tally {
    applied: usize,
    unchanged: usize,
    failed: usize,
}

impl Tally {
    fn record(&mut self, outcome: &RecordOutcome, root: &Path) {
        let file = relative(outcome.outcome.file(), root).display();
        let label = format!("line {} {}", outcome.line, outcome.kind);
        match &outcome.outcome {
            ApplyOutcome::Preview { .. } => {
                println!("{} {}: Would patch {}", "✓".green(), label, file);
                self.applied += 1;
            }
            ApplyOutcome::Written { changed: false, .. } => {
                println!("{} {}: Already up to date ({})", "⊙".yellow(), label, file);
                self.unchanged += 1;
            }
            ApplyOutcome::Written {
                created, backup, ..
            } => {
                let verb = if *created { "Created" } else { "Patched" };
                println!("{} {}: {} {}", "✓".green(), label, verb, file);
                if let Some(backup) = backup {
                    println!("  {}", format!("backup: {}", backup.display()).dimmed());
                }
                self.applied += 1;
            }
        }
    }

    fn failure(&mut self, error: &BatchError, root: &Path) {
        eprintln!("{} line {}: {}", "✗".red(), error.line, error.source);
        for file in &error.rolled_back {
            eprintln!("  {}", format!("rolled back {}", relative(file, root).display()).yellow());
        }
        if error.rolled_back.is_empty() && !error.applied.is_empty() {
            eprintln!(
                "  {}",
                format!("{} earlier record(s) remain applied", error.applied.len()).yellow()
            );
        }
        self.failed += 1;
    }
}

fn cmd_apply(
    patch: &Path,
    root: Option<PathBuf>,
    config: Option<&Path>,
    dry_run: bool,
    show_diff: bool,
    json: bool,
) -> Result<()> {
    let root = resolve_root(root)?;
    let settings = settings::discover(&root, config)?;
    let options = settings.apply_options(dry_run);

    if !json {
        println!("Workspace: {}", root.display());
        if dry_run {
            println!("{}", "[DRY RUN - no files will be modified]".cyan());
        }
        println!();
    }

    let mut tally = Tally::default();
    let mut reports = Vec::new();

    for document in collect_documents(patch)? {
        let records = parse_file(&document)
            .with_context(|| format!("failed to parse {}", document.display()))?;
        let before = if show_diff {
            snapshot_targets(&records, &root)?
        } else {
            BTreeMap::new()
        };

        if !json {
            println!("Applying {}...", document.display());
        }
        let result = apply_batch(&records, &root, &options);

        if json {
            reports.push(match &result {
                Ok(report) => json!({ "document": document, "report": report }),
                Err(e) => json!({
                    "document": document,
                    "error": e.to_string(),
                    "applied": e.applied,
                    "rolled_back": e.rolled_back,
                }),
            });
            if result.is_err() {
                tally.failed += 1;
            }
            continue;
        }

        let outcomes = match &result {
            Ok(report) => &report.outcomes,
            Err(e) => &e.applied,
        };
        for outcome in outcomes {
            tally.record(outcome, &root);
        }
        if let Err(e) = &result {
            tally.failure(e, &root);
        }

        if show_diff {
            let after: BTreeMap<PathBuf, String> = match &result {
                Ok(report) if dry_run => report.files.clone(),
                _ => outcomes
                    .iter()
                    .filter_map(|o| {
                        let file = o.outcome.file();
                        fs::read_to_string(file).ok().map(|text| (file.to_path_buf(), text))
                    })
                    .collect(),
            };
            for (file, text) in &after {
                let original = before.get(file).map(String::as_str).unwrap_or_default();
                if original != text {
                    display_diff(relative(file, &root), original, text);
                }
            }
        }
        println!();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!("{}", "Summary:".bold());
        println!("  {} applied", format!("{}", tally.applied).green());
        println!("  {} already up to date", format!("{}", tally.unchanged).yellow());
        println!("  {} failed", format!("{}", tally.failed).red());
    }

    if tally.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
