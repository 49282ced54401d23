use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use docstring_patcher::config;
use docstring_patcher::output::{self, OutputMode};
use docstring_patcher::rewrite::{FileStatus, RewriteError, RewriteOptions, Rewriter};
use docstring_patcher::select::{changed_files, collect_files};
use docstring_patcher::{list_elements, ElementState, OpenAiProvider};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docstring-patcher")]
#[command(about = "Rewrite Python docstrings with generated documentation", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite the docstrings of Python files
    Rewrite {
        /// Files or directories to process
        paths: Vec<PathBuf>,

        /// Process the Python files changed in the current git repository
        #[arg(short, long)]
        changes: bool,

        /// Overwrite the input files instead of writing <name>_review.py
        #[arg(short, long)]
        in_place: bool,

        /// Dry run - show what would be changed without writing files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Config file (defaults to ./docstring-patcher.toml, then ~/.docstring-patcher.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Annotation requests in flight per file
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },

    /// List the documentable elements of a Python file
    Elements {
        /// Python file to inspect
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Rewrite {
            paths,
            changes,
            in_place,
            dry_run,
            diff,
            config,
            concurrency,
        } => cmd_rewrite(RewriteArgs {
            paths,
            changes,
            in_place,
            dry_run,
            show_diff: diff,
            config,
            concurrency,
        }),

        Commands::Elements { file } => cmd_elements(&file),
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

struct RewriteArgs {
    paths: Vec<PathBuf>,
    changes: bool,
    in_place: bool,
    dry_run: bool,
    show_diff: bool,
    config: Option<PathBuf>,
    concurrency: Option<usize>,
}

/// Helper: Show unified diff between original and rewritten content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!("\n{}", format!("--- {} (original)", file.display()).dimmed());
    println!("{}", format!("+++ {} (rewritten)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_rewrite(args: RewriteArgs) -> Result<()> {
    // 1. Select files
    let files = if args.changes {
        let cwd = env::current_dir()?;
        changed_files(&cwd)?
    } else if args.paths.is_empty() {
        anyhow::bail!(
            "{}\n{}\n  {}\n  {}",
            "No files to process.".red(),
            "Try one of:".bold(),
            "1. Pass files or directories: docstring-patcher rewrite src/",
            "2. Process changed files: docstring-patcher rewrite --changes"
        )
    } else {
        collect_files(&args.paths)?
    };

    if !files.iter().any(|f| output::is_supported(f)) {
        for file in &files {
            println!(
                "{} {}: not a Python source file, nothing to do",
                "⊘".cyan(),
                file.display()
            );
        }
        println!("{}", "No Python files to process.".yellow());
        return Ok(());
    }

    // 2. Load config and apply overrides
    let (config, config_path) = config::load(args.config.as_deref())?;
    if let Some(path) = &config_path {
        println!("{}", format!("Using config {}", path.display()).dimmed());
    }
    let mut options = RewriteOptions::from(&config.rewrite);
    if args.in_place {
        options.mode = OutputMode::InPlace;
    }
    if let Some(concurrency) = args.concurrency {
        options.concurrency = concurrency.max(1);
    }
    options.dry_run = args.dry_run;

    // 3. Build provider
    let provider = OpenAiProvider::from_env(config.provider.clone())
        .context("failed to set up the annotation provider")?;
    let rewriter = Rewriter::new(provider, options);

    if args.dry_run {
        println!("{}", "[DRY RUN - no files will be written]".cyan());
    }
    println!();

    // 4. Rewrite each file
    let mut total_rewritten = 0;
    let mut total_unchanged = 0;
    let mut total_unsupported = 0;
    let mut total_failed = 0;
    let mut total_skipped_elements = 0;

    for file in &files {
        match rewriter.rewrite_file(file) {
            Ok(report) => {
                if let Some(rewrite) = &report.rewrite {
                    total_skipped_elements += rewrite.skipped();
                }

                match &report.status {
                    FileStatus::Rewritten { output } | FileStatus::DryRun { output } => {
                        let verb = if args.dry_run { "Would write" } else { "Wrote" };
                        let (patched, skipped) = report
                            .rewrite
                            .as_ref()
                            .map_or((0, 0), |r| (r.patched(), r.skipped()));
                        println!(
                            "{} {}: {} {} ({} patched, {} skipped)",
                            "✓".green(),
                            file.display(),
                            verb,
                            output.display(),
                            patched,
                            skipped
                        );
                        total_rewritten += 1;
                    }
                    FileStatus::Unchanged => {
                        println!("{} {}: No docstring changed", "⊙".yellow(), file.display());
                        total_unchanged += 1;
                    }
                    FileStatus::Unsupported => {
                        println!(
                            "{} {}: not a Python source file, skipped",
                            "⊘".cyan(),
                            file.display()
                        );
                        total_unsupported += 1;
                    }
                }

                if let Some(rewrite) = &report.rewrite {
                    for outcome in &rewrite.outcomes {
                        if outcome.state != ElementState::Skipped {
                            continue;
                        }
                        if let Some(reason) = &outcome.skip_reason {
                            println!(
                                "  - {} {} (lines {}): {}",
                                outcome.kind,
                                outcome.name.as_deref().unwrap_or(""),
                                outcome.span,
                                reason.to_string().dimmed()
                            );
                        }
                    }

                    if args.show_diff && rewrite.changed() {
                        display_diff(file, &rewrite.original, &rewrite.text);
                    }
                }
            }
            Err(e) => {
                eprintln!("{} {}: Error - {}", "✗".red(), file.display(), e);
                total_failed += 1;

                match &e {
                    RewriteError::Parse(_) => {
                        eprintln!("  {}", "The file does not parse as Python.".red());
                    }
                    RewriteError::Patch { .. } | RewriteError::Validation(_) => {
                        eprintln!("  {}", "CONFLICT: line bookkeeping failed".red());
                        eprintln!("  No file was written.");
                    }
                    _ => {}
                }
            }
        }
    }

    // 5. Summary
    println!();
    println!("{}", "Summary:".bold());
    println!("  {} rewritten", format!("{}", total_rewritten).green());
    println!("  {} unchanged", format!("{}", total_unchanged).yellow());
    println!("  {} not Python", format!("{}", total_unsupported).cyan());
    println!(
        "  {} elements skipped",
        format!("{}", total_skipped_elements).cyan()
    );
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_elements(file: &Path) -> Result<()> {
    if !output::is_supported(file) {
        println!(
            "{} {}: not a Python source file, nothing to do",
            "⊘".cyan(),
            file.display()
        );
        return Ok(());
    }

    let source =
        fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    let elements = list_elements(&source)
        .with_context(|| format!("failed to parse {}", file.display()))?;

    println!("{}", format!("Elements of {}", file.display()).bold());
    for element in &elements {
        let docstring = match element.existing_docstring_span {
            Some(span) => format!("docstring at lines {span}").green(),
            None => "no docstring".yellow(),
        };
        let inline = if element.inline_body {
            " (inline body)".dimmed().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:>9}  {:<8} {:<24} {}{}",
            element.span().to_string(),
            element.kind.to_string(),
            element.name.as_deref().unwrap_or("-"),
            docstring,
            inline
        );
    }
    println!("{} elements", elements.len());

    Ok(())
}
