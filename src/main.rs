use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use pio_patcher::{apply, check, load_from_path, BuildEnv, PatchOutcome, PatchSpec};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pio-patcher")]
#[command(about = "Build-time source patcher for PlatformIO library dependencies", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the patch (no-op if the marker already exists)
    Apply {
        /// Libdeps root (defaults to $PROJECT_LIBDEPS_DIR)
        #[arg(short = 'd', long)]
        libdeps_dir: Option<PathBuf>,

        /// Build environment name (defaults to $PIOENV)
        #[arg(short, long)]
        env: Option<String>,

        /// TOML patch spec (defaults to the built-in MIDI pitch bend fix)
        #[arg(short, long)]
        spec: Option<PathBuf>,

        /// Dry run - report what would change without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(long)]
        diff: bool,
    },

    /// Report patch status without applying
    Status {
        /// Libdeps root (defaults to $PROJECT_LIBDEPS_DIR)
        #[arg(short = 'd', long)]
        libdeps_dir: Option<PathBuf>,

        /// Build environment name (defaults to $PIOENV)
        #[arg(short, long)]
        env: Option<String>,

        /// TOML patch spec (defaults to the built-in MIDI pitch bend fix)
        #[arg(short, long)]
        spec: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            libdeps_dir,
            env,
            spec,
            dry_run,
            diff,
        } => cmd_apply(libdeps_dir, env, spec, dry_run, diff),

        Commands::Status {
            libdeps_dir,
            env,
            spec,
        } => cmd_status(libdeps_dir, env, spec),
    }
}

/// Helper: load the spec from --spec, or fall back to the built-in patch.
fn load_spec(spec_path: Option<PathBuf>) -> Result<PatchSpec> {
    match spec_path {
        Some(path) => Ok(load_from_path(&path)?),
        None => Ok(PatchSpec::midi_pitch_bend()),
    }
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
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn report_outcome(outcome: &PatchOutcome, dry_run: bool) {
    match outcome {
        PatchOutcome::Applied { .. } => {
            if dry_run {
                println!("{} Would apply: {}", "✓".green(), outcome);
            } else {
                println!("{} {}", "✓".green(), outcome);
            }
        }
        PatchOutcome::MarkerPresent { .. } => {
            println!("{} {}", "⊙".yellow(), outcome);
        }
        PatchOutcome::AlreadyPatched { .. } => {
            println!("{} {}", "⊙".yellow(), outcome);
        }
        PatchOutcome::TargetDrifted { .. } => {
            eprintln!("{} {}", "⚠".yellow(), format!("Warning: {}", outcome).yellow());
        }
    }
}

fn cmd_apply(
    libdeps_dir: Option<PathBuf>,
    env: Option<String>,
    spec_path: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let build_env = BuildEnv::resolve(libdeps_dir, env)?;
    let spec = load_spec(spec_path)?;

    let target = build_env.target_path(&spec);
    println!("File to patch: {}", target.display());

    // Capture content before applying, for diff output.
    let content_before = if show_diff {
        fs::read_to_string(&target).ok()
    } else {
        None
    };

    let outcome = if dry_run {
        println!("{}", "[DRY RUN - nothing will be written]".cyan());
        check(&build_env, &spec)?
    } else {
        apply(&build_env, &spec)?
    };

    report_outcome(&outcome, dry_run);

    if show_diff {
        match (&outcome, content_before) {
            (PatchOutcome::Applied { .. }, Some(before)) => {
                if dry_run {
                    let (after, _) =
                        pio_patcher::replace_literal(&before, &spec.search, &spec.replace);
                    display_diff(&target, &before, &after);
                } else if let Ok(after) = fs::read_to_string(&target) {
                    if before != after {
                        display_diff(&target, &before, &after);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn cmd_status(
    libdeps_dir: Option<PathBuf>,
    env: Option<String>,
    spec_path: Option<PathBuf>,
) -> Result<()> {
    let build_env = BuildEnv::resolve(libdeps_dir, env)?;
    let spec = load_spec(spec_path)?;

    println!("{}", "Patch Status Report".bold());
    println!("Libdeps: {}", build_env.libdeps_dir.display());
    println!("Environment: {}", build_env.environment);
    println!("Target: {}", build_env.target_path(&spec).display());
    println!();

    let outcome = check(&build_env, &spec)?;
    match &outcome {
        PatchOutcome::Applied { occurrences, .. } => {
            println!(
                "{} {} ({} occurrence{} of the search text)",
                "⊙".yellow(),
                "NOT APPLIED".yellow().bold(),
                occurrences,
                if *occurrences == 1 { "" } else { "s" }
            );
        }
        PatchOutcome::MarkerPresent { marker } => {
            println!(
                "{} {} (marker {})",
                "✓".green(),
                "APPLIED".green().bold(),
                marker.display()
            );
        }
        PatchOutcome::AlreadyPatched { .. } => {
            println!(
                "{} {} (content patched, marker missing)",
                "✓".green(),
                "APPLIED".green().bold()
            );
        }
        PatchOutcome::TargetDrifted { .. } => {
            println!("{} {}", "✗".red(), "DRIFTED".red().bold());
            println!("  Search text absent from the target. Possible causes:");
            println!("    - Different library version was fetched");
            println!("    - File was edited manually");
        }
    }

    Ok(())
}
