//! emx-bundle CLI
//!
//! Pack text files into a bundle and unpack them again.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use emx_bundle::{DecodeOptions, Decoder, Encoder, MemorySink, Summary, TracingObserver, DEFAULT_SEPARATOR};
use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "emx-bundle")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "Separator-delimited text bundle tool")]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack files into a bundle
    Bundle {
        /// Files and directories to pack (default: files tracked by git)
        inputs: Vec<PathBuf>,

        /// Output bundle file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Separator line
        #[arg(short, long, default_value = DEFAULT_SEPARATOR)]
        separator: String,

        /// Description written to the bundle header
        #[arg(short, long)]
        description: Option<String>,

        /// Add the files listed by `git ls-files`
        #[arg(long)]
        git: bool,
    },

    /// Extract a bundle
    Unbundle {
        /// Bundle file (default: stdin)
        input: Option<PathBuf>,

        /// Directory to extract to
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,

        /// Write entries even if their checksum is missing or wrong
        #[arg(long)]
        no_verify: bool,

        /// Check the bundle without writing any file
        #[arg(long)]
        trial_run: bool,
    },

    /// List the entries of a bundle without extracting
    List {
        /// Bundle file (default: stdin)
        input: Option<PathBuf>,

        /// Accept entries whose checksum is missing or wrong
        #[arg(long)]
        no_verify: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Bundle {
            inputs,
            output,
            separator,
            description,
            git,
        } => {
            bundle(inputs, output, separator, description, git)?;
        }
        Commands::Unbundle {
            input,
            output_dir,
            no_verify,
            trial_run,
        } => {
            unbundle(input, output_dir, no_verify, trial_run)?;
        }
        Commands::List { input, no_verify } => {
            list(input, no_verify)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}

/// A file to pack: where to read it and the name it gets in the bundle
type SourceFile = (PathBuf, String);

fn bundle(
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    separator: String,
    description: Option<String>,
    git: bool,
) -> Result<()> {
    let mut files = collect_inputs(&inputs)?;
    if git || inputs.is_empty() {
        files.extend(git_ls_files()?.into_iter().map(|path| {
            let name = entry_name(&path);
            (path, name)
        }));
    }
    let mut seen = HashSet::new();
    files.retain(|file| seen.insert(file.clone()));
    if let Some(output) = &output {
        exclude_output(&mut files, output);
    }

    let mut encoder = Encoder::new(separator).context("Invalid separator")?;
    if let Some(description) = description {
        encoder = encoder.with_description(description);
    }

    let count = match &output {
        Some(output_path) => {
            let dir = match output_path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let mut tmp = tempfile::NamedTempFile::new_in(dir)
                .with_context(|| format!("Failed to create output in: {}", dir.display()))?;
            let count = encoder.encode_paths(&files, tmp.as_file_mut())?;
            tmp.persist(output_path)
                .with_context(|| format!("Failed to write: {}", output_path.display()))?;
            count
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            let count = encoder.encode_paths(&files, &mut lock)?;
            lock.flush()?;
            count
        }
    };

    info!(files = count, "bundle created");
    Ok(())
}

/// Files are named by their file name, directory contents relative to the
/// directory itself
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            collect_directory(input, &mut files)?;
        } else if input.is_file() {
            let name = input
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid filename: {}", input.display()))?
                .to_string_lossy()
                .to_string();
            files.push((input.clone(), name));
        } else {
            anyhow::bail!("No such file or directory: {}", input.display());
        }
    }
    Ok(files)
}

fn collect_directory(dir: &Path, files: &mut Vec<SourceFile>) -> Result<()> {
    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk: {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|_| anyhow::anyhow!("Failed to get relative path: {}", entry.path().display()))?;
        let name = entry_name(relative);
        debug!(path = %entry.path().display(), %name, "found file");
        files.push((entry.into_path(), name));
    }
    Ok(())
}

/// Bundle names always use `/`
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Never pack the bundle into itself
fn exclude_output(files: &mut Vec<SourceFile>, output: &Path) {
    // Nothing to exclude if the output doesn't exist yet
    let Ok(target) = fs::canonicalize(output) else {
        return;
    };
    files.retain(|(path, _)| fs::canonicalize(path).map_or(true, |p| p != target));
}

fn git_ls_files() -> Result<Vec<PathBuf>> {
    let output = Command::new("git")
        .arg("ls-files")
        .output()
        .context("Failed to run git ls-files")?;
    if !output.status.success() {
        anyhow::bail!(
            "git ls-files failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8(output.stdout).context("git ls-files printed non-UTF-8 output")?;
    Ok(stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

fn open_input(input: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match input {
        Some(path) => {
            let file = fs::File::open(path).with_context(|| format!("Failed to read: {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn unbundle(input: Option<PathBuf>, output_dir: PathBuf, no_verify: bool, trial_run: bool) -> Result<()> {
    let reader = open_input(input.as_deref())?;
    let decoder = Decoder::new().with_options(DecodeOptions {
        verify: !no_verify,
        trial_run,
    });

    let summary = decoder
        .decode_to_dir(reader, &output_dir)
        .with_context(|| format!("Failed to unbundle into: {}", output_dir.display()))?;

    if trial_run {
        print_entries(&summary);
    }
    info!(files = summary.entries.len(), trial_run, "bundle extracted");
    Ok(())
}

fn list(input: Option<PathBuf>, no_verify: bool) -> Result<()> {
    let reader = open_input(input.as_deref())?;
    let decoder = Decoder::new().with_verify(!no_verify).with_trial_run(true);

    let summary = decoder
        .decode_with(reader, MemorySink::new(), TracingObserver)
        .context("Failed to read bundle")?;

    if !summary.description.is_empty() {
        println!("# {}", summary.description);
    }
    print_entries(&summary);
    Ok(())
}

fn print_entries(summary: &Summary) {
    for entry in &summary.entries {
        println!("{}  {}  {}", entry.name, entry.size, entry.verification);
    }
}
