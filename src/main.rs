//! Main entry point for the zipkit CLI application.
//!
//! A thin front end over [`ArchiveSession`] and the one-shot helpers: list,
//! extract and compress.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use zipkit::cli::Command;
use zipkit::{ArchiveSession, Cli, OpenHint};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match &cli.command {
        Command::List { zip, long } => list_files(zip, *long),
        Command::Extract {
            zip,
            names,
            extract_dir,
        } => extract(&cli, zip, names, extract_dir.as_deref()),
        Command::Compress { paths, output } => compress(&cli, paths, output.as_deref()),
    }
}

/// List the archive, either names only or as a table with a totals line.
fn list_files(zip: &Path, long: bool) -> Result<()> {
    let session = open_for_reading(zip)?;

    if long {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for (index, name) in session.contents().iter() {
        if !long {
            println!("{name}");
            continue;
        }

        let Some(stat) = session.stat(index) else {
            continue;
        };
        let (date, time) = match stat.modified {
            Some(modified) => (
                modified.format("%Y-%m-%d").to_string(),
                modified.format("%H:%M").to_string(),
            ),
            None => ("----------".to_string(), "--:--".to_string()),
        };

        println!(
            "{:>10}  {:>10}  {}  {}  {}  {}",
            stat.uncompressed_size,
            stat.compressed_size,
            ratio(stat.compressed_size, stat.uncompressed_size),
            date,
            time,
            name
        );

        if session.is_file(index) {
            total_uncompressed += stat.uncompressed_size;
            total_compressed += stat.compressed_size;
            file_count += 1;
        }
    }

    if long {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {}  {:>17}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }

    Ok(())
}

/// Extract everything, or only the named entries.
///
/// Names go through `find_index`, so a bare file name matches the first file
/// with that name anywhere in the archive. Folder entries extract their
/// contents directly into the output folder.
fn extract(cli: &Cli, zip: &Path, names: &[String], extract_dir: Option<&Path>) -> Result<()> {
    let mut session = open_for_reading(zip)?;
    session.set_verbose(cli.verbose);
    session.set_output_folder(extract_dir.map(Path::to_path_buf));

    if names.is_empty() {
        session
            .extract_all()
            .with_context(|| format!("failed to extract {}", zip.display()))?;
        if !cli.is_quiet() {
            eprintln!(
                "Extracted {} items ({})",
                session.count(),
                format_size(session.total_size_uncompressed())
            );
        }
        return Ok(());
    }

    let output_folder = session
        .output_folder()
        .context("no output folder for extraction")?;

    let mut missing = Vec::new();
    for name in names {
        let Some(index) = session.find_index(name) else {
            missing.push(name.as_str());
            continue;
        };

        if session.is_folder(index) {
            session.extract_folder(index, &output_folder)?;
        } else {
            session.extract_index_here(index, true)?;
        }

        if !cli.is_quiet() {
            println!("  extracting: {}", session.name(index).unwrap_or(name.as_str()));
        }
    }

    if !missing.is_empty() {
        bail!("not found in archive: {}", missing.join(", "));
    }
    Ok(())
}

/// Compress one or more paths. Without `-o` the archive is named the way
/// `compress` and `compress_here` name it.
fn compress(cli: &Cli, paths: &[PathBuf], output: Option<&Path>) -> Result<()> {
    let zip_path = match (output, paths) {
        (Some(output), _) => output.to_path_buf(),
        (None, [single]) => zipkit::convenience::default_zip_path(single)?,
        (None, _) => zipkit::convenience::default_list_zip_path(paths)?,
    };

    let created = if let [single] = paths {
        zipkit::compress_to(single, &zip_path)
    } else {
        zipkit::compress_list(paths, &zip_path)
    };
    created.with_context(|| format!("failed to create {}", zip_path.display()))?;

    if !cli.is_quiet() {
        let size = std::fs::metadata(&zip_path).map(|m| m.len()).unwrap_or(0);
        eprintln!("Created {} ({})", zip_path.display(), format_size(size));
    }
    Ok(())
}

fn open_for_reading(zip: &Path) -> Result<ArchiveSession> {
    let mut session = ArchiveSession::new();
    session
        .set_archive(zip, OpenHint::Read)
        .with_context(|| format!("cannot open {}", zip.display()))?;
    Ok(session)
}

/// Percentage saved by compression, formatted to five columns.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Format a byte size into a human-readable string.
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
