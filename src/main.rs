//! Main entry point for the runtar CLI application.
//!
//! This binary provides a command-line interface for inspecting tar archives
//! from both local filesystem and remote HTTP URLs.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use runtar::{Cli, HttpRangeReader, LocalFileReader, ReadAt, TarArchive, TarEntry};

/// Chunk size used when piping file contents.
const PIPE_CHUNK: usize = 64 * 1024;

/// Application entry point.
///
/// Parses command-line arguments and dispatches to the appropriate handler
/// based on whether the input is a local file or HTTP URL.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.is_http_url() {
        // Remote archive via HTTP Range requests
        let reader = HttpRangeReader::new(cli.file.clone()).await?;
        let transferred_before = reader.transferred_bytes();
        let reader = Arc::new(reader);

        process_tar(reader.clone(), &cli).await?;

        if !cli.is_quiet() {
            let transferred = reader.transferred_bytes() - transferred_before;
            eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
        }
    } else {
        let reader = LocalFileReader::new(Path::new(&cli.file))
            .with_context(|| format!("cannot open {}", cli.file))?;
        process_tar(Arc::new(reader), &cli).await?;
    }

    Ok(())
}

/// Run the mode selected on the command line against one archive.
///
/// The archive is validated first unless `--no-validate` is given, since
/// lookups take headers at face value.
async fn process_tar<R: ReadAt + 'static>(reader: Arc<R>, cli: &Cli) -> Result<()> {
    if let Some(limit) = cli.max_size {
        if reader.size() > limit {
            bail!(
                "{} is {}, larger than the {} limit",
                cli.file,
                format_size(reader.size()),
                format_size(limit)
            );
        }
    }

    let archive = TarArchive::new(reader);

    if cli.is_test_only() || !cli.no_validate {
        let count = match archive.validate().await {
            Ok(count) => count,
            Err(e) if e.is_structural() => {
                bail!("{}: not a valid USTAR archive: {}", cli.file, e)
            }
            Err(e) => return Err(e.into()),
        };
        if cli.is_test_only() {
            if !cli.is_very_quiet() {
                println!("No errors detected in {} ({} entries)", cli.file, count);
            }
            return Ok(());
        }
    }

    if cli.stat {
        return stat_paths(&archive, cli).await;
    }

    if cli.list || cli.verbose {
        return list_entries(&archive, cli).await;
    }

    let multiple_files = cli.paths.len() > 1;
    for path in &cli.paths {
        pipe_file(&archive, path, cli, multiple_files).await?;
    }

    Ok(())
}

/// Print the type of each requested path.
async fn stat_paths<R: ReadAt + 'static>(archive: &TarArchive<R>, cli: &Cli) -> Result<()> {
    for path in &cli.paths {
        match archive.entry(path).await? {
            Some(entry) if entry.header.linkname.is_empty() => {
                println!("{}: {}", path, entry.entry_type())
            }
            Some(entry) => println!(
                "{}: {} to {}",
                path,
                entry.entry_type(),
                entry.header.linkname
            ),
            None => println!("{}: missing", path),
        }
    }
    Ok(())
}

/// List archive contents.
///
/// Without PATHS every entry is printed in archive order. With PATHS each
/// one is listed as a directory, showing only its immediate children.
async fn list_entries<R: ReadAt + 'static>(archive: &TarArchive<R>, cli: &Cli) -> Result<()> {
    if cli.paths.is_empty() {
        let entries = archive.entries().await?;
        print_entries(&entries, cli.verbose);
        return Ok(());
    }

    for (i, path) in cli.paths.iter().enumerate() {
        let listing = archive.list(path, cli.capacity).await?;

        if cli.paths.len() > 1 {
            if i > 0 {
                println!();
            }
            println!("{}:", path);
        }
        print_entries(&listing.entries, cli.verbose);

        if listing.is_truncated() && !cli.is_very_quiet() {
            eprintln!(
                "{}: showing {} of {} entries (raise -c to see more)",
                path,
                listing.entries.len(),
                listing.matched
            );
        }
    }

    Ok(())
}

/// Print entries either as bare paths or as an `ls -l` style table.
fn print_entries(entries: &[TarEntry], verbose: bool) {
    if !verbose {
        for entry in entries {
            println!("{}", entry.path());
        }
        return;
    }

    let mut total_size = 0u64;
    for entry in entries {
        let header = &entry.header;
        let (year, month, day, hour, minute, _second) = header.mod_datetime();
        let owner = format!(
            "{}/{}",
            owner_name(&header.uname, header.uid),
            owner_name(&header.gname, header.gid)
        );

        let mut line = format!(
            "{} {:<17} {:>10}  {:04}-{:02}-{:02} {:02}:{:02}  {}",
            header.mode_string(),
            owner,
            header.size,
            year,
            month,
            day,
            hour,
            minute,
            entry.path()
        );
        if !header.linkname.is_empty() {
            line.push_str(" -> ");
            line.push_str(&header.linkname);
        }
        println!("{}", line);

        total_size += header.size;
    }

    println!("{}", "-".repeat(70));
    println!("{:>29}  {} entries", total_size, entries.len());
}

fn owner_name(name: &str, id: u32) -> String {
    if name.is_empty() {
        id.to_string()
    } else {
        name.to_string()
    }
}

/// Write one file's contents to stdout.
///
/// Reads in fixed-size chunks through [`TarArchive::read_file`], starting at
/// `--offset` and stopping after `--length` bytes or at the end of the file.
async fn pipe_file<R: ReadAt + 'static>(
    archive: &TarArchive<R>,
    path: &str,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    if show_filename {
        stdout
            .write_all(format!("--- {} ---\n", path).as_bytes())
            .await?;
    }

    let mut buf = vec![0u8; PIPE_CHUNK];
    let mut offset = cli.offset;
    let mut budget = cli.length.unwrap_or(u64::MAX);

    while budget > 0 {
        let want = (buf.len() as u64).min(budget) as usize;
        let read = archive
            .read_file(path, offset, &mut buf[..want])
            .await
            .with_context(|| format!("cannot read {}", path))?;

        stdout.write_all(&buf[..read.bytes_read]).await?;
        offset += read.bytes_read as u64;
        budget -= read.bytes_read as u64;

        if read.remaining == 0 || read.bytes_read == 0 {
            break;
        }
    }

    stdout.flush().await?;
    Ok(())
}

/// Format a byte size into a human-readable string.
///
/// # Examples
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
