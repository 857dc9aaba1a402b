//! # runtar
//!
//! A read-only USTAR archive inspector with HTTP URL support using Range requests.
//!
//! This library validates tar archives, looks entries up by path, lists
//! directories and reads byte ranges of files, without extracting anything.
//! Archives can live on the local filesystem, in memory, behind any
//! seekable stream, or on a remote HTTP server that honours Range requests.
//!
//! ## Features
//!
//! - Structural validation (magic, version and checksum of every header)
//! - Path classification: exists, directory, regular file, symlink
//! - Non-recursive directory listing with a capacity bound
//! - Offset-based partial reads of file contents
//! - Single-hop symbolic link resolution for listing and reading
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use runtar::{LocalFileReader, TarArchive};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = Arc::new(LocalFileReader::new(Path::new("archive.tar"))?);
//!     let archive = TarArchive::new(reader);
//!
//!     // Trust nothing before the archive has been validated
//!     let count = archive.validate().await?;
//!     println!("{count} entries");
//!
//!     let listing = archive.list("dir/", 16).await?;
//!     for path in listing.paths() {
//!         println!("{path}");
//!     }
//!
//!     let mut buf = [0u8; 64];
//!     let read = archive.read_file("dir/file1.txt", 0, &mut buf).await?;
//!     println!("{} bytes read, {} left", read.bytes_read, read.remaining);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod tar;


pub use cli::Cli;
pub use error::{Result, TarError};
pub use io::{HttpRangeReader, LocalFileReader, MemoryReader, ReadAt, StreamReader};
pub use tar::{EntryType, FileRead, Listing, TarArchive, TarEntry};
