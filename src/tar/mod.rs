//! USTAR archive decoding.
//!
//! This module provides read-only access to USTAR archives: integrity
//! validation, path lookup, directory listing and offset-based file reads.
//!
//! ## Architecture
//!
//! - [`structures`]: The 512-byte header block, entry types, checksum and terminator checks
//! - [`parser`]: Header-by-header traversal and the validation pass
//! - [`symlink`]: Single-hop symbolic link resolution
//! - [`archive`]: High-level API for end users
//!
//! ## USTAR Format Overview
//!
//! A tar archive is a sequence of entries, each made of:
//! 1. A 512-byte header (name, octal size, type flag, link target, checksum, magic)
//! 2. The payload, zero-padded to a multiple of 512 bytes
//!
//! Two all-zero blocks end the archive. There is no index, so every lookup
//! walks the headers from the start of the archive.
//!
//! ## Limitations
//!
//! - No GNU or PAX extensions (long names, sparse files, extended headers)
//! - No multi-volume archives
//! - Symbolic links are followed at most once

mod archive;
mod parser;
mod structures;
pub mod symlink;

pub use archive::{FileRead, Listing, TarArchive};
pub use parser::TarParser;
pub use structures::*;
