use log::{debug, warn};
use std::sync::Arc;

use crate::error::{Result, TarError};
use crate::io::ReadAt;

use super::parser::TarParser;
use super::structures::{EntryType, TarEntry};
use super::symlink::{self, LinkUse};

/// Immediate children of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Total number of immediate children, including those beyond capacity.
    pub matched: usize,
    /// The first children found, at most the requested capacity.
    pub entries: Vec<TarEntry>,
}

impl Listing {
    /// True if more children exist than were returned.
    pub fn is_truncated(&self) -> bool {
        self.matched > self.entries.len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(TarEntry::path).collect()
    }
}

/// Outcome of a partial file read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRead {
    /// Bytes copied into the destination buffer.
    pub bytes_read: usize,
    /// Bytes left between the end of this read and the end of the file.
    pub remaining: u64,
}

/// Read-only view of a USTAR archive
pub struct TarArchive<R: ReadAt> {
    parser: TarParser<R>,
}

impl<R: ReadAt> TarArchive<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: TarParser::new(reader),
        }
    }

    /// Check every header and count the entries.
    ///
    /// Lookups assume a well-formed archive; run this first on untrusted input.
    pub async fn validate(&self) -> Result<usize> {
        self.parser.validate().await
    }

    /// List all entries in the archive
    pub async fn entries(&self) -> Result<Vec<TarEntry>> {
        self.parser.entries().await
    }

    /// First entry at exactly `path`, of any type.
    pub async fn entry(&self, path: &str) -> Result<Option<TarEntry>> {
        self.parser.find(path, None).await
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.parser.find(path, None).await?.is_some())
    }

    pub async fn is_dir(&self, path: &str) -> Result<bool> {
        self.is_type(path, EntryType::Directory).await
    }

    pub async fn is_file(&self, path: &str) -> Result<bool> {
        self.is_type(path, EntryType::Regular).await
    }

    pub async fn is_symlink(&self, path: &str) -> Result<bool> {
        self.is_type(path, EntryType::Symlink).await
    }

    async fn is_type(&self, path: &str, entry_type: EntryType) -> Result<bool> {
        Ok(self.parser.find(path, Some(entry_type)).await?.is_some())
    }

    /// List the immediate children of the directory at `path`.
    ///
    /// A symlink at `path` is followed once. A path without a trailing `/`
    /// is treated as the directory of that name; the empty path lists the
    /// archive root. Grandchildren never appear in the result.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory path inside the archive
    /// * `capacity` - Maximum number of entries to return
    ///
    /// # Errors
    ///
    /// [`TarError::NotADirectory`] if the entry at `path` exists but is not
    /// a directory, [`TarError::NotFound`] if no directory entry is at
    /// `path`, nothing lies under it, or a symlink there has no target.
    pub async fn list(&self, path: &str, capacity: usize) -> Result<Listing> {
        let mut path = path.as_bytes().to_vec();
        let mut follow_links = true;
        let mut dir_entry = false;

        loop {
            match self.parser.find(&path, None).await? {
                Some(entry) if follow_links && entry.entry_type() == EntryType::Symlink => {
                    let Some(target) = symlink::resolve(&entry, LinkUse::Directory) else {
                        return Err(TarError::NotFound(lossy(&path)));
                    };
                    path = target;
                    follow_links = false;
                }
                Some(entry) if entry.entry_type() != EntryType::Directory => {
                    warn!("cannot list {}: it is a {}", lossy(&path), entry.entry_type());
                    return Err(TarError::NotADirectory(lossy(&path)));
                }
                Some(_) => {
                    dir_entry = true;
                    break;
                }
                None => break,
            }
        }

        let mut prefix = path;
        if !prefix.is_empty() && !prefix.ends_with(b"/") {
            prefix.push(b'/');
        }

        let mut listing = Listing {
            matched: 0,
            entries: Vec::new(),
        };
        let mut under_prefix = dir_entry;
        let mut offset = 0;

        while let Some(entry) = self.parser.read_entry(offset).await? {
            offset = entry.next_offset();

            let name = entry.header.path_bytes();
            let Some(rest) = name.strip_prefix(prefix.as_slice()) else {
                continue;
            };
            under_prefix = true;

            if rest.is_empty() {
                if entry.entry_type() != EntryType::Directory {
                    warn!("cannot list {}: it is a {}", lossy(&prefix), entry.entry_type());
                    return Err(TarError::NotADirectory(lossy(&prefix)));
                }
                continue;
            }

            if is_immediate_child(rest) {
                listing.matched += 1;
                if listing.entries.len() < capacity {
                    listing.entries.push(entry);
                }
            }
        }

        if !under_prefix {
            return Err(TarError::NotFound(lossy(&prefix)));
        }
        debug!("{} has {} children", lossy(&prefix), listing.matched);
        Ok(listing)
    }

    /// Copy part of a regular file into `buf`.
    ///
    /// Reads from `offset` until `buf` is full or the file ends. A symlink at
    /// `path` is followed once.
    ///
    /// # Returns
    ///
    /// The number of bytes copied and how many bytes of the file remain after
    /// them; zero remaining means the read reached the end of the file.
    ///
    /// # Errors
    ///
    /// [`TarError::NotAFile`] if nothing usable is at `path`,
    /// [`TarError::OffsetOutOfRange`] if `offset` is beyond the file size,
    /// [`TarError::Truncated`] if the archive ends inside the payload.
    pub async fn read_file(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<FileRead> {
        let mut path = path.as_bytes().to_vec();
        let mut follow_links = true;

        let entry = loop {
            let Some(entry) = self.parser.find(&path, None).await? else {
                return Err(TarError::NotAFile(lossy(&path)));
            };
            match entry.entry_type() {
                EntryType::Regular => break entry,
                EntryType::Symlink if follow_links => {
                    let Some(target) = symlink::resolve(&entry, LinkUse::File) else {
                        return Err(TarError::NotAFile(lossy(&path)));
                    };
                    path = target;
                    follow_links = false;
                }
                _ => return Err(TarError::NotAFile(lossy(&path))),
            }
        };

        let size = entry.header.size;
        if offset > size {
            return Err(TarError::OffsetOutOfRange {
                path: lossy(&path),
                offset,
                size,
            });
        }

        let available = size - offset;
        let len = available.min(buf.len() as u64) as usize;
        self.parser
            .read_exact(entry.data_offset() + offset, &mut buf[..len])
            .await?;

        Ok(FileRead {
            bytes_read: len,
            remaining: available - len as u64,
        })
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &Arc<R> {
        self.parser.reader()
    }
}

/// True if `rest` names something directly inside the listed directory:
/// no `/` at all, or a single trailing one for a subdirectory.
fn is_immediate_child(rest: &[u8]) -> bool {
    let rest = rest.strip_suffix(b"/").unwrap_or(rest);
    !rest.is_empty() && !rest.contains(&b'/')
}

/// Archive path rendered for errors and logs.
fn lossy(path: &[u8]) -> String {
    String::from_utf8_lossy(path).into_owned()
}
