//! Low-level USTAR traversal.
//!
//! Reads header blocks from any source implementing [`ReadAt`]. There is
//! no in-memory model of the archive: every operation walks the headers
//! again from offset 0, hopping over each payload by its block count.
//!
//! ## Walking Strategy
//!
//! 1. Read the 512-byte header at the current offset
//! 2. Decode it (and, when validating, check magic, version and checksum)
//! 3. Skip `ceil(size / 512)` payload blocks to reach the next header
//! 4. Stop at the all-zero terminator
//!
//! Only [`TarParser::validate`] checks header integrity. The other walks
//! assume a validated archive and take each header at face value.

use log::{debug, trace};
use std::sync::Arc;

use crate::error::{Result, TarError};
use crate::io::ReadAt;

use super::structures::*;

/// Low-level USTAR archive parser.
///
/// Typically used through [`TarArchive`](super::TarArchive) rather than
/// directly.
pub struct TarParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
}

impl<R: ReadAt> TarParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self { reader }
    }

    /// Fill `buf` from `offset`, treating a short read as truncation.
    pub async fn read_exact(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let actual = self.reader.read_exact_at(offset, buf).await?;
        if actual < buf.len() {
            return Err(TarError::Truncated {
                offset,
                expected: buf.len(),
                actual,
            });
        }
        Ok(())
    }

    /// Check the structural integrity of every header.
    ///
    /// Each header must carry the USTAR magic, the USTAR version and a
    /// matching checksum, checked in that order. The first failure stops
    /// the pass.
    ///
    /// # Returns
    ///
    /// The number of headers before the terminator.
    ///
    /// # Errors
    ///
    /// [`TarError::Truncated`] if the archive ends before its terminator,
    /// otherwise [`TarError::BadMagic`], [`TarError::BadVersion`] or
    /// [`TarError::BadChecksum`] for the first offending header.
    pub async fn validate(&self) -> Result<usize> {
        let mut lookahead = [0u8; TERMINATOR_SIZE];

        // An archive holding nothing but its terminator has zero entries
        let n = self.reader.read_exact_at(0, &mut lookahead).await?;
        if n == TERMINATOR_SIZE && is_terminator(&lookahead) {
            return Ok(0);
        }

        let mut block = [0u8; BLOCK_SIZE];
        let mut offset = 0u64;
        let mut count = 0usize;

        loop {
            self.read_exact(offset, &mut block).await?;
            let header = HeaderBlock::from_bytes(&block)?;

            if !header.has_valid_magic() {
                return Err(TarError::BadMagic(offset));
            }
            if !header.has_valid_version() {
                return Err(TarError::BadVersion(offset));
            }
            let computed = checksum_of(&block);
            if header.checksum != computed {
                return Err(TarError::BadChecksum {
                    offset,
                    stored: header.checksum,
                    computed,
                });
            }

            count += 1;
            trace!("header {} at offset {}: {}", count, offset, header.path());
            offset += (1 + header.payload_blocks()) * BLOCK_SIZE as u64;

            // Peek without moving past the next header
            self.read_exact(offset, &mut lookahead).await?;
            if is_terminator(&lookahead) {
                debug!("archive holds {} entries", count);
                return Ok(count);
            }
        }
    }

    /// Decode the header at `offset`.
    ///
    /// Returns `None` at a clean end of the source or at an all-zero block.
    pub async fn read_entry(&self, offset: u64) -> Result<Option<TarEntry>> {
        let mut block = [0u8; BLOCK_SIZE];
        let actual = self.reader.read_exact_at(offset, &mut block).await?;
        if actual == 0 {
            return Ok(None);
        }
        // A partial block is truncation even when it is all zeros
        if actual < BLOCK_SIZE {
            return Err(TarError::Truncated {
                offset,
                expected: BLOCK_SIZE,
                actual,
            });
        }
        if block.iter().all(|&b| b == 0) {
            return Ok(None);
        }

        let header = HeaderBlock::from_bytes(&block)?;
        trace!("header at offset {}: {}", offset, header.path());
        Ok(Some(TarEntry {
            header,
            header_offset: offset,
        }))
    }

    /// Every entry in archive order.
    pub async fn entries(&self) -> Result<Vec<TarEntry>> {
        let mut entries = Vec::new();
        let mut offset = 0;
        while let Some(entry) = self.read_entry(offset).await? {
            offset = entry.next_offset();
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Find the first entry whose path equals `path` byte for byte.
    ///
    /// When `filter` is set the entry type must match as well; entries
    /// with the right path but another type are skipped.
    pub async fn find(
        &self,
        path: impl AsRef<[u8]>,
        filter: Option<EntryType>,
    ) -> Result<Option<TarEntry>> {
        let path = path.as_ref();
        let mut offset = 0;
        while let Some(entry) = self.read_entry(offset).await? {
            if entry.header.path_bytes() == path && filter.is_none_or(|t| entry.entry_type() == t) {
                debug!("found {} ({}) at offset {}", entry.path(), entry.entry_type(), offset);
                return Ok(Some(entry));
            }
            offset = entry.next_offset();
        }
        debug!("no entry at {}", String::from_utf8_lossy(path));
        Ok(None)
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::test::{ArchiveBuilder, HeaderSpec, sample_archive};
    use similar_asserts::assert_eq;

    fn parser(image: Vec<u8>) -> TarParser<MemoryReader> {
        TarParser::new(Arc::new(MemoryReader::new(image)))
    }

    #[tokio::test]
    async fn validate_counts_headers() {
        assert_eq!(parser(sample_archive().build()).validate().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn validate_multi_block_payloads() {
        let big = vec![7u8; 3 * BLOCK_SIZE + 1];
        let image = ArchiveBuilder::new()
            .file("big.bin", &big)
            .file("exact.bin", &[1u8; BLOCK_SIZE])
            .file("empty", b"")
            .build();
        assert_eq!(parser(image).validate().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn validate_empty_archive() {
        let image = ArchiveBuilder::new().build();
        assert_eq!(parser(image).validate().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn validate_bad_magic() {
        let mut image = sample_archive().build();
        // second header, right after the 12-byte payload of file1.txt
        let second = 2 * BLOCK_SIZE;
        image[second + 257..second + 263].copy_from_slice(b"ustar ");
        let err = parser(image).validate().await.unwrap_err();
        assert!(matches!(err, TarError::BadMagic(o) if o == second as u64), "{err}");
    }

    #[tokio::test]
    async fn validate_bad_version() {
        let mut image = sample_archive().build();
        image[263..265].copy_from_slice(b" \0");
        let err = parser(image).validate().await.unwrap_err();
        assert!(matches!(err, TarError::BadVersion(0)), "{err}");
    }

    #[tokio::test]
    async fn validate_magic_checked_before_version() {
        let mut image = sample_archive().build();
        image[257..265].copy_from_slice(b"ustar  \0");
        let err = parser(image).validate().await.unwrap_err();
        assert!(matches!(err, TarError::BadMagic(0)), "{err}");
    }

    #[tokio::test]
    async fn validate_bad_checksum() {
        let mut image = sample_archive().build();
        image[0] = b'F';
        let err = parser(image).validate().await.unwrap_err();
        match err {
            TarError::BadChecksum {
                offset,
                stored,
                computed,
            } => {
                assert_eq!(offset, 0);
                assert_eq!(computed, stored - (b'f' - b'F') as u64);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn validate_missing_terminator() {
        let image = sample_archive().unterminated();
        let err = parser(image).validate().await.unwrap_err();
        assert!(matches!(err, TarError::Truncated { .. }), "{err}");
    }

    #[tokio::test]
    async fn validate_truncated_payload() {
        let mut image = ArchiveBuilder::new().file("a", &[1u8; 2000]).build();
        image.truncate(3 * BLOCK_SIZE);
        let err = parser(image).validate().await.unwrap_err();
        assert!(err.is_structural());
        assert!(matches!(err, TarError::Truncated { .. }), "{err}");
    }

    #[tokio::test]
    async fn find_first_match_wins() {
        let image = ArchiveBuilder::new()
            .file("dup", b"first")
            .file("dup", b"second!")
            .build();
        let entry = parser(image).find("dup", None).await.unwrap().unwrap();
        assert_eq!(entry.header.size, 5);
        assert_eq!(entry.header_offset, 0);
    }

    #[tokio::test]
    async fn find_with_filter_skips_other_types() {
        let image = ArchiveBuilder::new()
            .symlink("x", "target")
            .dir("x")
            .build();
        let p = parser(image);
        let entry = p.find("x", Some(EntryType::Directory)).await.unwrap().unwrap();
        assert_eq!(entry.header_offset, BLOCK_SIZE as u64);
        assert!(p.find("x", Some(EntryType::Regular)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_does_not_match_payload_bytes() {
        // payload that looks like a header named "ghost"
        let fake = HeaderSpec::file("ghost", 0).encode();
        let image = ArchiveBuilder::new().file("carrier", &fake).build();
        let p = parser(image);
        assert!(p.find("ghost", None).await.unwrap().is_none());
        assert!(p.find("carrier", None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn find_exact_path_only() {
        let p = parser(sample_archive().build());
        assert!(p.find("dir", None).await.unwrap().is_none());
        assert!(p.find("dir/", None).await.unwrap().is_some());
        assert!(p.find("file1", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_compares_raw_name_bytes() {
        // both names decode to "caf\u{FFFD}" when read lossily
        let image = ArchiveBuilder::new()
            .entry(HeaderSpec::file("", 1).with_name_bytes(b"caf\xe9"), b"1")
            .entry(HeaderSpec::file("", 2).with_name_bytes(b"caf\xe8"), b"22")
            .build();
        let p = parser(image);
        assert_eq!(p.validate().await.unwrap(), 2);

        assert!(p.find("caf\u{FFFD}", None).await.unwrap().is_none());
        let entry = p.find(b"caf\xe8", None).await.unwrap().unwrap();
        assert_eq!(entry.header_offset, 2 * BLOCK_SIZE as u64);
        assert_eq!(entry.header.size, 2);
    }

    #[tokio::test]
    async fn entries_in_order() {
        let p = parser(sample_archive().build());
        let paths: Vec<_> = p.entries().await.unwrap().iter().map(|e| e.path()).collect();
        assert_eq!(paths, vec!["file1.txt", "dir/", "dir/file1.txt", "link"]);
    }

    #[tokio::test]
    async fn entries_partial_header_is_truncated() {
        let mut image = sample_archive().unterminated();
        image.extend_from_slice(&HeaderSpec::file("cut", 0).encode()[..100]);
        let err = parser(image).entries().await.unwrap_err();
        assert!(matches!(err, TarError::Truncated { actual: 100, .. }), "{err}");
    }

    #[tokio::test]
    async fn entries_zero_fragment_is_truncated() {
        let mut image = sample_archive().unterminated();
        image.extend_from_slice(&[0u8; 100]);
        let p = parser(image);

        let err = p.entries().await.unwrap_err();
        assert!(matches!(err, TarError::Truncated { actual: 100, .. }), "{err}");
        let err = p.find("missing", None).await.unwrap_err();
        assert!(matches!(err, TarError::Truncated { actual: 100, .. }), "{err}");
    }
}
