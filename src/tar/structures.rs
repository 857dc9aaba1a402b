use std::fmt;

use crate::error::{Result, TarError};

/// Size of every header and payload block.
pub const BLOCK_SIZE: usize = 512;

/// Two all-zero blocks mark the end of the archive.
pub const TERMINATOR_SIZE: usize = 2 * BLOCK_SIZE;

/// `ustar` followed by a NUL.
pub const USTAR_MAGIC: &[u8; 6] = b"ustar\0";

/// USTAR version, no trailing NUL.
pub const USTAR_VERSION: &[u8; 2] = b"00";

// Field offsets within a header block.
const NAME: std::ops::Range<usize> = 0..100;
const MODE: std::ops::Range<usize> = 100..108;
const UID: std::ops::Range<usize> = 108..116;
const GID: std::ops::Range<usize> = 116..124;
const SIZE: std::ops::Range<usize> = 124..136;
const MTIME: std::ops::Range<usize> = 136..148;
const CHECKSUM: std::ops::Range<usize> = 148..156;
const TYPEFLAG: usize = 156;
const LINKNAME: std::ops::Range<usize> = 157..257;
const MAGIC: std::ops::Range<usize> = 257..263;
const VERSION: std::ops::Range<usize> = 263..265;
const UNAME: std::ops::Range<usize> = 265..297;
const GNAME: std::ops::Range<usize> = 297..329;
const DEVMAJOR: std::ops::Range<usize> = 329..337;
const DEVMINOR: std::ops::Range<usize> = 337..345;
const PREFIX: std::ops::Range<usize> = 345..500;

/// Tar entry type flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Regular,
    HardLink,
    Symlink,
    CharDevice,
    BlockDevice,
    Directory,
    Fifo,
    Contiguous,
    Unknown(u8),
}

impl EntryType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            // Pre-POSIX archives use NUL for regular files
            b'0' | b'\0' => EntryType::Regular,
            b'1' => EntryType::HardLink,
            b'2' => EntryType::Symlink,
            b'3' => EntryType::CharDevice,
            b'4' => EntryType::BlockDevice,
            b'5' => EntryType::Directory,
            b'6' => EntryType::Fifo,
            b'7' => EntryType::Contiguous,
            _ => EntryType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            EntryType::Regular => b'0',
            EntryType::HardLink => b'1',
            EntryType::Symlink => b'2',
            EntryType::CharDevice => b'3',
            EntryType::BlockDevice => b'4',
            EntryType::Directory => b'5',
            EntryType::Fifo => b'6',
            EntryType::Contiguous => b'7',
            EntryType::Unknown(v) => *v,
        }
    }

    /// Single character used in `ls -l` style listings.
    pub fn mode_char(&self) -> char {
        match self {
            EntryType::Directory => 'd',
            EntryType::Symlink => 'l',
            EntryType::HardLink => 'h',
            EntryType::CharDevice => 'c',
            EntryType::BlockDevice => 'b',
            EntryType::Fifo => 'p',
            EntryType::Regular | EntryType::Contiguous => '-',
            EntryType::Unknown(_) => '?',
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryType::Regular => "file",
            EntryType::HardLink => "hard link",
            EntryType::Symlink => "symlink",
            EntryType::CharDevice => "character device",
            EntryType::BlockDevice => "block device",
            EntryType::Directory => "directory",
            EntryType::Fifo => "fifo",
            EntryType::Contiguous => "contiguous file",
            EntryType::Unknown(v) => return write!(f, "unknown type {:#04x}", v),
        };
        f.write_str(name)
    }
}

/// Decoded USTAR header block - 512 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    pub name: String,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub mtime: u64,
    pub checksum: u64,
    pub entry_type: EntryType,
    pub linkname: String,
    pub magic: [u8; 6],
    pub version: [u8; 2],
    pub uname: String,
    pub gname: String,
    pub devmajor: u32,
    pub devminor: u32,
    pub prefix: String,
    /// Raw `name` bytes; lookups compare these, never the lossy `name`.
    pub name_bytes: Vec<u8>,
    pub linkname_bytes: Vec<u8>,
    pub prefix_bytes: Vec<u8>,
}

impl HeaderBlock {
    /// Decode a header from raw bytes.
    ///
    /// Field content never fails decoding; only a block shorter than
    /// [`BLOCK_SIZE`] is rejected.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < BLOCK_SIZE {
            return Err(TarError::Truncated {
                offset: 0,
                expected: BLOCK_SIZE,
                actual: data.len(),
            });
        }

        let mut magic = [0u8; 6];
        magic.copy_from_slice(&data[MAGIC]);
        let mut version = [0u8; 2];
        version.copy_from_slice(&data[VERSION]);

        let name_bytes = parse_bytes(&data[NAME]);
        let linkname_bytes = parse_bytes(&data[LINKNAME]);
        let prefix_bytes = parse_bytes(&data[PREFIX]);

        Ok(Self {
            name: String::from_utf8_lossy(&name_bytes).into_owned(),
            mode: parse_octal(&data[MODE]) as u32,
            uid: parse_octal(&data[UID]) as u32,
            gid: parse_octal(&data[GID]) as u32,
            size: parse_octal(&data[SIZE]),
            mtime: parse_octal(&data[MTIME]),
            checksum: parse_octal(&data[CHECKSUM]),
            entry_type: EntryType::from_u8(data[TYPEFLAG]),
            linkname: String::from_utf8_lossy(&linkname_bytes).into_owned(),
            magic,
            version,
            uname: parse_string(&data[UNAME]),
            gname: parse_string(&data[GNAME]),
            devmajor: parse_octal(&data[DEVMAJOR]) as u32,
            devminor: parse_octal(&data[DEVMINOR]) as u32,
            prefix: String::from_utf8_lossy(&prefix_bytes).into_owned(),
            name_bytes,
            linkname_bytes,
            prefix_bytes,
        })
    }

    pub fn has_valid_magic(&self) -> bool {
        &self.magic == USTAR_MAGIC
    }

    pub fn has_valid_version(&self) -> bool {
        &self.version == USTAR_VERSION
    }

    /// Full entry path as stored, with the USTAR prefix joined on when
    /// present.
    pub fn path_bytes(&self) -> Vec<u8> {
        if self.prefix_bytes.is_empty() {
            self.name_bytes.clone()
        } else {
            [self.prefix_bytes.as_slice(), &b"/"[..], self.name_bytes.as_slice()].concat()
        }
    }

    /// [`path_bytes`](Self::path_bytes) decoded for display. Invalid UTF-8
    /// becomes U+FFFD, so this is not usable as a lookup key.
    pub fn path(&self) -> String {
        String::from_utf8_lossy(&self.path_bytes()).into_owned()
    }

    /// Number of blocks the payload occupies after the header.
    pub fn payload_blocks(&self) -> u64 {
        block_count(self.size)
    }

    /// Permissions rendered like `ls -l`, e.g. `drwxr-xr-x`.
    pub fn mode_string(&self) -> String {
        let mut out = String::with_capacity(10);
        out.push(self.entry_type.mode_char());
        for shift in [6, 3, 0] {
            let bits = (self.mode >> shift) & 0o7;
            out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        out
    }

    /// Parse the modification time to (year, month, day, hour, minute, second) in UTC
    pub fn mod_datetime(&self) -> (i64, u8, u8, u8, u8, u8) {
        let secs = self.mtime as i64;
        let days = secs.div_euclid(86_400);
        let rem = secs.rem_euclid(86_400);
        let hour = (rem / 3600) as u8;
        let minute = (rem % 3600 / 60) as u8;
        let second = (rem % 60) as u8;

        // Days since 1970-01-01 to a proleptic Gregorian date
        let z = days + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z.rem_euclid(146_097);
        let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
        let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
        let year = yoe + era * 400 + i64::from(month <= 2);

        (year, month, day, hour, minute, second)
    }
}

/// A header together with its position in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarEntry {
    pub header: HeaderBlock,
    pub header_offset: u64,
}

impl TarEntry {
    pub fn path(&self) -> String {
        self.header.path()
    }

    pub fn entry_type(&self) -> EntryType {
        self.header.entry_type
    }

    /// Offset of the first payload byte.
    pub fn data_offset(&self) -> u64 {
        self.header_offset + BLOCK_SIZE as u64
    }

    /// Offset of the header that follows this entry.
    pub fn next_offset(&self) -> u64 {
        self.data_offset() + self.header.payload_blocks() * BLOCK_SIZE as u64
    }
}

/// Sum of all header bytes, with the checksum field counted as spaces.
pub fn checksum_of(block: &[u8; BLOCK_SIZE]) -> u64 {
    block
        .iter()
        .enumerate()
        .map(|(i, &b)| if CHECKSUM.contains(&i) { b' ' as u64 } else { b as u64 })
        .sum()
}

/// True if both blocks are entirely zero.
pub fn is_terminator(blocks: &[u8; TERMINATOR_SIZE]) -> bool {
    blocks.iter().all(|&b| b == 0)
}

/// `ceil(size / 512)`
pub fn block_count(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE as u64)
}

/// Parse a NUL or space terminated octal field.
fn parse_octal(field: &[u8]) -> u64 {
    field
        .iter()
        .skip_while(|&&b| b == b' ')
        .take_while(|&&b| (b'0'..=b'7').contains(&b))
        .fold(0u64, |acc, &b| acc.wrapping_mul(8).wrapping_add((b - b'0') as u64))
}

fn parse_bytes(field: &[u8]) -> Vec<u8> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    field[..end].to_vec()
}

fn parse_string(field: &[u8]) -> String {
    String::from_utf8_lossy(&parse_bytes(field)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::HeaderSpec;

    #[test]
    fn octal_fields() {
        assert_eq!(parse_octal(b"0000644\0"), 0o644);
        assert_eq!(parse_octal(b"   755 \0"), 0o755);
        assert_eq!(parse_octal(b"00000000014\0"), 12);
        assert_eq!(parse_octal(b"\0\0\0\0"), 0);
        assert_eq!(parse_octal(b"12x4"), 0o12);
    }

    #[test]
    fn decode_header() {
        let block = HeaderSpec::file("docs/readme.txt", 1234).with_mode(0o640).encode();
        let header = HeaderBlock::from_bytes(&block).unwrap();

        assert_eq!(header.name, "docs/readme.txt");
        assert_eq!(header.size, 1234);
        assert_eq!(header.mode, 0o640);
        assert_eq!(header.entry_type, EntryType::Regular);
        assert!(header.has_valid_magic());
        assert!(header.has_valid_version());
        assert_eq!(header.checksum, checksum_of(&block));
        assert_eq!(header.payload_blocks(), 3);
    }

    #[test]
    fn decode_short_block() {
        let err = HeaderBlock::from_bytes(&[0u8; 100]).unwrap_err();
        assert!(matches!(err, TarError::Truncated { actual: 100, .. }));
    }

    #[test]
    fn checksum_ignores_stored_field() {
        let mut block = HeaderSpec::dir("dir/").encode();
        let before = checksum_of(&block);
        block[CHECKSUM].copy_from_slice(b"9999999\0");
        assert_eq!(checksum_of(&block), before);
        block[0] ^= 1;
        assert_ne!(checksum_of(&block), before);
    }

    #[test]
    fn checksum_of_zero_block() {
        assert_eq!(checksum_of(&[0u8; BLOCK_SIZE]), 8 * b' ' as u64);
    }

    #[test]
    fn terminator() {
        let mut blocks = [0u8; TERMINATOR_SIZE];
        assert!(is_terminator(&blocks));
        blocks[TERMINATOR_SIZE - 1] = 1;
        assert!(!is_terminator(&blocks));
    }

    #[test]
    fn prefix_joins_path() {
        let block = HeaderSpec::file("leaf.txt", 0).with_prefix("deep/tree").encode();
        let header = HeaderBlock::from_bytes(&block).unwrap();
        assert_eq!(header.path(), "deep/tree/leaf.txt");
        assert_eq!(header.path_bytes(), b"deep/tree/leaf.txt");
    }

    #[test]
    fn non_utf8_name_keeps_its_bytes() {
        let block = HeaderSpec::file("", 0).with_name_bytes(b"caf\xe9").encode();
        let header = HeaderBlock::from_bytes(&block).unwrap();
        assert_eq!(header.name_bytes, b"caf\xe9");
        assert_eq!(header.path_bytes(), b"caf\xe9");
        assert_eq!(header.path(), "caf\u{FFFD}");
    }

    #[test]
    fn entry_offsets() {
        let block = HeaderSpec::file("a", 513).encode();
        let entry = TarEntry {
            header: HeaderBlock::from_bytes(&block).unwrap(),
            header_offset: 1024,
        };
        assert_eq!(entry.data_offset(), 1536);
        assert_eq!(entry.next_offset(), 1536 + 1024);
    }

    #[test]
    fn mode_string() {
        let block = HeaderSpec::dir("d/").encode();
        assert_eq!(HeaderBlock::from_bytes(&block).unwrap().mode_string(), "drwxr-xr-x");
        let block = HeaderSpec::file("f", 0).with_mode(0o640).encode();
        assert_eq!(HeaderBlock::from_bytes(&block).unwrap().mode_string(), "-rw-r-----");
    }

    #[test]
    fn mod_datetime() {
        let mut header = HeaderBlock::from_bytes(&HeaderSpec::file("f", 0).encode()).unwrap();
        header.mtime = 0;
        assert_eq!(header.mod_datetime(), (1970, 1, 1, 0, 0, 0));
        header.mtime = 1_000_000_000;
        assert_eq!(header.mod_datetime(), (2001, 9, 9, 1, 46, 40));
        header.mtime = 951_782_400;
        assert_eq!(header.mod_datetime(), (2000, 2, 29, 0, 0, 0));
    }

    #[test]
    fn entry_type_flags() {
        assert_eq!(EntryType::from_u8(b'\0'), EntryType::Regular);
        assert_eq!(EntryType::from_u8(b'5'), EntryType::Directory);
        assert_eq!(EntryType::from_u8(b'x'), EntryType::Unknown(b'x'));
        assert_eq!(EntryType::Symlink.as_u8(), b'2');
    }
}
