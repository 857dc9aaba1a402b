//! Symbolic link resolution.
//!
//! Link targets are taken as archive paths, verbatim. Resolution is a
//! single hop: callers re-run their lookup once against the returned path
//! and take whatever they find there literally, even another symlink.

use log::debug;

use super::structures::{EntryType, TarEntry};

/// How the caller will use the resolved path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkUse {
    /// Exact lookup of a file.
    File,
    /// Prefix match for a directory listing; needs a trailing `/`.
    Directory,
}

/// Turn a symlink entry into the path to look up next.
///
/// Returns `None` if `entry` is not a symlink or its target is empty.
pub fn resolve(entry: &TarEntry, usage: LinkUse) -> Option<Vec<u8>> {
    if entry.entry_type() != EntryType::Symlink {
        return None;
    }

    let mut target = entry.header.linkname_bytes.clone();
    if target.is_empty() {
        debug!("{} has no target", entry.path());
        return None;
    }
    if usage == LinkUse::Directory && !target.ends_with(b"/") {
        target.push(b'/');
    }
    debug!("{} -> {}", entry.path(), String::from_utf8_lossy(&target));
    Some(target)
}
