//! Converts `std::fs::Metadata` from the backing store into a `fuser::FileAttr`.
//!
//! Grounded on `xmp.rs`'s `ft2ft`/`meta2attr` helpers: this filesystem reports the
//! backing file's real metadata unchanged except for `size`, which the Versioned and
//! Cipher variants may need to adjust for their own reasons (callers pass the size they
//! want reported; this module never re-derives it).

use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::time::{Duration, UNIX_EPOCH};

use fuser::{FileAttr, FileType};

pub(crate) fn file_type_of(t: std::fs::FileType) -> FileType {
    match t {
        t if t.is_symlink() => FileType::Symlink,
        t if t.is_dir() => FileType::Directory,
        t if t.is_fifo() => FileType::NamedPipe,
        t if t.is_char_device() => FileType::CharDevice,
        t if t.is_block_device() => FileType::BlockDevice,
        t if t.is_socket() => FileType::Socket,
        _ => FileType::RegularFile,
    }
}

/// Build a `FileAttr` for `ino` from the backing file's metadata, reporting `size`
/// bytes of content (which may differ from `meta.len()`, e.g. for a Cipher file the
/// two always agree, but callers are free to override for any variant that doesn't).
pub fn from_metadata(meta: &std::fs::Metadata, ino: u64, size: u64) -> FileAttr {
    let blksize = meta.blksize().max(512) as u32;
    FileAttr {
        ino,
        size,
        blocks: size.div_ceil(512),
        atime: meta.accessed().unwrap_or(UNIX_EPOCH),
        mtime: meta.modified().unwrap_or(UNIX_EPOCH),
        ctime: UNIX_EPOCH + Duration::from_secs(meta.ctime().max(0) as u64),
        crtime: meta.created().unwrap_or(UNIX_EPOCH),
        kind: file_type_of(meta.file_type()),
        perm: meta.permissions().mode() as u16,
        nlink: meta.nlink() as u32,
        uid: meta.uid(),
        gid: meta.gid(),
        rdev: meta.rdev() as u32,
        flags: 0,
        blksize,
    }
}
