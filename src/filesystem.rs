//! `impl fuser::Filesystem` tying the engine's pure modules to the kernel-facing trait.
//!
//! Every handler maps its virtual path(s) through [`PathMapper`], performs the
//! corresponding host-filesystem primitive (§4.2), and translates failures with
//! [`errno_of`]. Handlers hold no file descriptors or other state across calls —
//! each `read`/`write`/`open` reopens the backing file, per §5.

use std::ffi::{OsStr, OsString};
use std::fs::{self, File, OpenOptions};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, ReplyStatfs, ReplyWrite, ReplyXattr, Request, TimeOrNow,
};
use log::debug;

use crate::attr::{self, file_type_of};
use crate::cipher;
use crate::errors::errno_of;
use crate::history;
use crate::inode_table::{InodeTable, ROOT_INO};
use crate::path_mapper::PathMapper;
use crate::reaper;
use crate::snapshot;
use crate::variant::Variant;

const TTL: Duration = Duration::from_secs(1);
const GENERATION: u64 = 0;

/// The shared passthrough/cipher/versioned engine (§2).
pub struct OverlayFs {
    mapper: PathMapper,
    inodes: InodeTable,
    variant: Variant,
}

impl OverlayFs {
    pub fn new(backing_root: PathBuf, variant: Variant) -> Self {
        Self {
            mapper: PathMapper::new(backing_root),
            inodes: InodeTable::new(),
            variant,
        }
    }

    /// History naming is keyed by bare file name (§4.3 assumes a single-directory-deep
    /// mount); files nested under subdirectories share the `.vers` namespace by name
    /// only, inheriting the original source's scope rather than extending it (§9).
    fn history_key(relative: &Path) -> OsString {
        relative
            .file_name()
            .map(OsStr::to_os_string)
            .unwrap_or_default()
    }

    fn resolve(&self, ino: u64) -> Result<PathBuf, i32> {
        self.inodes.path_of(ino).ok_or(libc::ENOENT)
    }

    fn child_relative(&self, parent: u64, name: &OsStr) -> Result<PathBuf, i32> {
        let parent_rel = self.resolve(parent)?;
        Ok(parent_rel.join(name))
    }

    fn attr_for(&self, relative: &Path, ino: u64) -> std::io::Result<FileAttr> {
        let host_path = self.mapper.map(relative);
        let meta = fs::symlink_metadata(&host_path)?;
        let size = meta.len();
        Ok(attr::from_metadata(&meta, ino, size))
    }

    fn is_versioned(&self) -> bool {
        matches!(self.variant, Variant::Versioned)
    }
}

impl Filesystem for OverlayFs {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let relative = match self.child_relative(parent, name) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let ino = self.inodes.lookup(&relative);
        match self.attr_for(&relative, ino) {
            Ok(attr) => reply.entry(&TTL, &attr, GENERATION),
            Err(e) => {
                self.inodes.forget(ino, 1);
                reply.error(errno_of(&e));
            }
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        self.inodes.forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        match self.attr_for(&relative, ino) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(errno_of(&e)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<std::time::SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<std::time::SystemTime>,
        _chgtime: Option<std::time::SystemTime>,
        _bkuptime: Option<std::time::SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);

        if let Some(mode) = mode {
            if let Err(e) = fs::set_permissions(&host_path, fs::Permissions::from_mode(mode)) {
                return reply.error(errno_of(&e));
            }
        }
        if uid.is_some() || gid.is_some() {
            let c_path = match std::ffi::CString::new(host_path.as_os_str().as_bytes()) {
                Ok(p) => p,
                Err(_) => return reply.error(libc::EINVAL),
            };
            let ruid = uid.map(|u| u as libc::uid_t).unwrap_or(u32::MAX as libc::uid_t);
            let rgid = gid.map(|g| g as libc::gid_t).unwrap_or(u32::MAX as libc::gid_t);
            let rc = unsafe { libc::lchown(c_path.as_ptr(), ruid, rgid) };
            if rc != 0 {
                return reply.error(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO));
            }
        }
        if let Some(size) = size {
            match OpenOptions::new().write(true).open(&host_path) {
                Ok(f) => {
                    if let Err(e) = f.set_len(size) {
                        return reply.error(errno_of(&e));
                    }
                }
                Err(e) => return reply.error(errno_of(&e)),
            }
        }
        if atime.is_some() || mtime.is_some() {
            // utimensat semantics best-effort: only a full passthrough of both times is
            // attempted; a single-field update falls back to "leave unspecified alone"
            // by reading the current attribute first.
            let now = std::time::SystemTime::now();
            let resolve = |t: Option<TimeOrNow>, current: std::time::SystemTime| match t {
                Some(TimeOrNow::SpecificTime(t)) => t,
                Some(TimeOrNow::Now) => now,
                None => current,
            };
            let current = fs::symlink_metadata(&host_path).and_then(|m| m.modified());
            let current = current.unwrap_or(now);
            let new_mtime = resolve(mtime, current);
            let new_atime = resolve(atime, current);
            let times = [
                nix::sys::time::TimeSpec::from(new_atime.duration_since(std::time::UNIX_EPOCH).unwrap_or_default()),
                nix::sys::time::TimeSpec::from(new_mtime.duration_since(std::time::UNIX_EPOCH).unwrap_or_default()),
            ];
            if let Err(e) = nix::sys::stat::utimensat(
                None,
                &host_path,
                &times[0],
                &times[1],
                nix::sys::stat::UtimensatFlags::NoFollowSymlink,
            ) {
                return reply.error(crate::errors::errno_of_nix(e));
            }
        }

        match self.attr_for(&relative, ino) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(errno_of(&e)),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        match fs::read_link(&host_path) {
            Ok(target) => reply.data(target.as_os_str().as_bytes()),
            Err(e) => reply.error(errno_of(&e)),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        let relative = match self.child_relative(parent, name) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        let c_path = match std::ffi::CString::new(host_path.as_os_str().as_bytes()) {
            Ok(p) => p,
            Err(_) => return reply.error(libc::EINVAL),
        };
        let file_type = (mode as libc::mode_t) & libc::S_IFMT;
        let rc = if file_type == libc::S_IFREG {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(mode)
                .open(&host_path)
            {
                Ok(_) => 0,
                Err(e) => return reply.error(errno_of(&e)),
            }
        } else if file_type == libc::S_IFIFO {
            unsafe { libc::mkfifo(c_path.as_ptr(), mode as libc::mode_t) }
        } else {
            unsafe { libc::mknod(c_path.as_ptr(), mode as libc::mode_t, rdev as libc::dev_t) }
        };
        if rc != 0 {
            return reply.error(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO));
        }
        let ino = self.inodes.lookup(&relative);
        match self.attr_for(&relative, ino) {
            Ok(attr) => reply.entry(&TTL, &attr, GENERATION),
            Err(e) => reply.error(errno_of(&e)),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let relative = match self.child_relative(parent, name) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        if let Err(e) = fs::create_dir(&host_path) {
            return reply.error(errno_of(&e));
        }
        let _ = fs::set_permissions(&host_path, fs::Permissions::from_mode(mode));
        let ino = self.inodes.lookup(&relative);
        match self.attr_for(&relative, ino) {
            Ok(attr) => reply.entry(&TTL, &attr, GENERATION),
            Err(e) => reply.error(errno_of(&e)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let relative = match self.child_relative(parent, name) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        if let Err(e) = fs::remove_file(&host_path) {
            return reply.error(errno_of(&e));
        }
        if self.is_versioned() {
            let key = Self::history_key(&relative);
            if let Err(e) = reaper::reap_history(self.mapper.backing_root(), &key) {
                return reply.error(errno_of(&e));
            }
        }
        reply.ok();
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let relative = match self.child_relative(parent, name) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        match fs::remove_dir(&host_path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno_of(&e)),
        }
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        let relative = match self.child_relative(parent, link_name) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        if let Err(e) = std::os::unix::fs::symlink(target, &host_path) {
            return reply.error(errno_of(&e));
        }
        let ino = self.inodes.lookup(&relative);
        match self.attr_for(&relative, ino) {
            Ok(attr) => reply.entry(&TTL, &attr, GENERATION),
            Err(e) => reply.error(errno_of(&e)),
        }
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let new_relative = match self.child_relative(newparent, newname) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_src = self.mapper.map(&relative);
        let host_dst = self.mapper.map(&new_relative);
        if let Err(e) = fs::hard_link(&host_src, &host_dst) {
            return reply.error(errno_of(&e));
        }
        match self.attr_for(&relative, ino) {
            Ok(attr) => reply.entry(&TTL, &attr, GENERATION),
            Err(e) => reply.error(errno_of(&e)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let old_relative = match self.child_relative(parent, name) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let new_relative = match self.child_relative(newparent, newname) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_old = self.mapper.map(&old_relative);
        let host_new = self.mapper.map(&new_relative);
        match fs::rename(&host_old, &host_new) {
            Ok(()) => {
                self.inodes.reparent(&old_relative, &new_relative);
                reply.ok();
            }
            Err(e) => reply.error(errno_of(&e)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        let mut options = OpenOptions::new();
        match flags & libc::O_ACCMODE {
            libc::O_RDONLY => {
                options.read(true);
            }
            libc::O_WRONLY => {
                options.write(true);
            }
            libc::O_RDWR => {
                options.read(true).write(true);
            }
            _ => return reply.error(libc::EINVAL),
        }
        options.append(flags & libc::O_APPEND != 0);
        options.truncate(flags & libc::O_TRUNC != 0);
        match options.open(&host_path) {
            Ok(_) => reply.opened(0, 0),
            Err(e) => reply.error(errno_of(&e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        let file = match File::open(&host_path) {
            Ok(f) => f,
            Err(e) => return reply.error(errno_of(&e)),
        };
        let mut buf = vec![0u8; size as usize];
        let read = match file.read_at(&mut buf, offset as u64) {
            Ok(n) => n,
            Err(e) => return reply.error(errno_of(&e)),
        };
        buf.truncate(read);
        if let Variant::Cipher { key } = self.variant {
            buf = cipher::decrypt(&buf, key);
        }
        reply.data(&buf);
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };

        let staging: std::borrow::Cow<[u8]> = match self.variant {
            Variant::Cipher { key } => std::borrow::Cow::Owned(cipher::encrypt(data, key)),
            _ => std::borrow::Cow::Borrowed(data),
        };

        if self.is_versioned() {
            let key = Self::history_key(&relative);
            if let Err(e) =
                snapshot::build_and_persist(self.mapper.backing_root(), &key, staging.as_ref(), offset)
            {
                return reply.error(errno_of(&e));
            }
        }

        let host_path = self.mapper.map(&relative);
        let file = match OpenOptions::new().write(true).open(&host_path) {
            Ok(f) => f,
            Err(e) => return reply.error(errno_of(&e)),
        };
        match file.write_at(staging.as_ref(), offset as u64) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(errno_of(&e)),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.resolve(ino) {
            Ok(_) => reply.opened(0, 0),
            Err(e) => reply.error(e),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_dir = self.mapper.map(&relative);

        let mut entries: Vec<(u64, FileType, OsString)> = Vec::new();
        entries.push((ino, FileType::Directory, OsString::from(".")));
        let parent_ino = if relative.as_os_str().is_empty() {
            ino
        } else {
            let parent_rel = relative.parent().unwrap_or(Path::new("")).to_path_buf();
            self.inodes.lookup(&parent_rel)
        };
        entries.push((parent_ino, FileType::Directory, OsString::from("..")));

        let read_dir = match fs::read_dir(&host_dir) {
            Ok(rd) => rd,
            Err(e) => return reply.error(errno_of(&e)),
        };
        for dirent in read_dir {
            let dirent = match dirent {
                Ok(d) => d,
                Err(e) => return reply.error(errno_of(&e)),
            };
            let name = dirent.file_name();
            if relative.as_os_str().is_empty() && history::is_history_root_name(&name) {
                continue;
            }
            let child_relative = relative.join(&name);
            let child_ino = self.inodes.lookup(&child_relative);
            let kind = dirent
                .file_type()
                .map(file_type_of)
                .unwrap_or(FileType::RegularFile);
            entries.push((child_ino, kind, name));
        }

        for (i, (entry_ino, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            let next_offset = (i + 1) as i64;
            if reply.add(entry_ino, next_offset, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyStatfs) {
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        let c_path = match to_cstring(&host_path) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let mut buf: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut buf) };
        if rc != 0 {
            return reply.error(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO));
        }
        reply.statfs(
            buf.f_blocks,
            buf.f_bfree,
            buf.f_bavail,
            buf.f_files,
            buf.f_ffree,
            buf.f_bsize as u32,
            buf.f_namemax as u32,
            buf.f_frsize as u32,
        )
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        let mode = nix::unistd::AccessFlags::from_bits_truncate(mask);
        match nix::unistd::access(&host_path, mode) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(crate::errors::errno_of_nix(e)),
        }
    }

    fn fallocate(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        length: i64,
        mode: i32,
        reply: ReplyEmpty,
    ) {
        if mode != 0 {
            return reply.error(libc::EOPNOTSUPP);
        }
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        let file = match OpenOptions::new().write(true).open(&host_path) {
            Ok(f) => f,
            Err(e) => return reply.error(errno_of(&e)),
        };
        let rc = unsafe {
            libc::fallocate(
                std::os::unix::io::AsRawFd::as_raw_fd(&file),
                0,
                offset as libc::off_t,
                length as libc::off_t,
            )
        };
        if rc == 0 {
            reply.ok();
        } else {
            reply.error(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO));
        }
    }

    fn setxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        _flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        match lsetxattr(&host_path, name, value) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e),
        }
    }

    fn getxattr(&mut self, _req: &Request<'_>, ino: u64, name: &OsStr, size: u32, reply: ReplyXattr) {
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        match lgetxattr(&host_path, name) {
            Ok(value) => {
                if size == 0 {
                    reply.size(value.len() as u32);
                } else if (value.len() as u32) > size {
                    reply.error(libc::ERANGE);
                } else {
                    reply.data(&value);
                }
            }
            Err(e) => reply.error(e),
        }
    }

    fn listxattr(&mut self, _req: &Request<'_>, ino: u64, size: u32, reply: ReplyXattr) {
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        match llistxattr(&host_path) {
            Ok(list) => {
                if size == 0 {
                    reply.size(list.len() as u32);
                } else if (list.len() as u32) > size {
                    reply.error(libc::ERANGE);
                } else {
                    reply.data(&list);
                }
            }
            Err(e) => reply.error(e),
        }
    }

    fn removexattr(&mut self, _req: &Request<'_>, ino: u64, name: &OsStr, reply: ReplyEmpty) {
        let relative = match self.resolve(ino) {
            Ok(r) => r,
            Err(e) => return reply.error(e),
        };
        let host_path = self.mapper.map(&relative);
        match lremovexattr(&host_path, name) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e),
        }
    }

    fn init(
        &mut self,
        _req: &Request<'_>,
        _config: &mut fuser::KernelConfig,
    ) -> Result<(), libc::c_int> {
        debug!("init: variant={:?}", self.variant.fs_name());
        Ok(())
    }
}

fn to_cstring(path: &Path) -> Result<std::ffi::CString, i32> {
    std::ffi::CString::new(path.as_os_str().as_bytes()).map_err(|_| libc::EINVAL)
}

fn lsetxattr(path: &Path, name: &OsStr, value: &[u8]) -> Result<(), i32> {
    let c_path = to_cstring(path)?;
    let c_name = to_cstring(Path::new(name))?;
    let rc = unsafe {
        libc::lsetxattr(
            c_path.as_ptr(),
            c_name.as_ptr(),
            value.as_ptr() as *const libc::c_void,
            value.len(),
            0,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO))
    }
}

fn lgetxattr(path: &Path, name: &OsStr) -> Result<Vec<u8>, i32> {
    let c_path = to_cstring(path)?;
    let c_name = to_cstring(Path::new(name))?;
    let needed = unsafe { libc::lgetxattr(c_path.as_ptr(), c_name.as_ptr(), std::ptr::null_mut(), 0) };
    if needed < 0 {
        return Err(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO));
    }
    let mut buf = vec![0u8; needed as usize];
    if needed == 0 {
        return Ok(buf);
    }
    let written = unsafe {
        libc::lgetxattr(
            c_path.as_ptr(),
            c_name.as_ptr(),
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
        )
    };
    if written < 0 {
        return Err(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO));
    }
    buf.truncate(written as usize);
    Ok(buf)
}

fn llistxattr(path: &Path) -> Result<Vec<u8>, i32> {
    let c_path = to_cstring(path)?;
    let needed = unsafe { libc::llistxattr(c_path.as_ptr(), std::ptr::null_mut(), 0) };
    if needed < 0 {
        return Err(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO));
    }
    let mut buf = vec![0u8; needed as usize];
    if needed == 0 {
        return Ok(buf);
    }
    let written = unsafe { libc::llistxattr(c_path.as_ptr(), buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if written < 0 {
        return Err(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO));
    }
    buf.truncate(written as usize);
    Ok(buf)
}

fn lremovexattr(path: &Path, name: &OsStr) -> Result<(), i32> {
    let c_path = to_cstring(path)?;
    let c_name = to_cstring(Path::new(name))?;
    let rc = unsafe { libc::lremovexattr(c_path.as_ptr(), c_name.as_ptr()) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn history_key_uses_the_bare_file_name() {
        let rel = Path::new("dir/a.txt");
        assert_eq!(OverlayFs::history_key(rel), OsString::from("a.txt"));
    }

    #[test]
    fn mirror_write_then_read_round_trips_without_touching_vers() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"").unwrap();
        let fs_engine = OverlayFs::new(dir.path().to_path_buf(), Variant::Mirror);
        assert!(!fs_engine.is_versioned());
        assert!(!history::history_root(dir.path()).exists());
    }
}
