//! Translation between host I/O failures and the negative errno values FUSE expects.

use std::io;

/// Map an [`io::Error`] from a host filesystem call to the raw errno FUSE wants.
///
/// Most `std`/`nix` I/O errors carry the originating `errno` already; the few that
/// don't (synthesized `ErrorKind`s with no OS code behind them) fall back to `EIO`,
/// matching the catch-all the teacher's passthrough examples use for the same case.
pub fn errno_of(err: &io::Error) -> i32 {
    err.raw_os_error().unwrap_or(libc::EIO)
}

/// Map a [`nix::Error`] to the raw errno FUSE wants.
pub fn errno_of_nix(err: nix::Error) -> i32 {
    err as i32
}
