//! Shared engine for a family of FUSE overlay filesystems (§1-§2).
//!
//! The binaries in `overlayfs-bin` each wire one [`Variant`] of [`OverlayFs`] to
//! `fuser::mount2`; everything below this crate root is transport-agnostic and is
//! exercised directly by the tests under `tests/engine.rs` without a real mount.

pub mod attr;
pub mod cipher;
pub mod cli;
pub mod errors;
pub mod filesystem;
pub mod history;
pub mod inode_table;
pub mod path_mapper;
pub mod reaper;
pub mod snapshot;
pub mod variant;
pub mod version_registry;

pub use filesystem::OverlayFs;
pub use variant::Variant;
