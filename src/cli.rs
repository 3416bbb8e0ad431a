//! Shared startup plumbing for the three `overlayfs-bin` binaries (§6, §7).
//!
//! Grounded on `examples/common/args.rs`'s `CommonArgs`: a small struct of flags the
//! transport consumes, kept in the library so each binary's `main` stays a few lines.

use std::path::Path;

use fuser::MountOption;

/// Reject a non-absolute path the way §6 requires: caller prints the message to
/// stderr and exits with status 1.
pub fn require_absolute(label: &str, path: &Path) -> Result<(), String> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(format!("error: {label} must be an absolute path, got {path:?}"))
    }
}

/// The single startup debug line every variant emits on stderr once arguments are
/// validated and before the mount call (§6).
pub fn startup_debug_line(backing: &Path, mount: &Path, key: Option<i32>) {
    match key {
        Some(k) => eprintln!("DEBUG: Mounting {backing:?} at {mount:?} using key {k}"),
        None => eprintln!("DEBUG: Mounting {backing:?} at {mount:?}"),
    }
}

/// Parses trailing `[transport-flags…]` (§6) into `MountOption`s, following the
/// `-o name[,name…]` convention `examples/cberner-fuser/src/mnt/mount_options.rs`'s
/// `parse_options_from_args` implements: `"-o", "ro,nodev"` and `"-oro,nodev"` are
/// both accepted, and each comma-separated piece is matched the way that module's
/// `MountOption::from_str` does, with an unrecognized name forwarded as `CUSTOM`
/// rather than rejected.
pub fn parse_transport_flags(args: &[String]) -> Result<Vec<MountOption>, String> {
    let mut out = Vec::new();
    let mut it = args.iter();
    loop {
        let opt = match it.next() {
            None => break,
            Some(x) if x == "-o" => it
                .next()
                .ok_or_else(|| "error: -o requires an argument".to_string())?
                .as_str(),
            Some(x) if x.starts_with("-o") => &x[2..],
            Some(x) => return Err(format!("error: unrecognized transport flag {x:?}")),
        };
        for piece in opt.split(',') {
            out.push(parse_mount_option(piece));
        }
    }
    Ok(out)
}

fn parse_mount_option(name: &str) -> MountOption {
    match name {
        "allow_other" => MountOption::AllowOther,
        "allow_root" => MountOption::AllowRoot,
        "auto_unmount" => MountOption::AutoUnmount,
        "default_permissions" => MountOption::DefaultPermissions,
        "dev" => MountOption::Dev,
        "nodev" => MountOption::NoDev,
        "suid" => MountOption::Suid,
        "nosuid" => MountOption::NoSuid,
        "ro" => MountOption::RO,
        "rw" => MountOption::RW,
        "exec" => MountOption::Exec,
        "noexec" => MountOption::NoExec,
        "atime" => MountOption::Atime,
        "noatime" => MountOption::NoAtime,
        "dirsync" => MountOption::DirSync,
        "sync" => MountOption::Sync,
        "async" => MountOption::Async,
        x if x.starts_with("fsname=") => MountOption::FSName(x[7..].to_string()),
        x if x.starts_with("subtype=") => MountOption::Subtype(x[8..].to_string()),
        x => MountOption::CUSTOM(x.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn absolute_path_is_accepted() {
        assert!(require_absolute("backing_dir", &PathBuf::from("/srv/backing")).is_ok());
    }

    #[test]
    fn relative_path_is_rejected() {
        assert!(require_absolute("mount_point", &PathBuf::from("relative/mnt")).is_err());
    }

    #[test]
    fn transport_flags_accept_separate_and_joined_dash_o() {
        let args = vec!["-o".to_string(), "ro,nodev".to_string(), "-osync".to_string()];
        let parsed = parse_transport_flags(&args).unwrap();
        assert_eq!(
            parsed,
            vec![MountOption::RO, MountOption::NoDev, MountOption::Sync]
        );
    }

    #[test]
    fn unknown_option_name_becomes_custom() {
        let args = vec!["-o".to_string(), "direct_io".to_string()];
        let parsed = parse_transport_flags(&args).unwrap();
        assert_eq!(parsed, vec![MountOption::CUSTOM("direct_io".to_string())]);
    }

    #[test]
    fn missing_value_after_dash_o_is_an_error() {
        let args = vec!["-o".to_string()];
        assert!(parse_transport_flags(&args).is_err());
    }

    #[test]
    fn a_token_not_shaped_like_dash_o_is_rejected() {
        let args = vec!["bogus".to_string()];
        assert!(parse_transport_flags(&args).is_err());
    }
}
