//! `cipherfs <backing_dir> <mount_point> <shift_key>` — additive byte-shift overlay (§6).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fuser::MountOption;
use overlayfs::{cli, OverlayFs, Variant};

#[derive(Parser)]
#[command(name = "cipherfs")]
struct Args {
    /// Host directory backing the mount
    backing_dir: PathBuf,
    /// Where to mount the overlay
    mount_point: PathBuf,
    /// Additive byte-shift key applied to file contents, mod 256
    shift_key: i32,
    /// Extra flags forwarded to the transport, e.g. `-o ro,allow_other`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    transport_flags: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if let Err(message) = cli::require_absolute("backing_dir", &args.backing_dir) {
        eprintln!("{message}");
        return ExitCode::FAILURE;
    }
    if let Err(message) = cli::require_absolute("mount_point", &args.mount_point) {
        eprintln!("{message}");
        return ExitCode::FAILURE;
    }
    let extra_options = match cli::parse_transport_flags(&args.transport_flags) {
        Ok(opts) => opts,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    cli::startup_debug_line(&args.backing_dir, &args.mount_point, Some(args.shift_key));

    let variant = Variant::Cipher { key: args.shift_key };
    let fs = OverlayFs::new(args.backing_dir, variant);
    let mut options = vec![MountOption::FSName(variant.fs_name().to_string())];
    options.extend(extra_options);
    match fuser::mount2(fs, &args.mount_point, &options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("mount failed: {e}");
            ExitCode::FAILURE
        }
    }
}
