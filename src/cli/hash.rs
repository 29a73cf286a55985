use std::path::PathBuf;
use std::process;

use clap::Args;

use super::{compile_file, resolve_target};

#[derive(Args)]
pub struct HashArgs {
    /// Input .tir file
    pub input: PathBuf,
    /// Target: cuda, sm_XX, or a targets/<name>.toml config
    #[arg(long, default_value = "cuda")]
    pub target: String,
    /// Print the full 64-digit hash
    #[arg(long)]
    pub full: bool,
}

/// Fingerprint of the emitted source, not of the `.tir` text: the same
/// input hashes differently per target.
pub fn cmd_hash(args: HashArgs) {
    let HashArgs {
        input,
        target,
        full,
    } = args;
    let target = resolve_target(&target);

    let cuda = match compile_file(&input, &target) {
        Ok(c) => c,
        Err(_) => process::exit(1),
    };
    if full {
        println!("{} {}", cuda.fingerprint, input.display());
    } else {
        println!("{} {}", cuda.short_fingerprint(), input.display());
    }
}
