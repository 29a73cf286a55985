use std::path::PathBuf;
use std::process;

use clap::Args;

use super::{compile_file, resolve_target};

#[derive(Args)]
pub struct CheckArgs {
    /// Input .tir file
    pub input: PathBuf,
    /// Target: cuda, sm_XX, or a targets/<name>.toml config
    #[arg(long, default_value = "cuda")]
    pub target: String,
}

pub fn cmd_check(args: CheckArgs) {
    let CheckArgs { input, target } = args;
    let target = resolve_target(&target);

    match compile_file(&input, &target) {
        Ok(_) => eprintln!("OK: {}", input.display()),
        Err(_) => process::exit(1),
    }
}
