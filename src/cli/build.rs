use std::path::PathBuf;
use std::process;

use clap::Args;
use rayon::prelude::*;
use tracing::info;

use super::{default_output, lower_file, resolve_target, Lowered};

#[derive(Args)]
pub struct BuildArgs {
    /// Input .tir files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
    /// Output file (default: <input>.cu); only with a single input
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Target: cuda, sm_XX, or a targets/<name>.toml config
    #[arg(long, default_value = "cuda")]
    pub target: String,
}

pub fn cmd_build(args: BuildArgs) {
    let BuildArgs {
        inputs,
        output,
        target,
    } = args;
    if output.is_some() && inputs.len() > 1 {
        eprintln!("error: --output needs exactly one input, got {}", inputs.len());
        process::exit(1);
    }
    let target = resolve_target(&target);

    // Lower in parallel; report and write in input order so diagnostics
    // from different files never interleave.
    let lowered: Vec<Lowered> = inputs
        .par_iter()
        .map(|input| lower_file(input, &target))
        .collect();

    let mut failures = 0;
    for (input, lowered) in inputs.iter().zip(&lowered) {
        lowered.report(input);
        let Ok(cuda) = &lowered.result else {
            failures += 1;
            continue;
        };
        let out_path = output
            .clone()
            .unwrap_or_else(|| default_output(input, &target));
        if let Err(e) = std::fs::write(&out_path, &cuda.code) {
            eprintln!("error: cannot write '{}': {}", out_path.display(), e);
            failures += 1;
            continue;
        }
        info!(
            input = %input.display(),
            output = %out_path.display(),
            fingerprint = %cuda.short_fingerprint(),
            "wrote translation unit"
        );
        eprintln!("Compiled -> {}", out_path.display());
    }

    if failures > 0 {
        eprintln!("error: {} of {} inputs failed", failures, inputs.len());
        process::exit(1);
    }
}
