pub mod build;
pub mod check;
pub mod hash;
pub mod spell;

use std::path::{Path, PathBuf};
use std::process;

use cudagen::diagnostic::{render_diagnostics, Diagnostic};
use cudagen::CudaTarget;

/// Resolve `--target` or exit.
pub fn resolve_target(name: &str) -> CudaTarget {
    match CudaTarget::resolve(name) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {}", e.message);
            if let Some(help) = &e.help {
                eprintln!("  help: {}", help);
            }
            process::exit(1);
        }
    }
}

/// Reject anything that is not a `.tir` file.
pub fn check_input(input: &Path) {
    if !input.extension().is_some_and(|e| e == "tir") {
        eprintln!("error: input must be a .tir file: '{}'", input.display());
        process::exit(1);
    }
}

/// Read a `.tir` file, exiting with a message on failure.
pub fn read_input(input: &Path) -> String {
    check_input(input);
    match std::fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", input.display(), e);
            process::exit(1);
        }
    }
}

/// A lowered input together with the text its diagnostics point into.
pub struct Lowered {
    pub source: String,
    pub result: Result<cudagen::CudaSource, Vec<Diagnostic>>,
}

impl Lowered {
    /// Render any diagnostics against the input text.
    pub fn report(&self, input: &Path) {
        if let Err(errors) = &self.result {
            render_diagnostics(errors, &input.to_string_lossy(), &self.source);
        }
    }
}

/// Parse and lower one file without rendering.
pub fn lower_file(input: &Path, target: &CudaTarget) -> Lowered {
    let source = read_input(input);
    let result = cudagen::compile_source_silent(&source, &input.to_string_lossy(), target);
    Lowered { source, result }
}

/// Parse and lower one file, rendering diagnostics against its text.
pub fn compile_file(input: &Path, target: &CudaTarget) -> Result<cudagen::CudaSource, Vec<Diagnostic>> {
    let lowered = lower_file(input, target);
    lowered.report(input);
    lowered.result
}

/// `<stem>.<ext>` next to the input.
pub fn default_output(input: &Path, target: &CudaTarget) -> PathBuf {
    input.with_extension(target.output_extension.trim_start_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_replaces_extension() {
        let target = CudaTarget::sm(80);
        let out = default_output(Path::new("kernels/gemm.tir"), &target);
        assert_eq!(out, PathBuf::from("kernels/gemm.cu"));
    }
}
