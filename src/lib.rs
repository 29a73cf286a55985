pub mod codegen;
pub mod config;
pub mod diagnostic;
pub mod ir;
pub mod span;
pub mod syntax;

pub use codegen::cuda::{CudaCodegen, Features};
pub use config::target::CudaTarget;

use diagnostic::{render_diagnostics, Diagnostic};
use ir::Module;

/// Emitted CUDA translation unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CudaSource {
    /// Complete `.cu` text: feature prologue, declarations, kernels.
    pub code: String,
    /// BLAKE3 hash of `code` in hex; stable across runs for the same
    /// input and target.
    pub fingerprint: String,
}

impl CudaSource {
    fn new(code: String) -> Self {
        let fingerprint = blake3::hash(code.as_bytes()).to_hex().to_string();
        Self { code, fingerprint }
    }

    /// First 16 hex digits of the fingerprint.
    pub fn short_fingerprint(&self) -> &str {
        &self.fingerprint[..16]
    }
}

/// Lower every kernel of `module`, in order, into one translation unit.
pub fn lower_module(module: &Module, target: &CudaTarget) -> Result<CudaSource, Diagnostic> {
    let mut cg = CudaCodegen::new(target.clone());
    for kernel in &module.kernels {
        cg.add_function(kernel)?;
    }
    Ok(CudaSource::new(cg.finish()))
}

/// Parse `.tir` text and lower it, rendering any diagnostics to stderr.
pub fn compile_source(
    source: &str,
    filename: &str,
    target: &CudaTarget,
) -> Result<CudaSource, Vec<Diagnostic>> {
    let result = compile_source_silent(source, filename, target);
    if let Err(errors) = &result {
        render_diagnostics(errors, filename, source);
    }
    result
}

/// Parse and lower without rendering; for tooling and tests.
pub fn compile_source_silent(
    source: &str,
    _filename: &str,
    target: &CudaTarget,
) -> Result<CudaSource, Vec<Diagnostic>> {
    let module = syntax::parse_module(source)?;
    lower_module(&module, target).map_err(|e| vec![e])
}
