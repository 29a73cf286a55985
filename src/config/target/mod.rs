use std::path::Path;

use crate::diagnostic::Diagnostic;
use crate::span::Span;

/// Device compute capability from which `cuda_fp16.h` is usable natively.
pub const NATIVE_HALF_ARCH: u32 = 53;

/// Device compute capability that provides the `__dp4a` int8 intrinsics.
pub const INT8_DOT_ARCH: u32 = 61;

/// CUDA target configuration.
///
/// Everything the printer needs to know about the device and host ABI
/// lives here instead of being hardcoded in the lowering.
#[derive(Clone, Debug, PartialEq)]
pub struct CudaTarget {
    /// Short identifier used in CLI and file paths (e.g. "sm_80").
    pub name: String,
    /// Human-readable name (e.g. "NVIDIA sm_80").
    pub display_name: String,
    /// Compute capability times ten (80 for sm_80). `None` when the
    /// kernel must compile for any device; feature shims are then guarded
    /// by `__CUDA_ARCH__` checks in the emitted text.
    pub arch: Option<u32>,
    /// Width of the host `long` type (64 on LP64, 32 on LLP64/ILP32).
    pub long_bits: u32,
    /// Whether pointer parameters get the `__restrict__` qualifier.
    pub restrict: bool,
    /// File extension for emitted source (e.g. ".cu").
    pub output_extension: String,
}

impl Default for CudaTarget {
    fn default() -> Self {
        Self::cuda()
    }
}

impl CudaTarget {
    /// Built-in architecture-neutral target.
    pub fn cuda() -> Self {
        Self {
            name: "cuda".to_string(),
            display_name: "NVIDIA CUDA (any arch)".to_string(),
            arch: None,
            long_bits: 64,
            restrict: true,
            output_extension: ".cu".to_string(),
        }
    }

    /// Built-in target pinned to one compute capability.
    pub fn sm(arch: u32) -> Self {
        Self {
            name: format!("sm_{}", arch),
            display_name: format!("NVIDIA sm_{}", arch),
            arch: Some(arch),
            ..Self::cuda()
        }
    }

    /// `Some(true)` if the target is known to support `arch`, `Some(false)`
    /// if known not to, `None` if the arch is unknown.
    pub fn supports(&self, arch: u32) -> Option<bool> {
        self.arch.map(|a| a >= arch)
    }

    /// Load a target configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Diagnostic> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Diagnostic::error(
                format!("cannot read target config '{}': {}", path.display(), e),
                Span::dummy(),
            )
        })?;
        Self::parse_toml(&content, path)
    }

    /// Resolve a target by name: built-ins first (`cuda`, `sm_XX`), then
    /// `targets/{name}.toml` relative to the binary or working directory.
    pub fn resolve(name: &str) -> Result<Self, Diagnostic> {
        // Reject path traversal
        if name.contains('/') || name.contains('\\') || name.contains("..") || name.starts_with('.')
        {
            return Err(Diagnostic::error(
                format!("invalid target name '{}'", name),
                Span::dummy(),
            ));
        }

        if name == "cuda" || name == "ptx" {
            return Ok(Self::cuda());
        }
        if let Some(arch) = parse_sm(name) {
            return Ok(Self::sm(arch));
        }

        let relative = format!("targets/{}.toml", name);

        // 1. Relative to the binary
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                for base in [Some(dir), dir.parent()].into_iter().flatten() {
                    let path = base.join(&relative);
                    if path.exists() {
                        return Self::load(&path);
                    }
                }
            }
        }

        // 2. Current working directory
        let cwd_path = std::path::PathBuf::from(&relative);
        if cwd_path.exists() {
            return Self::load(&cwd_path);
        }

        Err(Diagnostic::error(
            format!("unknown target '{}' (looked for '{}')", name, relative),
            Span::dummy(),
        )
        .with_help("built-in targets: cuda, sm_70, sm_75, sm_80, sm_86, sm_90".to_string()))
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self, Diagnostic> {
        let err =
            |msg: String| Diagnostic::error(format!("{}: {}", path.display(), msg), Span::dummy());

        let mut target = Self::cuda();
        target.name = String::new();
        target.display_name = String::new();

        let mut section = String::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            if let Some((key, value)) = trimmed.split_once('=') {
                let key = key.trim();
                let value = value.trim();
                let unquoted = value.trim_matches('"');

                match (section.as_str(), key) {
                    ("target", "name") => target.name = unquoted.to_string(),
                    ("target", "display_name") => target.display_name = unquoted.to_string(),
                    ("target", "arch") => {
                        target.arch = if unquoted == "any" {
                            None
                        } else {
                            Some(
                                parse_sm(unquoted)
                                    .or_else(|| unquoted.parse().ok())
                                    .ok_or_else(|| {
                                        err(format!("invalid target.arch: {}", value))
                                    })?,
                            )
                        };
                    }
                    ("codegen", "long_bits") => {
                        target.long_bits = value
                            .parse()
                            .map_err(|_| err(format!("invalid codegen.long_bits: {}", value)))?;
                    }
                    ("codegen", "restrict") => {
                        target.restrict = match value {
                            "true" => true,
                            "false" => false,
                            _ => return Err(err(format!("invalid codegen.restrict: {}", value))),
                        };
                    }
                    ("codegen", "output_extension") => {
                        target.output_extension = unquoted.to_string()
                    }
                    _ => {}
                }
            }
        }

        if target.name.is_empty() {
            return Err(err("missing target.name".to_string()));
        }
        if target.long_bits != 32 && target.long_bits != 64 {
            return Err(err(format!(
                "codegen.long_bits must be 32 or 64, got {}",
                target.long_bits
            )));
        }
        if target.display_name.is_empty() {
            target.display_name = target.name.clone();
        }

        Ok(target)
    }
}

/// `sm_80` → 80.
fn parse_sm(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("sm_")?;
    if digits.len() < 2 || digits.len() > 3 {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests;
