//! Feature flags gathered during traversal and the prologue they select.
//!
//! Flags only ever switch on. `finish` reads them once, after every
//! kernel has been printed, and prepends the headers and helper bodies
//! the printed code turned out to need.

use std::fmt::Write as _;

use tracing::trace;

use super::prelude;
use crate::config::target::{CudaTarget, INT8_DOT_ARCH, NATIVE_HALF_ARCH};

/// Header and helper requirements discovered while printing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Features {
    /// `half` type and `__pack_half2`.
    pub fp16: bool,
    /// Legacy `__shfl*` macros for toolkits older than CUDA 9.
    pub warp_shuffle: bool,
    /// `sm_61_intrinsics.h` for packed int8 arithmetic.
    pub int8: bool,
    /// `math_constants.h` for `CUDART_INF_F` and friends.
    pub math_constants: bool,
    /// `mma.h` for the `nvcuda::wmma` API.
    pub mma_header: bool,
    /// Inline-PTX helper bodies of the compact fragment path.
    pub mma_helpers: bool,
    /// The global barrier counter has been declared.
    pub global_barrier: bool,
}

impl Features {
    pub const NONE: Features = Features {
        fp16: false,
        warp_shuffle: false,
        int8: false,
        math_constants: false,
        mma_header: false,
        mma_helpers: false,
        global_barrier: false,
    };

    pub const FP16: Features = Features {
        fp16: true,
        ..Self::NONE
    };

    pub const INT8: Features = Features {
        int8: true,
        ..Self::NONE
    };

    pub const WARP_SHUFFLE: Features = Features {
        warp_shuffle: true,
        ..Self::NONE
    };

    pub const MATH_CONSTANTS: Features = Features {
        math_constants: true,
        ..Self::NONE
    };

    pub const MMA_HEADER: Features = Features {
        mma_header: true,
        ..Self::NONE
    };

    pub const MMA_HELPERS: Features = Features {
        mma_helpers: true,
        ..Self::NONE
    };

    pub const GLOBAL_BARRIER: Features = Features {
        global_barrier: true,
        ..Self::NONE
    };

    pub fn union(self, other: Features) -> Features {
        Features {
            fp16: self.fp16 || other.fp16,
            warp_shuffle: self.warp_shuffle || other.warp_shuffle,
            int8: self.int8 || other.int8,
            math_constants: self.math_constants || other.math_constants,
            mma_header: self.mma_header || other.mma_header,
            mma_helpers: self.mma_helpers || other.mma_helpers,
            global_barrier: self.global_barrier || other.global_barrier,
        }
    }

    /// Switch on every flag set in `other`.
    pub fn enable(&mut self, other: Features) {
        let merged = self.union(other);
        if merged != *self {
            for name in merged.names() {
                if !self.names().contains(&name) {
                    trace!(feature = name, "feature enabled");
                }
            }
            *self = merged;
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        [
            (self.fp16, "fp16"),
            (self.warp_shuffle, "warp_shuffle"),
            (self.int8, "int8"),
            (self.math_constants, "math_constants"),
            (self.mma_header, "mma_header"),
            (self.mma_helpers, "mma_helpers"),
            (self.global_barrier, "global_barrier"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }
}

/// Text placed ahead of all declarations and kernels.
///
/// The helper bodies take `half*` arguments, so they pull in the fp16
/// shim even when no `half` value was printed.
pub fn finish_prologue(features: &Features, target: &CudaTarget) -> String {
    let mut out = String::new();

    if features.fp16 || features.mma_helpers {
        match target.supports(NATIVE_HALF_ARCH) {
            Some(true) => out.push_str(prelude::HALF_NATIVE),
            Some(false) => out.push_str(prelude::HALF_FALLBACK),
            None => {
                let _ = writeln!(
                    out,
                    "#if defined(__CUDA_ARCH__) && (__CUDA_ARCH__ >= {}0)",
                    NATIVE_HALF_ARCH
                );
                out.push_str(prelude::HALF_NATIVE);
                out.push_str("#else\n");
                out.push_str(prelude::HALF_FALLBACK);
                out.push_str("#endif\n");
            }
        }
        out.push('\n');
        out.push_str(prelude::PACK_HALF2);
    }

    if features.warp_shuffle {
        out.push_str(prelude::WARP_SHUFFLE_LEGACY);
    }

    if features.int8 {
        match target.supports(INT8_DOT_ARCH) {
            Some(true) => out.push_str(prelude::INT8_INTRINSICS),
            // The header does not exist below sm_61; byte lanes still work
            // through plain shifts and masks.
            Some(false) => {}
            None => {
                let _ = writeln!(
                    out,
                    "#if defined(__CUDA_ARCH__) && (__CUDA_ARCH__ >= {}0)",
                    INT8_DOT_ARCH
                );
                out.push_str(prelude::INT8_INTRINSICS);
                out.push_str("#endif\n");
            }
        }
    }

    if features.math_constants {
        out.push_str("#include <math_constants.h>\n");
    }

    if features.mma_header {
        out.push_str("#include <mma.h>\n");
    }

    if features.mma_helpers {
        out.push_str(prelude::MMA_HELPERS);
    }

    out
}
