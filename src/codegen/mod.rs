//! Source printers.
//!
//! `c` holds the C-family printing machinery shared by every dialect;
//! `cuda` specializes it into the CUDA backend.

pub mod c;
pub mod cuda;

pub use cuda::CudaCodegen;
