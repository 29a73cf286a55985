//! Memory scopes and fragment annotations attached to buffers.
//!
//! All of these arrive as string literals inside attribute statements
//! and are parsed into closed enums before anything is emitted.

use std::fmt;
use std::str::FromStr;

/// Which tensor-core code path a fragment buffer belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FragmentFamily {
    /// `nvcuda::wmma::fragment<...>` template API.
    Wmma,
    /// Plain register arrays driven by inline-PTX helpers.
    Mma,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FragmentRole {
    MatrixA,
    MatrixB,
    Accumulator,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageScope {
    Global,
    Shared,
    /// Generic per-thread registers.
    Local,
    Fragment(FragmentFamily, FragmentRole),
}

impl FromStr for StorageScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use FragmentFamily::*;
        use FragmentRole::*;
        let scope = match s {
            "global" => StorageScope::Global,
            "shared" => StorageScope::Shared,
            "local" => StorageScope::Local,
            "wmma.matrix_a" => StorageScope::Fragment(Wmma, MatrixA),
            "wmma.matrix_b" => StorageScope::Fragment(Wmma, MatrixB),
            "wmma.accumulator" => StorageScope::Fragment(Wmma, Accumulator),
            "mma.matrix_a" => StorageScope::Fragment(Mma, MatrixA),
            "mma.matrix_b" => StorageScope::Fragment(Mma, MatrixB),
            "mma.accumulator" => StorageScope::Fragment(Mma, Accumulator),
            _ => return Err(format!("unknown storage scope '{}'", s)),
        };
        Ok(scope)
    }
}

impl fmt::Display for StorageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageScope::Global => write!(f, "global"),
            StorageScope::Shared => write!(f, "shared"),
            StorageScope::Local => write!(f, "local"),
            StorageScope::Fragment(family, role) => {
                let family = match family {
                    FragmentFamily::Wmma => "wmma",
                    FragmentFamily::Mma => "mma",
                };
                let role = match role {
                    FragmentRole::MatrixA => "matrix_a",
                    FragmentRole::MatrixB => "matrix_b",
                    FragmentRole::Accumulator => "accumulator",
                };
                write!(f, "{}.{}", family, role)
            }
        }
    }
}

/// Matrix layout tag for fragments and ldmatrix/store calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
    RowMajor,
    ColMajor,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::RowMajor => "row_major",
            Layout::ColMajor => "col_major",
        }
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "row_major" | "row-major" => Ok(Layout::RowMajor),
            "col_major" | "col-major" => Ok(Layout::ColMajor),
            _ => Err(format!(
                "unknown layout '{}' (expected row_major or col_major)",
                s
            )),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `M, N, K` of a tensor-core fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FragmentShape {
    pub m: u32,
    pub n: u32,
    pub k: u32,
}

impl FragmentShape {
    /// Elements covered by one fragment of the given role. Widened so
    /// any pair of parsed dimensions multiplies without overflow.
    pub fn tile_elems(&self, role: FragmentRole) -> u64 {
        let (a, b) = match role {
            FragmentRole::MatrixA => (self.m, self.k),
            FragmentRole::MatrixB => (self.n, self.k),
            FragmentRole::Accumulator => (self.m, self.n),
        };
        u64::from(a) * u64::from(b)
    }
}

impl FromStr for FragmentShape {
    type Err = String;

    /// Parse `"16, 16, 16"`. Whitespace around the commas is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dims: Vec<&str> = s.split(',').map(str::trim).collect();
        if dims.len() != 3 {
            return Err(format!(
                "fragment shape '{}' must have three dimensions M, N, K",
                s
            ));
        }
        let mut parsed = [0u32; 3];
        for (slot, dim) in parsed.iter_mut().zip(&dims) {
            *slot = match dim.parse::<u32>() {
                Ok(v) if v > 0 => v,
                _ => {
                    return Err(format!(
                        "fragment shape '{}' has invalid dimension '{}'",
                        s, dim
                    ))
                }
            };
        }
        Ok(FragmentShape {
            m: parsed[0],
            n: parsed[1],
            k: parsed[2],
        })
    }
}

impl fmt::Display for FragmentShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.m, self.n, self.k)
    }
}
