//! Builtin call forms the CUDA backend gives special treatment.
//!
//! Each builtin has a fixed argument count that the translator checks
//! before touching any argument.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    // ── WMMA fragment API ──
    FillFragment,
    LoadMatrixSync,
    StoreMatrixSync,
    MmaSync,
    BmmaSync,

    // ── Compact fragment path (inline PTX helpers) ──
    LdmatrixX1Sync,
    LdmatrixX2Sync,
    PtxMmaSync,
    MmaFragmentInitialize,
    StmatrixSync,

    // ── Warp-level ──
    WarpShuffle,
    WarpShuffleUp,
    WarpShuffleDown,
    WarpActiveMask,

    // ── Synchronization ──
    StorageSync,
    GlobalBarrierKInit,
}

/// How many arguments a builtin accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    OneOf(&'static [usize]),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => *k == n,
            Arity::OneOf(ks) => ks.contains(&n),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(k) => write!(f, "{}", k),
            Arity::OneOf(ks) => {
                let parts: Vec<String> = ks.iter().map(|k| k.to_string()).collect();
                write!(f, "{}", parts.join(" or "))
            }
        }
    }
}

const ALL: &[Builtin] = &[
    Builtin::FillFragment,
    Builtin::LoadMatrixSync,
    Builtin::StoreMatrixSync,
    Builtin::MmaSync,
    Builtin::BmmaSync,
    Builtin::LdmatrixX1Sync,
    Builtin::LdmatrixX2Sync,
    Builtin::PtxMmaSync,
    Builtin::MmaFragmentInitialize,
    Builtin::StmatrixSync,
    Builtin::WarpShuffle,
    Builtin::WarpShuffleUp,
    Builtin::WarpShuffleDown,
    Builtin::WarpActiveMask,
    Builtin::StorageSync,
    Builtin::GlobalBarrierKInit,
];

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::FillFragment => "tvm_fill_fragment",
            Builtin::LoadMatrixSync => "tvm_load_matrix_sync",
            Builtin::StoreMatrixSync => "tvm_store_matrix_sync",
            Builtin::MmaSync => "tvm_mma_sync",
            Builtin::BmmaSync => "tvm_bmma_sync",
            Builtin::LdmatrixX1Sync => "tvm_ldmatrix_x1_sync",
            Builtin::LdmatrixX2Sync => "tvm_ldmatrix_x2_sync",
            Builtin::PtxMmaSync => "tvm_ptx_mma_sync",
            Builtin::MmaFragmentInitialize => "tvm_mma_fragment_initialize",
            Builtin::StmatrixSync => "tvm_stmatrix_sync",
            Builtin::WarpShuffle => "tvm_warp_shuffle",
            Builtin::WarpShuffleUp => "tvm_warp_shuffle_up",
            Builtin::WarpShuffleDown => "tvm_warp_shuffle_down",
            Builtin::WarpActiveMask => "tvm_warp_activemask",
            Builtin::StorageSync => "tvm_storage_sync",
            Builtin::GlobalBarrierKInit => "tvm_global_barrier_kinit",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL.iter().copied().find(|b| b.name() == name)
    }

    pub fn arity(self) -> Arity {
        match self {
            Builtin::FillFragment => Arity::Exactly(6),
            Builtin::LoadMatrixSync
            | Builtin::StoreMatrixSync
            | Builtin::MmaSync
            | Builtin::BmmaSync
            | Builtin::PtxMmaSync => Arity::Exactly(8),
            Builtin::LdmatrixX1Sync | Builtin::LdmatrixX2Sync => Arity::Exactly(10),
            Builtin::MmaFragmentInitialize => Arity::Exactly(3),
            Builtin::StmatrixSync => Arity::Exactly(9),
            Builtin::WarpShuffle | Builtin::WarpShuffleUp | Builtin::WarpShuffleDown => {
                Arity::Exactly(5)
            }
            Builtin::WarpActiveMask | Builtin::GlobalBarrierKInit => Arity::Exactly(0),
            Builtin::StorageSync => Arity::OneOf(&[1, 3]),
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
