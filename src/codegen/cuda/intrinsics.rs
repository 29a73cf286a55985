//! Builtin calls: tensor-core fragment operations, warp shuffles and
//! barriers.

use std::str::FromStr;

use super::{CudaCodegen, Features};
use crate::codegen::c::Dialect;
use crate::diagnostic::Diagnostic;
use crate::ir::{Builtin, DataType, Expr, ExprKind, Layout};
use crate::span::Span;

/// Memory region named by a `tvm_storage_sync` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarrierKind {
    Warp,
    Shared,
    SharedDyn,
    Global,
}

impl FromStr for BarrierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warp" => Ok(BarrierKind::Warp),
            "shared" => Ok(BarrierKind::Shared),
            "shared.dyn" => Ok(BarrierKind::SharedDyn),
            "global" => Ok(BarrierKind::Global),
            _ => Err(format!(
                "unknown barrier scope '{}' (expected warp, shared, shared.dyn or global)",
                s
            )),
        }
    }
}

/// Parse a string-literal argument into a closed tag.
fn tag<T>(arg: &Expr, what: &str) -> Result<T, Diagnostic>
where
    T: FromStr<Err = String>,
{
    let text = arg.as_str().ok_or_else(|| {
        Diagnostic::error(format!("{} must be a string literal", what), arg.span)
    })?;
    text.parse().map_err(|m| Diagnostic::error(m, arg.span))
}

fn call_args(call: &Expr) -> &[Expr] {
    match &call.kind {
        ExprKind::Call { args, .. } => args,
        _ => &[],
    }
}

fn check_arity(b: Builtin, args: &[Expr]) -> Result<(), Diagnostic> {
    let arity = b.arity();
    if arity.accepts(args.len()) {
        return Ok(());
    }
    Err(Diagnostic::error(
        format!(
            "{} expects {} arguments, got {}",
            b,
            arity,
            args.len()
        ),
        Span::dummy(),
    ))
}

impl CudaCodegen {
    /// `buf[index]`
    fn element(&mut self, buffer: &Expr, index: &Expr) -> Result<String, Diagnostic> {
        let b = self.print_expr(buffer)?;
        let i = self.print_expr(index)?;
        Ok(format!("{}[{}]", b, i))
    }

    fn print_all(&mut self, args: &[Expr]) -> Result<Vec<String>, Diagnostic> {
        args.iter().map(|a| self.print_expr(a)).collect()
    }

    /// Text of a builtin call. Forms that only emit statements (the
    /// global barrier initializer, a non-float fragment init) write their
    /// lines directly and return an empty string.
    pub(super) fn translate_builtin(&mut self, b: Builtin, call: &Expr) -> Result<String, Diagnostic> {
        let a = call_args(call);
        check_arity(b, a)?;
        match b {
            // ── WMMA fragment API ──
            Builtin::FillFragment => {
                self.enable(Features::MMA_HEADER);
                let frag = self.element(&a[0], &a[4])?;
                let v = self.print_expr(&a[5])?;
                Ok(format!("nvcuda::wmma::fill_fragment({}, {})", frag, v))
            }
            Builtin::LoadMatrixSync => {
                self.enable(Features::MMA_HEADER);
                let frag = self.element(&a[0], &a[4])?;
                let ptr = self.print_expr(&a[5])?;
                let stride = self.print_expr(&a[6])?;
                Ok(format!(
                    "nvcuda::wmma::load_matrix_sync({}, {}, {})",
                    frag, ptr, stride
                ))
            }
            Builtin::StoreMatrixSync => {
                self.enable(Features::MMA_HEADER);
                let layout: Layout = tag(&a[7], "store layout")?;
                let frag = self.element(&a[0], &a[4])?;
                let ptr = self.print_expr(&a[5])?;
                let stride = self.print_expr(&a[6])?;
                Ok(format!(
                    "nvcuda::wmma::store_matrix_sync({}, {}, {}, nvcuda::wmma::mem_{})",
                    ptr, frag, stride, layout
                ))
            }
            Builtin::MmaSync | Builtin::BmmaSync => {
                self.enable(Features::MMA_HEADER);
                let func = if b == Builtin::MmaSync {
                    "mma_sync"
                } else {
                    "bmma_sync"
                };
                let frags = self.fragment_quad(a)?;
                Ok(format!("nvcuda::wmma::{}({})", func, frags))
            }

            // ── Compact fragment path ──
            Builtin::LdmatrixX1Sync | Builtin::LdmatrixX2Sync => {
                self.enable(Features::MMA_HELPERS);
                let layout: Layout = tag(&a[8], "ldmatrix layout")?;
                // x1 loads B fragments (col_major is untransposed), x2 loads A
                // fragments (row_major is untransposed).
                let (width, direct) = if b == Builtin::LdmatrixX1Sync {
                    ("x1", Layout::ColMajor)
                } else {
                    ("x2", Layout::RowMajor)
                };
                let trans = if layout == direct { "" } else { "_trans" };
                let smem = self.print_expr(&a[6])?;
                let stride = self.print_expr(&a[7])?;
                let frag = self.element(&a[0], &a[1])?;
                let swizzle = self.print_expr(&a[9])?;
                Ok(format!(
                    "mma_ldmatrix_{}{}_half({}, {}, {}, {})",
                    width, trans, smem, stride, frag, swizzle
                ))
            }
            Builtin::PtxMmaSync => {
                self.enable(Features::MMA_HELPERS);
                let frags = self.fragment_quad(a)?;
                Ok(format!("mma_sync_m16n8k8_161632({})", frags))
            }
            Builtin::MmaFragmentInitialize => {
                let dtype: DataType = tag(&a[2], "fragment dtype")?;
                if dtype != DataType::float32() {
                    return Ok(String::new());
                }
                self.enable(Features::MMA_HELPERS);
                let frag = self.element(&a[0], &a[1])?;
                Ok(format!("mma_accumulator_init_float((float4 *) ({}))", frag))
            }
            Builtin::StmatrixSync => {
                self.enable(Features::MMA_HELPERS);
                let frag = self.element(&a[0], &a[1])?;
                let rest = self.print_all(&a[6..9])?;
                Ok(format!(
                    "store_fragment_float({}, {})",
                    frag,
                    rest.join(", ")
                ))
            }

            // ── Warp-level ──
            Builtin::WarpShuffle | Builtin::WarpShuffleUp | Builtin::WarpShuffleDown => {
                self.enable(Features::WARP_SHUFFLE);
                let func = match b {
                    Builtin::WarpShuffleUp => "__shfl_up_sync",
                    Builtin::WarpShuffleDown => "__shfl_down_sync",
                    _ => "__shfl_sync",
                };
                // The fifth operand is the logical warp size, already
                // folded into the width.
                let parts = self.print_all(&a[..4])?;
                Ok(format!("{}({})", func, parts.join(", ")))
            }
            Builtin::WarpActiveMask => Ok("__activemask()".to_string()),

            // ── Synchronization ──
            Builtin::StorageSync => Err(Diagnostic::error(
                "tvm_storage_sync must be evaluated as a statement".to_string(),
                Span::dummy(),
            )),
            Builtin::GlobalBarrierKInit => {
                self.print_kinit();
                Ok(String::new())
            }
        }
    }

    /// `a0[a1], a2[a3], a4[a5], a6[a7]`
    fn fragment_quad(&mut self, a: &[Expr]) -> Result<String, Diagnostic> {
        let mut parts = Vec::with_capacity(4);
        for pair in a.chunks(2).take(4) {
            parts.push(self.element(&pair[0], &pair[1])?);
        }
        Ok(parts.join(", "))
    }

    pub(super) fn translate_storage_sync(&mut self, args: &[Expr]) -> Result<(), Diagnostic> {
        check_arity(Builtin::StorageSync, args)?;
        let kind: BarrierKind = tag(&args[0], "barrier scope")?;
        match kind {
            BarrierKind::Warp => Ok(()),
            BarrierKind::Shared | BarrierKind::SharedDyn => {
                self.c.line("__syncthreads();");
                Ok(())
            }
            BarrierKind::Global => {
                if args.len() != 3 {
                    return Err(Diagnostic::error(
                        "a global barrier needs is_load and num_blocks arguments".to_string(),
                        args[0].span,
                    ));
                }
                self.print_global_barrier(&args[1], &args[2])
            }
        }
    }

    fn print_global_barrier(&mut self, is_load: &Expr, num_blocks: &Expr) -> Result<(), Diagnostic> {
        if !self.features.global_barrier {
            self.enable(Features::GLOBAL_BARRIER);
            let decl = format!("extern \"C\" __device__ unsigned {};\n", self.barrier_state);
            self.c.declare(&decl);
        }
        let is_load = self.print_expr(is_load)?;
        let num_blocks = self.print_expr(num_blocks)?;
        let state = self.barrier_state.clone();
        let expect = self.barrier_expect.clone();

        self.c.line("__threadfence_system();");
        self.c.line(&format!("if ({}) {{", is_load));
        let scope = self.c.begin_scope();
        self.c.enter();
        self.c.line(&format!("atomicAdd(&{}, 1);", state));
        let pf = self.c.fresh_name("pf");
        self.c
            .line(&format!("volatile unsigned* {} = &{};", pf, state));
        self.c.line(&format!("{} += {};", expect, num_blocks));
        self.c
            .line(&format!("while ({}[0] < {});", pf, expect));
        self.c.exit();
        self.c.end_scope(scope);
        self.c.line("}");
        self.c.line("__syncthreads();");
        Ok(())
    }

    /// Declare the per-block expected-arrivals counter and zero it.
    fn print_kinit(&mut self) {
        let expect = self.barrier_expect.clone();
        self.c.line(&format!("__shared__ unsigned {};", expect));
        self.c.line("if (threadIdx.x == 0) {");
        self.c.line(&format!("  {} = 0;", expect));
        self.c.line("}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrier_kind_tags() {
        assert_eq!("shared.dyn".parse::<BarrierKind>(), Ok(BarrierKind::SharedDyn));
        assert_eq!("global".parse::<BarrierKind>(), Ok(BarrierKind::Global));
        let err = "grid".parse::<BarrierKind>().unwrap_err();
        assert!(err.contains("unknown barrier scope 'grid'"));
    }

    #[test]
    fn test_tag_requires_literal() {
        let err = tag::<Layout>(&Expr::int(1), "store layout").unwrap_err();
        assert!(err.message.contains("must be a string literal"));
        let err = tag::<Layout>(&Expr::string("diagonal"), "store layout").unwrap_err();
        assert!(err.message.contains("unknown layout 'diagonal'"));
    }
}
