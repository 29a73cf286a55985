//! CUDA dialect of the C printer.
//!
//! [`CudaCodegen`] owns one translation unit. Kernels are added in
//! order; `finish` then assembles the feature-dependent prologue, the
//! declarations collected during traversal, and the kernel bodies.
//!
//! ```text
//! add_function ─▶ Dialect overrides ─┬─ types     (spelling, fp16/int8 flags)
//!                                    ├─ lanes     (vector lane access)
//!                                    ├─ vector    (scalarization, ramp/broadcast/shuffle)
//!                                    ├─ intrinsics(wmma, compact mma, shuffles, barriers)
//!                                    └─ storage   (shared arrays, fragments)
//! finish ─▶ emission::finish_prologue + prologue + body
//! ```

pub mod emission;
mod intrinsics;
pub mod lanes;
pub mod prelude;
mod storage;
pub mod types;
mod vector;

pub use emission::{finish_prologue, Features};
pub use intrinsics::BarrierKind;
pub use storage::FragmentTable;
pub use types::{spell, Spelling};

use tracing::debug;

use crate::codegen::c::{self, scientific, CPrinter, Dialect};
use crate::config::target::CudaTarget;
use crate::diagnostic::Diagnostic;
use crate::ir::{
    AttrKey, BinaryOp, Builtin, DataType, Expr, ExprKind, ForKind, Kernel, Stmt, StmtKind,
    StorageScope, Var,
};
use crate::span::Span;

pub struct CudaCodegen {
    c: CPrinter,
    target: CudaTarget,
    features: Features,
    fragments: FragmentTable,
    /// Device-wide arrival counter of the global barrier.
    barrier_state: String,
    /// Per-block expected arrival count of the global barrier.
    barrier_expect: String,
}

impl CudaCodegen {
    pub fn new(target: CudaTarget) -> Self {
        let mut c = CPrinter::new();
        let barrier_state = c.fresh_name("__global_barrier_state");
        let barrier_expect = c.fresh_name("__barrier_expect");
        Self {
            c,
            target,
            features: Features::NONE,
            fragments: FragmentTable::new(),
            barrier_state,
            barrier_expect,
        }
    }

    pub fn target(&self) -> &CudaTarget {
        &self.target
    }

    /// Features switched on so far.
    pub fn features(&self) -> Features {
        self.features
    }

    pub fn add_function(&mut self, kernel: &Kernel) -> Result<(), Diagnostic> {
        debug!(
            kernel = %kernel.name,
            params = kernel.params.len(),
            target = %self.target.name,
            "lowering kernel"
        );
        c::add_function(self, kernel)
    }

    /// Feature prologue, then collected declarations, then kernels.
    pub fn finish(self) -> String {
        let mut out = finish_prologue(&self.features, &self.target);
        out.push_str(&self.c.finish());
        out
    }

    fn enable(&mut self, f: Features) {
        self.features.enable(f);
    }

    /// Spell a type and switch on the features the spelling needs.
    fn spell(&mut self, t: DataType) -> Result<String, Diagnostic> {
        let s = spell(t, &self.target)?;
        self.enable(s.needs);
        Ok(s.text)
    }

    fn print_float(&mut self, value: f64, t: DataType) -> Result<String, Diagnostic> {
        let single = |v: f64| -> Option<String> {
            if v.is_nan() {
                Some("CUDART_NAN_F".to_string())
            } else if v.is_infinite() {
                let sign = if v < 0.0 { "-" } else { "" };
                Some(format!("{}CUDART_INF_F", sign))
            } else {
                None
            }
        };
        let text = match t.bits {
            32 => match single(value) {
                Some(special) => {
                    self.enable(Features::MATH_CONSTANTS);
                    special
                }
                None => format!("{}f", scientific(value)),
            },
            64 => {
                if value.is_nan() {
                    self.enable(Features::MATH_CONSTANTS);
                    "CUDART_NAN".to_string()
                } else if value.is_infinite() {
                    self.enable(Features::MATH_CONSTANTS);
                    let sign = if value < 0.0 { "-" } else { "" };
                    format!("{}CUDART_INF", sign)
                } else {
                    scientific(value)
                }
            }
            16 => {
                self.enable(Features::FP16);
                let inner = match single(value) {
                    Some(special) => {
                        self.enable(Features::MATH_CONSTANTS);
                        special
                    }
                    None => format!("{}f", scientific(value)),
                };
                format!("__float2half_rn({})", inner)
            }
            _ => {
                return Err(Diagnostic::error(
                    format!("cannot print a {} literal", t),
                    Span::dummy(),
                ))
            }
        };
        self.c.mark_const(&text);
        Ok(text)
    }

    fn print_expr_inner(&mut self, e: &Expr) -> Result<String, Diagnostic> {
        match &e.kind {
            ExprKind::FloatImm(v) => self.print_float(*v, e.dtype),
            ExprKind::Ramp {
                base,
                stride,
                lanes,
            } => self.print_ramp(base, stride, *lanes),
            ExprKind::Broadcast { value, .. } => self.print_broadcast(e.dtype, value),
            ExprKind::Shuffle { vectors, indices } => self.print_shuffle(e.dtype, vectors, indices),
            ExprKind::Cast(value) if e.dtype.is_vector() => self.scalarize_cast(e.dtype, value),
            ExprKind::Select {
                cond,
                then_value,
                else_value,
            } if e.dtype.is_vector() => self.scalarize_select(e.dtype, cond, then_value, else_value),
            _ => c::visit_expr(self, e),
        }
    }

    fn print_stmt_inner(&mut self, s: &Stmt) -> Result<(), Diagnostic> {
        match &s.kind {
            StmtKind::For {
                kind: ForKind::Unrolled,
                ..
            } => {
                self.c.line("#pragma unroll");
                c::visit_stmt(self, s)
            }
            StmtKind::Allocate {
                buffer,
                dtype,
                extents,
                condition,
                body,
            } => self.print_allocate(s, buffer, *dtype, extents, condition, body),
            StmtKind::Attr {
                key: key @ (AttrKey::FragmentShape | AttrKey::FragmentLayout),
                node,
                value,
                ..
            } => {
                self.record_fragment_attr(*key == AttrKey::FragmentShape, node, value)?;
                c::visit_stmt(self, s)
            }
            _ => c::visit_stmt(self, s),
        }
    }
}

impl Dialect for CudaCodegen {
    fn printer(&mut self) -> &mut CPrinter {
        &mut self.c
    }

    fn print_type(&mut self, t: DataType) -> Result<String, Diagnostic> {
        self.spell(t)
    }

    fn print_expr(&mut self, e: &Expr) -> Result<String, Diagnostic> {
        self.print_expr_inner(e).map_err(|diag| diag.or_span(e.span))
    }

    fn print_stmt(&mut self, s: &Stmt) -> Result<(), Diagnostic> {
        self.print_stmt_inner(s).map_err(|diag| diag.or_span(s.span))
    }

    fn func_prefix(&self) -> &'static str {
        "extern \"C\" __global__ void"
    }

    fn restrict_keyword(&self) -> &'static str {
        if self.target.restrict {
            "__restrict__"
        } else {
            ""
        }
    }

    fn storage_qualifier(&mut self, scope: StorageScope) -> Result<&'static str, Diagnostic> {
        match scope {
            StorageScope::Shared => Ok("__shared__ "),
            StorageScope::Local => Ok(""),
            other => Err(Diagnostic::error(
                format!("no plain declaration for storage scope '{}'", other),
                Span::dummy(),
            )),
        }
    }

    fn bind_thread_index(&mut self, var: &Var, tag: &str) -> Result<(), Diagnostic> {
        let text = if var.dtype == DataType::uint(32) {
            tag.to_string()
        } else {
            format!("((int){})", tag)
        };
        self.c.bind_var(var, text);
        Ok(())
    }

    fn print_vec_binary_op(
        &mut self,
        op: BinaryOp,
        t: DataType,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<String, Diagnostic> {
        self.scalarize_binary(op, t, lhs, rhs)
    }

    fn vec_elem_load(&mut self, vec: &str, t: DataType, i: u16) -> Result<String, Diagnostic> {
        lanes::load_lane(vec, t, i)
    }

    fn vec_elem_store(
        &mut self,
        vec: &str,
        t: DataType,
        i: u16,
        value: &str,
    ) -> Result<(), Diagnostic> {
        let stmt = lanes::store_lane(vec, t, i, value)?;
        self.c.line(&stmt);
        Ok(())
    }

    fn vec_pack(&mut self, t: DataType, parts: &[String]) -> Result<String, Diagnostic> {
        let spelled = self.spell(t)?;
        lanes::pack_lanes(t, &spelled, parts)
    }

    fn print_call_extern(
        &mut self,
        ret: DataType,
        symbol: &str,
        args: &[Expr],
        skip: usize,
    ) -> Result<String, Diagnostic> {
        let args = &args[skip.min(args.len())..];
        if ret.is_vector() {
            self.scalarize_call(ret, symbol, args)
        } else {
            c::call_text(self, symbol, args)
        }
    }

    fn print_builtin(&mut self, b: Builtin, call: &Expr) -> Result<String, Diagnostic> {
        self.translate_builtin(b, call)
    }

    fn print_storage_sync(&mut self, args: &[Expr]) -> Result<(), Diagnostic> {
        self.translate_storage_sync(args)
    }

    /// `half` loads through a volatile pointer are re-cast so the
    /// qualifier does not leak into `half` arithmetic.
    fn handle_volatile_load(
        &mut self,
        value: String,
        t: DataType,
        _buffer: &Var,
    ) -> Result<String, Diagnostic> {
        if t.is_float16() {
            Ok(format!("(half)({})", value))
        } else {
            Ok(value)
        }
    }
}
