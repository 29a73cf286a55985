//! Vector expressions: lane-wise scalarization plus ramp, broadcast
//! and shuffle construction.

use super::lanes::{load_lane, pack_lanes};
use super::CudaCodegen;
use crate::codegen::c::{binary_text, ssa_bind, Dialect};
use crate::diagnostic::Diagnostic;
use crate::ir::{BinaryOp, DataType, Expr, ExprKind};
use crate::span::Span;

/// One operand of a scalarized expression and the type its lanes are
/// read as.
struct Operand<'a> {
    expr: &'a Expr,
    read_as: DataType,
}

impl<'a> Operand<'a> {
    fn new(expr: &'a Expr) -> Self {
        Self {
            expr,
            read_as: expr.dtype,
        }
    }
}

impl CudaCodegen {
    /// Decompose a vector-valued expression lane by lane.
    ///
    /// Declares `T _n;`, binds every operand once, then stores
    /// `lane(per-operand lane texts)` into each lane of `_n` in ascending
    /// lane order. Returns the name of the result.
    fn scalarize<F>(&mut self, t: DataType, operands: &[Operand], lane: F) -> Result<String, Diagnostic>
    where
        F: Fn(&[String]) -> String,
    {
        let ty = self.spell(t)?;
        let ret = self.c.fresh_name("_");
        self.c.line(&format!("{} {};", ty, ret));
        let scope = self.c.begin_scope();
        let result = self.scalarize_lanes(&ret, t, operands, lane);
        self.c.end_scope(scope);
        result.map(|()| ret)
    }

    fn scalarize_lanes<F>(
        &mut self,
        ret: &str,
        t: DataType,
        operands: &[Operand],
        lane: F,
    ) -> Result<(), Diagnostic>
    where
        F: Fn(&[String]) -> String,
    {
        let mut bound = Vec::with_capacity(operands.len());
        for op in operands {
            if op.expr.dtype.is_vector() && op.expr.dtype.lanes != t.lanes {
                return Err(Diagnostic::error(
                    format!(
                        "operand of type {} does not match the {} lanes of {}",
                        op.expr.dtype, t.lanes, t
                    ),
                    op.expr.span,
                ));
            }
            let text = self.print_expr(op.expr)?;
            let name = ssa_bind(self, text, op.expr.dtype)?;
            bound.push((name, op.read_as));
        }
        for i in 0..t.lanes {
            let mut texts = Vec::with_capacity(bound.len());
            for (name, read_as) in &bound {
                texts.push(load_lane(name, *read_as, i)?);
            }
            self.vec_elem_store(ret, t, i, &lane(&texts))?;
        }
        Ok(())
    }

    pub(super) fn scalarize_binary(
        &mut self,
        op: BinaryOp,
        t: DataType,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<String, Diagnostic> {
        self.scalarize(t, &[Operand::new(lhs), Operand::new(rhs)], |l| {
            binary_text(op, &l[0], &l[1])
        })
    }

    pub(super) fn scalarize_cast(&mut self, t: DataType, value: &Expr) -> Result<String, Diagnostic> {
        if value.dtype.lanes != t.lanes {
            return Err(Diagnostic::error(
                format!("cannot cast {} to {}: lane counts differ", value.dtype, t),
                Span::dummy(),
            ));
        }
        let elem = self.spell(t.element_of())?;
        self.scalarize(t, &[Operand::new(value)], |l| {
            format!("({})({})", elem, l[0])
        })
    }

    /// Condition lanes are read through the `ushortN` a bool vector is
    /// stored in.
    pub(super) fn scalarize_select(
        &mut self,
        t: DataType,
        cond: &Expr,
        then_value: &Expr,
        else_value: &Expr,
    ) -> Result<String, Diagnostic> {
        let cond = Operand {
            expr: cond,
            read_as: DataType::uint(16).with_lanes(cond.dtype.lanes),
        };
        self.scalarize(
            t,
            &[cond, Operand::new(then_value), Operand::new(else_value)],
            |l| format!("(bool({})?{}:{})", l[0], l[1], l[2]),
        )
    }

    pub(super) fn scalarize_call(
        &mut self,
        t: DataType,
        symbol: &str,
        args: &[Expr],
    ) -> Result<String, Diagnostic> {
        let operands: Vec<Operand> = args.iter().map(Operand::new).collect();
        self.scalarize(t, &operands, |l| format!("{}({})", symbol, l.join(", ")))
    }

    // ── Construction ──

    pub(super) fn print_ramp(
        &mut self,
        base: &Expr,
        stride: &Expr,
        lanes: u16,
    ) -> Result<String, Diagnostic> {
        if lanes > 4 {
            return Err(Diagnostic::error(
                format!("ramp of {} lanes exceeds the 4 lanes of make_int4", lanes),
                Span::dummy(),
            ));
        }
        let b = self.print_expr(base)?;
        let s = self.print_expr(stride)?;
        let parts: Vec<String> = (0..lanes)
            .map(|i| format!("({})+({}*{})", b, s, i))
            .collect();
        Ok(format!("((make_int{})({}))", lanes, parts.join(", ")))
    }

    pub(super) fn print_broadcast(
        &mut self,
        t: DataType,
        value: &Expr,
    ) -> Result<String, Diagnostic> {
        if t.is_integer() && t.bits == 8 && t.lanes == 4 {
            if let Some(v) = value.as_int() {
                let byte = v & 0xff;
                let word = (byte << 24) | (byte << 16) | (byte << 8) | byte;
                let ty = if t.is_uint() { "uint" } else { "int" };
                return Ok(format!("({}){}", ty, word));
            }
        }
        let v = self.print_expr(value)?;
        let spelled = self.spell(t)?;
        pack_lanes(t, &spelled, &vec![v; t.lanes as usize])
    }

    /// Shuffle over scalar operands: each index picks one operand.
    pub(super) fn print_shuffle(
        &mut self,
        t: DataType,
        vectors: &[Expr],
        indices: &[Expr],
    ) -> Result<String, Diagnostic> {
        let mut concat = Vec::with_capacity(vectors.len());
        for v in vectors {
            if v.dtype.is_vector() {
                return Err(Diagnostic::error(
                    format!("shuffle operands must be scalars, got {}", v.dtype),
                    v.span,
                ));
            }
            concat.push(self.print_expr(v)?);
        }
        let mut picked = Vec::with_capacity(indices.len());
        for idx in indices {
            let k = match idx.kind {
                ExprKind::IntImm(k) if k >= 0 && (k as usize) < concat.len() => k as usize,
                ExprKind::IntImm(k) => {
                    return Err(Diagnostic::error(
                        format!(
                            "shuffle index {} out of bounds for {} operands",
                            k,
                            concat.len()
                        ),
                        idx.span,
                    ))
                }
                _ => {
                    return Err(Diagnostic::error(
                        "shuffle indices must be integer constants".to_string(),
                        idx.span,
                    ))
                }
            };
            picked.push(concat[k].clone());
        }
        let spelled = self.spell(t)?;
        pack_lanes(t, &spelled, &picked)
    }
}
