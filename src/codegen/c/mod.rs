//! Generic C-family printer.
//!
//! A [`Dialect`] supplies type spellings and the hooks a target needs to
//! override; [`visit_expr`] and [`visit_stmt`] provide the default
//! handling every dialect falls back to. Sub-nodes are always printed
//! through the dialect's `print_expr`/`print_stmt`, so overrides apply
//! at every depth.

mod printer;

pub use printer::{scientific, CPrinter};

use crate::diagnostic::Diagnostic;
use crate::ir::{
    AttrKey, BinaryOp, Builtin, CallOp, DataType, Expr, ExprKind, Kernel, Stmt, StmtKind,
    StorageScope, Var,
};
use crate::span::Span;

/// Target-specific behaviour layered over [`CPrinter`].
pub trait Dialect {
    fn printer(&mut self) -> &mut CPrinter;

    fn print_type(&mut self, t: DataType) -> Result<String, Diagnostic>;

    fn print_expr(&mut self, e: &Expr) -> Result<String, Diagnostic> {
        visit_expr(self, e)
    }

    fn print_stmt(&mut self, s: &Stmt) -> Result<(), Diagnostic> {
        visit_stmt(self, s)
    }

    /// Text before the kernel name in a function definition.
    fn func_prefix(&self) -> &'static str {
        "void"
    }

    /// Qualifier placed after `T*` on pointer parameters; empty for none.
    fn restrict_keyword(&self) -> &'static str {
        ""
    }

    /// Declaration prefix for a buffer in the given scope.
    fn storage_qualifier(&mut self, _scope: StorageScope) -> Result<&'static str, Diagnostic> {
        Ok("")
    }

    fn bind_thread_index(&mut self, var: &Var, tag: &str) -> Result<(), Diagnostic> {
        self.printer().bind_var(var, tag.to_string());
        Ok(())
    }

    /// Whole-vector binary op. Defaults to the scalar form applied to
    /// vector operands.
    fn print_vec_binary_op(
        &mut self,
        op: BinaryOp,
        _t: DataType,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<String, Diagnostic> {
        let a = self.print_expr(lhs)?;
        let b = self.print_expr(rhs)?;
        Ok(binary_text(op, &a, &b))
    }

    fn vec_elem_load(&mut self, _vec: &str, t: DataType, _i: u16) -> Result<String, Diagnostic> {
        Err(no_vectors(t))
    }

    fn vec_elem_store(
        &mut self,
        _vec: &str,
        t: DataType,
        _i: u16,
        _value: &str,
    ) -> Result<(), Diagnostic> {
        Err(no_vectors(t))
    }

    /// Build a vector value from per-lane scalar texts.
    fn vec_pack(&mut self, t: DataType, _lanes: &[String]) -> Result<String, Diagnostic> {
        Err(no_vectors(t))
    }

    /// Call to an external function. The first `skip` arguments are
    /// control operands (such as the symbol literal) and are not printed.
    fn print_call_extern(
        &mut self,
        _ret: DataType,
        symbol: &str,
        args: &[Expr],
        skip: usize,
    ) -> Result<String, Diagnostic> {
        call_text(self, symbol, &args[skip.min(args.len())..])
    }

    fn print_builtin(&mut self, b: Builtin, _call: &Expr) -> Result<String, Diagnostic> {
        Err(Diagnostic::error(
            format!("builtin '{}' is not supported by this dialect", b),
            Span::dummy(),
        ))
    }

    fn print_storage_sync(&mut self, _args: &[Expr]) -> Result<(), Diagnostic> {
        Err(Diagnostic::error(
            "storage synchronization is not supported by this dialect".to_string(),
            Span::dummy(),
        ))
    }

    /// Post-process a scalar load from a volatile buffer.
    fn handle_volatile_load(
        &mut self,
        value: String,
        _t: DataType,
        _buffer: &Var,
    ) -> Result<String, Diagnostic> {
        Ok(value)
    }
}

fn no_vectors(t: DataType) -> Diagnostic {
    Diagnostic::error(
        format!("vector type {} is not supported by this dialect", t),
        Span::dummy(),
    )
}

/// `min(a, b)` for alphabetic operators, `(a + b)` otherwise.
pub fn binary_text(op: BinaryOp, a: &str, b: &str) -> String {
    let tok = op.token();
    if tok.starts_with(|c: char| c.is_ascii_alphabetic()) {
        format!("{}({}, {})", tok, a, b)
    } else {
        format!("({} {} {})", a, tok, b)
    }
}

/// `symbol(a, b, ...)` with every argument printed through the dialect.
pub fn call_text<D: Dialect + ?Sized>(
    d: &mut D,
    symbol: &str,
    args: &[Expr],
) -> Result<String, Diagnostic> {
    let mut parts = Vec::with_capacity(args.len());
    for a in args {
        parts.push(d.print_expr(a)?);
    }
    Ok(format!("{}({})", symbol, parts.join(", ")))
}

/// Reuse `src` if it is already a name or a live temp; otherwise
/// declare `T _n = src;` and remember it until the current scope closes.
pub fn ssa_bind<D: Dialect + ?Sized>(
    d: &mut D,
    src: String,
    t: DataType,
) -> Result<String, Diagnostic> {
    if d.printer().is_name(&src) {
        return Ok(src);
    }
    if let Some(vid) = d.printer().ssa_lookup(&src) {
        return Ok(vid);
    }
    let ty = d.print_type(t)?;
    let p = d.printer();
    let vid = p.fresh_name("_");
    p.line(&format!("{} {} = {};", ty, vid, src));
    p.ssa_insert(src, vid.clone());
    Ok(vid)
}

/// Base of a unit-stride ramp covering exactly `lanes` elements.
pub fn contiguous_base(index: &Expr, lanes: u16) -> Option<&Expr> {
    match &index.kind {
        ExprKind::Ramp {
            base,
            stride,
            lanes: l,
        } if *l == lanes && stride.as_int() == Some(1) => Some(base),
        _ => None,
    }
}

/// Element count of an allocation: the product of its constant extents.
/// Zero, negative, symbolic sizes and a constant-false condition are
/// rejected.
pub fn constant_allocation_size(
    extents: &[Expr],
    condition: &Expr,
    span: Span,
) -> Result<i64, Diagnostic> {
    if condition.as_int() == Some(0) {
        return Err(Diagnostic::error(
            "allocation condition is always false".to_string(),
            span,
        ));
    }
    let mut size: i64 = 1;
    for e in extents {
        let Some(v) = e.as_int() else {
            return Err(Diagnostic::error(
                "cannot allocate a buffer of symbolic size".to_string(),
                e.span.merge(span),
            )
            .with_help("only constant-size allocations are supported".to_string()));
        };
        size = size.checked_mul(v).ok_or_else(|| {
            Diagnostic::error("allocation size overflows".to_string(), span)
        })?;
    }
    if size <= 0 {
        return Err(Diagnostic::error(
            format!("allocation size must be positive, got {}", size),
            span,
        ));
    }
    Ok(size)
}

// ─── Expressions ──────────────────────────────────────────────────

/// Default expression printing.
pub fn visit_expr<D: Dialect + ?Sized>(d: &mut D, e: &Expr) -> Result<String, Diagnostic> {
    visit_expr_inner(d, e).map_err(|diag| diag.or_span(e.span))
}

fn visit_expr_inner<D: Dialect + ?Sized>(d: &mut D, e: &Expr) -> Result<String, Diagnostic> {
    match &e.kind {
        ExprKind::IntImm(v) => {
            if e.dtype == DataType::int32() {
                Ok(v.to_string())
            } else if e.dtype.is_bool() {
                Ok(format!("(bool){}", v))
            } else {
                Ok(format!("(({}){})", d.print_type(e.dtype)?, v))
            }
        }
        ExprKind::FloatImm(v) => match e.dtype.bits {
            32 => Ok(format!("{}f", scientific(*v))),
            64 => Ok(scientific(*v)),
            _ => Ok(format!("(({}){})", d.print_type(e.dtype)?, scientific(*v))),
        },
        ExprKind::StringImm(s) => Ok(format!("{:?}", s)),
        ExprKind::Var(v) => d.printer().var_id(v),
        ExprKind::Cast(value) => {
            let ty = d.print_type(e.dtype)?;
            let v = d.print_expr(value)?;
            Ok(format!("(({}){})", ty, v))
        }
        ExprKind::Binary { op, lhs, rhs } => {
            if e.dtype.is_vector() {
                d.print_vec_binary_op(*op, e.dtype, lhs, rhs)
            } else {
                let a = d.print_expr(lhs)?;
                let b = d.print_expr(rhs)?;
                Ok(binary_text(*op, &a, &b))
            }
        }
        ExprKind::Not(value) => Ok(format!("(!{})", d.print_expr(value)?)),
        ExprKind::Select {
            cond,
            then_value,
            else_value,
        } => {
            if e.dtype.is_vector() {
                return Err(no_vectors(e.dtype));
            }
            let c = d.print_expr(cond)?;
            let t = d.print_expr(then_value)?;
            let f = d.print_expr(else_value)?;
            Ok(format!("({} ? {} : {})", c, t, f))
        }
        ExprKind::Load { buffer, index } => print_load(d, e.dtype, buffer, index),
        ExprKind::Ramp { .. } => Err(unsupported_node("ramp")),
        ExprKind::Broadcast { .. } => Err(unsupported_node("broadcast")),
        ExprKind::Shuffle { .. } => Err(unsupported_node("shuffle")),
        ExprKind::Call { op, args } => match op {
            CallOp::Builtin(b) => d.print_builtin(*b, e),
            CallOp::Extern(symbol) => d.print_call_extern(e.dtype, symbol, args, 0),
            CallOp::CallExtern => {
                let symbol = args.first().and_then(|a| a.as_str()).ok_or_else(|| {
                    Diagnostic::error(
                        "call_extern needs the symbol name as its first argument".to_string(),
                        Span::dummy(),
                    )
                })?;
                d.print_call_extern(e.dtype, symbol, args, 1)
            }
        },
    }
}

fn unsupported_node(what: &str) -> Diagnostic {
    Diagnostic::error(
        format!("{} is not supported by this dialect", what),
        Span::dummy(),
    )
}

fn print_load<D: Dialect + ?Sized>(
    d: &mut D,
    t: DataType,
    buffer: &Var,
    index: &Expr,
) -> Result<String, Diagnostic> {
    let name = d.printer().var_id(buffer)?;
    let handle = d.printer().handle_type(buffer.id);

    if index.dtype.is_scalar() {
        let text = if handle.is_none() || handle == Some(t) {
            format!("{}[{}]", name, d.print_expr(index)?)
        } else {
            let ty = d.print_type(t)?;
            format!("(({}*){})[{}]", ty, name, d.print_expr(index)?)
        };
        if t.is_scalar() && d.printer().is_volatile(buffer.id) {
            return d.handle_volatile_load(text, t, buffer);
        }
        return Ok(text);
    }

    if let Some(base) = contiguous_base(index, t.lanes) {
        let ty = d.print_type(t)?;
        let base = d.print_expr(base)?;
        return Ok(format!("(({}*)({} + {}))[0]", ty, name, base));
    }

    // Gather: one scalar load per lane, packed back into a vector.
    let idx = d.print_expr(index)?;
    let idx = ssa_bind(d, idx, index.dtype)?;
    let mut lanes = Vec::with_capacity(t.lanes as usize);
    for i in 0..t.lanes {
        let lane_index = d.vec_elem_load(&idx, index.dtype, i)?;
        lanes.push(format!("{}[{}]", name, lane_index));
    }
    d.vec_pack(t, &lanes)
}

// ─── Statements ───────────────────────────────────────────────────

/// Default statement printing.
pub fn visit_stmt<D: Dialect + ?Sized>(d: &mut D, s: &Stmt) -> Result<(), Diagnostic> {
    visit_stmt_inner(d, s).map_err(|diag| diag.or_span(s.span))
}

fn visit_stmt_inner<D: Dialect + ?Sized>(d: &mut D, s: &Stmt) -> Result<(), Diagnostic> {
    match &s.kind {
        StmtKind::Let { var, value, body } => {
            let v = d.print_expr(value)?;
            let ty = d.print_type(var.dtype)?;
            let name = d.printer().alloc_var_id(var)?;
            d.printer().line(&format!("{} {} = {};", ty, name, v));
            d.print_stmt(body)
        }
        StmtKind::Attr {
            key,
            node,
            value,
            body,
        } => {
            match key {
                AttrKey::ThreadExtent(tag) => {
                    if !d.printer().is_bound(node) {
                        d.bind_thread_index(node, tag)?;
                    }
                }
                AttrKey::StorageScope => {
                    let text = value.as_str().ok_or_else(|| {
                        Diagnostic::error(
                            "storage_scope value must be a string literal".to_string(),
                            value.span,
                        )
                    })?;
                    let scope: StorageScope = text
                        .parse()
                        .map_err(|m| Diagnostic::error(m, value.span))?;
                    d.printer().record_scope(node.id, scope);
                }
                AttrKey::VolatileScope => d.printer().mark_volatile(node.id),
                AttrKey::FragmentShape | AttrKey::FragmentLayout | AttrKey::Pragma(_) => {}
            }
            d.print_stmt(body)
        }
        StmtKind::Store {
            buffer,
            index,
            value,
        } => print_store(d, buffer, index, value),
        StmtKind::Allocate {
            buffer,
            dtype,
            extents,
            condition,
            body,
        } => {
            let size = constant_allocation_size(extents, condition, s.span)?;
            let scope = d.printer().scope_of(buffer.id);
            let qualifier = d.storage_qualifier(scope)?;
            let ty = d.print_type(*dtype)?;
            let name = d.printer().alloc_var_id(buffer)?;
            d.printer()
                .line(&format!("{}{} {}[{}];", qualifier, ty, name, size));
            d.printer().register_handle_type(buffer.id, *dtype);
            d.print_stmt(body)
        }
        StmtKind::For {
            var,
            min,
            extent,
            kind: _,
            body,
        } => {
            if min.as_int() != Some(0) {
                return Err(Diagnostic::error(
                    "loops must start at zero".to_string(),
                    min.span,
                ));
            }
            let ext = d.print_expr(extent)?;
            let ty = d.print_type(var.dtype)?;
            let name = d.printer().alloc_var_id(var)?;
            let header = format!(
                "for ({} {} = 0; {} < {}; ++{}) {{",
                ty, name, name, ext, name
            );
            print_block(d, &header, body)
        }
        StmtKind::IfThenElse {
            cond,
            then_case,
            else_case,
        } => {
            let c = d.print_expr(cond)?;
            print_open(d, &format!("if ({}) {{", c), then_case)?;
            if let Some(else_case) = else_case {
                d.printer().line("} else {");
                print_nested(d, else_case)?;
            }
            d.printer().line("}");
            Ok(())
        }
        StmtKind::Seq(stmts) => {
            for st in stmts {
                d.print_stmt(st)?;
            }
            Ok(())
        }
        StmtKind::Evaluate(value) => {
            if value.as_int().is_some() {
                return Ok(());
            }
            if let ExprKind::Call {
                op: CallOp::Builtin(Builtin::StorageSync),
                args,
            } = &value.kind
            {
                return d
                    .print_storage_sync(args)
                    .map_err(|diag| diag.or_span(value.span));
            }
            let text = d.print_expr(value)?;
            if !text.is_empty() {
                d.printer().line(&format!("{};", text));
            }
            Ok(())
        }
    }
}

fn print_store<D: Dialect + ?Sized>(
    d: &mut D,
    buffer: &Var,
    index: &Expr,
    value: &Expr,
) -> Result<(), Diagnostic> {
    let name = d.printer().var_id(buffer)?;
    let t = value.dtype;
    let handle = d.printer().handle_type(buffer.id);

    if index.dtype.is_scalar() {
        let target = if handle.is_none() || handle == Some(t) {
            format!("{}[{}]", name, d.print_expr(index)?)
        } else {
            let ty = d.print_type(t)?;
            format!("(({}*){})[{}]", ty, name, d.print_expr(index)?)
        };
        let v = d.print_expr(value)?;
        d.printer().line(&format!("{} = {};", target, v));
        return Ok(());
    }

    if let Some(base) = contiguous_base(index, t.lanes) {
        let ty = d.print_type(t)?;
        let base = d.print_expr(base)?;
        let v = d.print_expr(value)?;
        d.printer()
            .line(&format!("(({}*)({} + {}))[0] = {};", ty, name, base, v));
        return Ok(());
    }

    // Scatter: one scalar store per lane.
    let v = d.print_expr(value)?;
    let v = ssa_bind(d, v, t)?;
    let idx = d.print_expr(index)?;
    let idx = ssa_bind(d, idx, index.dtype)?;
    for i in 0..t.lanes {
        let lane_index = d.vec_elem_load(&idx, index.dtype, i)?;
        let lane_value = d.vec_elem_load(&v, t, i)?;
        d.printer()
            .line(&format!("{}[{}] = {};", name, lane_index, lane_value));
    }
    Ok(())
}

/// `header` line, indented body, closing brace.
pub fn print_block<D: Dialect + ?Sized>(
    d: &mut D,
    header: &str,
    body: &Stmt,
) -> Result<(), Diagnostic> {
    print_open(d, header, body)?;
    d.printer().line("}");
    Ok(())
}

fn print_open<D: Dialect + ?Sized>(d: &mut D, header: &str, body: &Stmt) -> Result<(), Diagnostic> {
    d.printer().line(header);
    print_nested(d, body)
}

fn print_nested<D: Dialect + ?Sized>(d: &mut D, body: &Stmt) -> Result<(), Diagnostic> {
    let scope = d.printer().begin_scope();
    d.printer().enter();
    let result = d.print_stmt(body);
    d.printer().exit();
    d.printer().end_scope(scope);
    result
}

// ─── Functions ────────────────────────────────────────────────────

/// Print one kernel definition into the body region.
pub fn add_function<D: Dialect + ?Sized>(d: &mut D, kernel: &Kernel) -> Result<(), Diagnostic> {
    let restrict = d.restrict_keyword();
    let fname = d.printer().fresh_name(&kernel.name);
    let mut params = Vec::with_capacity(kernel.params.len());
    for p in &kernel.params {
        let name = d
            .printer()
            .alloc_var_id(&p.var)
            .map_err(|diag| diag.or_span(kernel.span))?;
        let text = if p.var.dtype.is_handle() {
            match p.elem {
                Some(elem) => {
                    let ty = d.print_type(elem).map_err(|diag| diag.or_span(kernel.span))?;
                    d.printer().register_handle_type(p.var.id, elem);
                    if restrict.is_empty() {
                        format!("{}* {}", ty, name)
                    } else {
                        format!("{}* {} {}", ty, restrict, name)
                    }
                }
                None => format!("void* {}", name),
            }
        } else {
            let ty = d
                .print_type(p.var.dtype)
                .map_err(|diag| diag.or_span(kernel.span))?;
            format!("{} {}", ty, name)
        };
        params.push(text);
    }

    let header = format!("{} {}({}) {{", d.func_prefix(), fname, params.join(", "));
    print_block(d, &header, &kernel.body)?;
    d.printer().body.push('\n');
    Ok(())
}
