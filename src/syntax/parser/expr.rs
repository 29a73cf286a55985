use crate::diagnostic::Diagnostic;
use crate::ir::{BinaryOp, Builtin, CallOp, DataType, Expr};
use crate::span::Spanned;

use super::{expect_atom, expect_dtype, expect_lanes, expect_list, head, operands, Parser, Sexp};

impl Parser {
    pub(super) fn parse_expr(&mut self, form: &Spanned<Sexp>) -> Result<Expr, Diagnostic> {
        let span = form.span;
        let expr = match &form.node {
            Sexp::Int(v) => Expr::int(*v),
            Sexp::Float(v) => Expr::float(*v, DataType::float32()),
            Sexp::Str(s) => Expr::string(s.clone()),
            Sexp::Atom(name) => match name.as_str() {
                "true" => Expr::const_int(1, DataType::bool()),
                "false" => Expr::const_int(0, DataType::bool()),
                _ => Expr::var(&self.lookup(name, span)?),
            },
            Sexp::List(items) => self.parse_compound(items, form)?,
        };
        Ok(expr.with_span(span))
    }

    fn parse_compound(
        &mut self,
        items: &[Spanned<Sexp>],
        form: &Spanned<Sexp>,
    ) -> Result<Expr, Diagnostic> {
        let span = form.span;
        let Some(op) = head(items) else {
            return Err(Diagnostic::error(
                "expected an operator at the head of the expression".to_string(),
                span,
            ));
        };
        let expr = match op {
            "const" => {
                operands(items, 2, "const", span)?;
                let dtype = expect_dtype(&items[1])?;
                self.parse_const(dtype, &items[2])?
            }
            "cast" => {
                operands(items, 2, "cast", span)?;
                let dtype = expect_dtype(&items[1])?;
                Expr::cast(dtype, self.parse_expr(&items[2])?)
            }
            "load" => {
                operands(items, 3, "load", span)?;
                let dtype = expect_dtype(&items[1])?;
                let name = expect_atom(&items[2], "a buffer name")?;
                let buffer = self.lookup(name, items[2].span)?;
                let index = self.parse_expr(&items[3])?;
                Expr::load(dtype, &buffer, index)
            }
            "ramp" => {
                operands(items, 3, "ramp", span)?;
                let base = self.parse_expr(&items[1])?;
                let stride = self.parse_expr(&items[2])?;
                Expr::ramp(base, stride, expect_lanes(&items[3])?)
            }
            "broadcast" => {
                operands(items, 2, "broadcast", span)?;
                let value = self.parse_expr(&items[1])?;
                Expr::broadcast(value, expect_lanes(&items[2])?)
            }
            "shuffle" => {
                // (shuffle (v...) (i...))
                operands(items, 2, "shuffle", span)?;
                let vectors = self.parse_expr_list(&items[1], "a list of shuffled vectors")?;
                let indices = self.parse_expr_list(&items[2], "a list of lane indices")?;
                Expr::shuffle(vectors, indices)
            }
            "select" => {
                operands(items, 3, "select", span)?;
                let cond = self.parse_expr(&items[1])?;
                let then_value = self.parse_expr(&items[2])?;
                let else_value = self.parse_expr(&items[3])?;
                Expr::select(cond, then_value, else_value)
            }
            "!" | "not" => {
                operands(items, 1, op, span)?;
                Expr::not(self.parse_expr(&items[1])?)
            }
            "call" => self.parse_builtin_call(items, form)?,
            "extern" => {
                // (extern T symbol args...)
                if items.len() < 3 {
                    return Err(Diagnostic::error(
                        "'extern' expects '(extern type symbol args...)'".to_string(),
                        span,
                    ));
                }
                let dtype = expect_dtype(&items[1])?;
                let symbol = expect_atom(&items[2], "a function name")?.to_string();
                let args = self.parse_args(&items[3..])?;
                Expr::call(dtype, CallOp::Extern(symbol), args)
            }
            "call_extern" => {
                // (call_extern T "symbol" args...)
                if items.len() < 3 {
                    return Err(Diagnostic::error(
                        "'call_extern' expects '(call_extern type \"symbol\" args...)'"
                            .to_string(),
                        span,
                    ));
                }
                let dtype = expect_dtype(&items[1])?;
                let args = self.parse_args(&items[2..])?;
                if args[0].as_str().is_none() {
                    return Err(Diagnostic::error(
                        "call_extern symbol must be a string literal".to_string(),
                        items[2].span,
                    ));
                }
                Expr::call(dtype, CallOp::CallExtern, args)
            }
            _ => match BinaryOp::from_token(op) {
                Some(bin) => {
                    operands(items, 2, op, span)?;
                    let lhs = self.parse_expr(&items[1])?;
                    let rhs = self.parse_expr(&items[2])?;
                    Expr::binary(bin, lhs, rhs)
                }
                None => {
                    return Err(Diagnostic::error(
                        format!("unknown expression form '{}'", op),
                        items[0].span,
                    ))
                }
            },
        };
        Ok(expr)
    }

    /// `(call tvm_name args...)` or `(call T tvm_name args...)` when the
    /// builtin produces a value.
    fn parse_builtin_call(
        &mut self,
        items: &[Spanned<Sexp>],
        form: &Spanned<Sexp>,
    ) -> Result<Expr, Diagnostic> {
        let mut rest = &items[1..];
        let mut dtype = DataType::handle();
        if let Some(Sexp::Atom(first)) = rest.first().map(|s| &s.node) {
            if let Ok(t) = first.parse::<DataType>() {
                dtype = t;
                rest = &rest[1..];
            }
        }
        let Some(name_form) = rest.first() else {
            return Err(Diagnostic::error(
                "'call' expects a builtin name".to_string(),
                form.span,
            ));
        };
        let name = expect_atom(name_form, "a builtin name")?;
        let builtin = Builtin::from_name(name).ok_or_else(|| {
            Diagnostic::error(format!("unknown builtin '{}'", name), name_form.span).with_help(
                "use '(extern type symbol args...)' for external functions".to_string(),
            )
        })?;
        let args = self.parse_args(&rest[1..])?;
        Ok(Expr::call(dtype, CallOp::Builtin(builtin), args))
    }

    fn parse_args(&mut self, forms: &[Spanned<Sexp>]) -> Result<Vec<Expr>, Diagnostic> {
        let mut args = Vec::with_capacity(forms.len());
        for f in forms {
            args.push(self.parse_expr(f)?);
        }
        Ok(args)
    }

    fn parse_expr_list(
        &mut self,
        form: &Spanned<Sexp>,
        what: &str,
    ) -> Result<Vec<Expr>, Diagnostic> {
        let items = expect_list(form, what)?;
        self.parse_args(items)
    }

    /// `(const T v)`: `v` is an integer, a float, or one of
    /// `inf`, `-inf`, `nan`.
    fn parse_const(&mut self, dtype: DataType, value: &Spanned<Sexp>) -> Result<Expr, Diagnostic> {
        let expr = match (&value.node, dtype.is_float()) {
            (Sexp::Int(v), false) => Expr::const_int(*v, dtype),
            (Sexp::Int(v), true) => Expr::float(*v as f64, dtype),
            (Sexp::Float(v), true) => Expr::float(*v, dtype),
            (Sexp::Atom(a), true) => {
                let v = match a.as_str() {
                    "inf" => f64::INFINITY,
                    "-inf" => f64::NEG_INFINITY,
                    "nan" => f64::NAN,
                    _ => {
                        return Err(Diagnostic::error(
                            format!("invalid float constant '{}'", a),
                            value.span,
                        ))
                    }
                };
                Expr::float(v, dtype)
            }
            _ => {
                return Err(Diagnostic::error(
                    format!("invalid constant for type {}", dtype),
                    value.span,
                ))
            }
        };
        Ok(expr)
    }
}
