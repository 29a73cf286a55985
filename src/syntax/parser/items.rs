use crate::diagnostic::Diagnostic;
use crate::ir::{AttrKey, DataType, Expr, ForKind, Kernel, Param, Stmt, StmtKind};
use crate::span::Spanned;

use super::{expect_atom, expect_dtype, expect_list, head, operands, Parser, Sexp};

const STMT_FORMS: &str = "seq, for, if, let, store, allocate, thread, attr, eval";

impl Parser {
    pub(super) fn parse_kernel(&mut self, form: &Spanned<Sexp>) -> Result<Kernel, Diagnostic> {
        let items = expect_list(form, "a '(kernel ...)' form")?;
        if head(items) != Some("kernel") {
            return Err(Diagnostic::error(
                "top-level forms must be '(kernel name params... body)'".to_string(),
                form.span,
            ));
        }
        if items.len() < 3 {
            return Err(Diagnostic::error(
                "kernel needs a name and a body".to_string(),
                form.span,
            ));
        }
        self.names.clear();
        self.allocated.clear();

        let name = expect_atom(&items[1], "a kernel name")?.to_string();
        let mut params = Vec::new();
        for p in &items[2..items.len() - 1] {
            params.push(self.parse_param(p)?);
        }
        let body = self.parse_stmt(&items[items.len() - 1])?;
        Ok(Kernel {
            name,
            params,
            body,
            span: form.span,
        })
    }

    /// `(param n int32)`, `(param A (ptr float16))`, `(param H handle)`.
    fn parse_param(&mut self, form: &Spanned<Sexp>) -> Result<Param, Diagnostic> {
        let items = expect_list(form, "a '(param name type)' form")?;
        if head(items) != Some("param") {
            return Err(Diagnostic::error(
                "kernel parameters must be '(param name type)'".to_string(),
                form.span,
            ));
        }
        operands(items, 2, "param", form.span)?;
        let name = expect_atom(&items[1], "a parameter name")?;
        let (dtype, elem) = match &items[2].node {
            Sexp::List(ptr) if head(ptr) == Some("ptr") => {
                operands(ptr, 1, "ptr", items[2].span)?;
                (DataType::handle(), Some(expect_dtype(&ptr[1])?))
            }
            _ => (expect_dtype(&items[2])?, None),
        };
        let var = self.declare(name, dtype);
        Ok(Param { var, elem })
    }

    pub(super) fn parse_stmt(&mut self, form: &Spanned<Sexp>) -> Result<Stmt, Diagnostic> {
        let items = expect_list(form, "a statement")?;
        let span = form.span;
        let stmt = match head(items) {
            Some("seq") => {
                let mut stmts = Vec::new();
                for s in &items[1..] {
                    stmts.push(self.parse_stmt(s)?);
                }
                Stmt::seq(stmts)
            }
            Some("for") => {
                // (for i MIN EXTENT [serial|unrolled] body)
                if items.len() != 5 && items.len() != 6 {
                    return Err(Diagnostic::error(
                        "'for' expects '(for var min extent [serial|unrolled] body)'".to_string(),
                        span,
                    ));
                }
                let name = expect_atom(&items[1], "a loop variable")?;
                let min = self.parse_expr(&items[2])?;
                let extent = self.parse_expr(&items[3])?;
                let kind = if items.len() == 6 {
                    match expect_atom(&items[4], "a loop kind")? {
                        "serial" => ForKind::Serial,
                        "unrolled" => ForKind::Unrolled,
                        other => {
                            return Err(Diagnostic::error(
                                format!("unknown loop kind '{}'", other),
                                items[4].span,
                            )
                            .with_help("expected 'serial' or 'unrolled'".to_string()))
                        }
                    }
                } else {
                    ForKind::Serial
                };
                let var = self.declare(name, DataType::int32());
                let body = self.parse_stmt(&items[items.len() - 1])?;
                Stmt::new(StmtKind::For {
                    var,
                    min,
                    extent,
                    kind,
                    body: Box::new(body),
                })
            }
            Some("if") => {
                if items.len() != 3 && items.len() != 4 {
                    return Err(Diagnostic::error(
                        "'if' expects '(if cond then [else])'".to_string(),
                        span,
                    ));
                }
                let cond = self.parse_expr(&items[1])?;
                let then_case = self.parse_stmt(&items[2])?;
                let else_case = match items.get(3) {
                    Some(s) => Some(self.parse_stmt(s)?),
                    None => None,
                };
                Stmt::if_then_else(cond, then_case, else_case)
            }
            Some("let") => {
                operands(items, 3, "let", span)?;
                let name = expect_atom(&items[1], "a variable name")?;
                let value = self.parse_expr(&items[2])?;
                let var = self.declare(name, value.dtype);
                let body = self.parse_stmt(&items[3])?;
                Stmt::let_stmt(&var, value, body)
            }
            Some("store") => {
                operands(items, 3, "store", span)?;
                let name = expect_atom(&items[1], "a buffer name")?;
                let buffer = self.lookup(name, items[1].span)?;
                let index = self.parse_expr(&items[2])?;
                let value = self.parse_expr(&items[3])?;
                Stmt::store(&buffer, index, value)
            }
            Some("allocate") => self.parse_allocate(items, form)?,
            Some("thread") => {
                // (thread tx threadIdx.x EXTENT body)
                operands(items, 4, "thread", span)?;
                let name = expect_atom(&items[1], "a thread variable")?;
                let tag = expect_atom(&items[2], "a thread tag such as threadIdx.x")?;
                let extent = self.parse_expr(&items[3])?;
                let var = self.declare(name, DataType::int32());
                let body = self.parse_stmt(&items[4])?;
                Stmt::attr(AttrKey::ThreadExtent(tag.to_string()), &var, extent, body)
            }
            Some("attr") => {
                // (attr KEY NODE VALUE body)
                operands(items, 4, "attr", span)?;
                let key = match expect_atom(&items[1], "an attribute key")? {
                    "storage_scope" => AttrKey::StorageScope,
                    "fragment_shape" => AttrKey::FragmentShape,
                    "fragment_layout" => AttrKey::FragmentLayout,
                    "volatile_scope" => AttrKey::VolatileScope,
                    other => AttrKey::Pragma(other.to_string()),
                };
                let node = self.buffer(expect_atom(&items[2], "an annotated buffer")?);
                let value = self.parse_expr(&items[3])?;
                let body = self.parse_stmt(&items[4])?;
                Stmt::attr(key, &node, value, body)
            }
            Some("eval") => {
                operands(items, 1, "eval", span)?;
                Stmt::evaluate(self.parse_expr(&items[1])?)
            }
            Some(other) => {
                return Err(
                    Diagnostic::error(format!("unknown statement form '{}'", other), span)
                        .with_help(format!("statement forms: {}", STMT_FORMS)),
                )
            }
            None => {
                return Err(Diagnostic::error(
                    "expected a statement form".to_string(),
                    span,
                ))
            }
        };
        Ok(stmt.with_span(span))
    }

    /// `(allocate A T EXTENT body)` where EXTENT is an integer or
    /// `(extents e...)`.
    fn parse_allocate(
        &mut self,
        items: &[Spanned<Sexp>],
        form: &Spanned<Sexp>,
    ) -> Result<Stmt, Diagnostic> {
        operands(items, 4, "allocate", form.span)?;
        let name = expect_atom(&items[1], "a buffer name")?;
        let buffer = self.buffer(name);
        if !self.allocated.insert(buffer.id) {
            return Err(Diagnostic::error(
                format!("buffer '{}' is allocated twice", name),
                form.span,
            )
            .with_help("buffer names must be unique within a kernel".to_string()));
        }
        let dtype = expect_dtype(&items[2])?;
        let extents = match &items[3].node {
            Sexp::List(list) if head(list) == Some("extents") => {
                let mut extents = Vec::new();
                for e in &list[1..] {
                    extents.push(self.parse_expr(e)?);
                }
                extents
            }
            _ => vec![self.parse_expr(&items[3])?],
        };
        let body = self.parse_stmt(&items[4])?;
        Ok(Stmt::new(StmtKind::Allocate {
            buffer,
            dtype,
            extents,
            condition: Expr::const_int(1, DataType::bool()),
            body: Box::new(body),
        }))
    }
}
