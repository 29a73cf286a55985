//! Reader for the `.tir` S-expression rendering of the kernel IR.
//!
//! Parsing is two-step: tokens are first read into a tree of
//! [`Sexp`] nodes (balanced parentheses), then each top-level `kernel`
//! form is converted into IR. Errors inside one kernel do not stop the
//! other kernels from being checked.
//!
//! ```text
//! (kernel vadd (param A (ptr float32)) (param B (ptr float32))
//!   (thread tx threadIdx.x 64
//!     (store B (ramp (* tx 4) 1 4) (+ (load float32x4 A (ramp (* tx 4) 1 4))
//!                                     (broadcast (const float32 1.0) 4)))))
//! ```

mod expr;
mod items;
#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};

use crate::diagnostic::Diagnostic;
use crate::ir::{DataType, Module, Var, VarAllocator, VarId};
use crate::span::{Span, Spanned};

use super::lexer::{Lexeme, Lexer};

/// One node of the S-expression tree.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Sexp {
    Atom(String),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Spanned<Sexp>>),
}

/// Parse a whole `.tir` file into a module.
pub fn parse_module(source: &str) -> Result<Module, Vec<Diagnostic>> {
    let (tokens, lex_errors) = Lexer::new(source).tokenize();
    if !lex_errors.is_empty() {
        return Err(lex_errors);
    }
    let forms = read_forms(&tokens)?;

    let mut parser = Parser::new();
    let mut module = Module::default();
    let mut errors = Vec::new();
    for form in &forms {
        match parser.parse_kernel(form) {
            Ok(kernel) => module.kernels.push(kernel),
            Err(e) => errors.push(e),
        }
    }
    if errors.is_empty() {
        Ok(module)
    } else {
        Err(errors)
    }
}

// ─── Reader ───────────────────────────────────────────────────────

fn read_forms(tokens: &[Spanned<Lexeme>]) -> Result<Vec<Spanned<Sexp>>, Vec<Diagnostic>> {
    let mut pos = 0;
    let mut forms = Vec::new();
    let mut errors = Vec::new();
    while tokens[pos].node != Lexeme::Eof {
        match read_one(tokens, &mut pos) {
            Ok(form) => forms.push(form),
            Err(e) => {
                errors.push(e);
                break;
            }
        }
    }
    if errors.is_empty() {
        Ok(forms)
    } else {
        Err(errors)
    }
}

fn read_one(tokens: &[Spanned<Lexeme>], pos: &mut usize) -> Result<Spanned<Sexp>, Diagnostic> {
    let tok = &tokens[*pos];
    let node = match &tok.node {
        Lexeme::LParen => {
            let open = tok.span;
            *pos += 1;
            let mut items = Vec::new();
            loop {
                match &tokens[*pos].node {
                    Lexeme::RParen => {
                        let span = open.merge(tokens[*pos].span);
                        *pos += 1;
                        return Ok(Spanned::new(Sexp::List(items), span));
                    }
                    Lexeme::Eof => {
                        return Err(Diagnostic::error("unclosed '('".to_string(), open)
                            .with_help("every '(' needs a matching ')'".to_string()));
                    }
                    _ => items.push(read_one(tokens, pos)?),
                }
            }
        }
        Lexeme::RParen => {
            return Err(Diagnostic::error("unexpected ')'".to_string(), tok.span));
        }
        Lexeme::Atom(s) => Sexp::Atom(s.clone()),
        Lexeme::Int(v) => Sexp::Int(*v),
        Lexeme::Float(v) => Sexp::Float(*v),
        Lexeme::Str(s) => Sexp::Str(s.clone()),
        Lexeme::Eof => {
            return Err(Diagnostic::error(
                format!("expected a form, found {}", tok.node.describe()),
                tok.span,
            ));
        }
    };
    *pos += 1;
    Ok(Spanned::new(node, tok.span))
}

// ─── IR builder ───────────────────────────────────────────────────

pub(crate) struct Parser {
    vars: VarAllocator,
    /// Names visible in the kernel being built. Later bindings shadow
    /// earlier ones.
    names: HashMap<String, Var>,
    allocated: HashSet<VarId>,
}

impl Parser {
    fn new() -> Self {
        Self {
            vars: VarAllocator::new(),
            names: HashMap::new(),
            allocated: HashSet::new(),
        }
    }

    /// Introduce a new variable, shadowing any previous one of that name.
    fn declare(&mut self, name: &str, dtype: DataType) -> Var {
        let var = self.vars.var(name, dtype);
        self.names.insert(name.to_string(), var.clone());
        var
    }

    fn lookup(&self, name: &str, span: Span) -> Result<Var, Diagnostic> {
        self.names
            .get(name)
            .cloned()
            .ok_or_else(|| Diagnostic::error(format!("unknown variable '{}'", name), span))
    }

    /// Buffer variable named by an annotation or allocation. Annotations
    /// usually wrap the allocation they describe, so the first mention
    /// declares the buffer.
    fn buffer(&mut self, name: &str) -> Var {
        match self.names.get(name) {
            Some(var) => var.clone(),
            None => self.declare(name, DataType::handle()),
        }
    }
}

// ─── Shape helpers ────────────────────────────────────────────────

fn expect_list<'a>(sexp: &'a Spanned<Sexp>, what: &str) -> Result<&'a [Spanned<Sexp>], Diagnostic> {
    match &sexp.node {
        Sexp::List(items) => Ok(items),
        _ => Err(Diagnostic::error(format!("expected {}", what), sexp.span)),
    }
}

fn expect_atom<'a>(sexp: &'a Spanned<Sexp>, what: &str) -> Result<&'a str, Diagnostic> {
    match &sexp.node {
        Sexp::Atom(s) => Ok(s),
        _ => Err(Diagnostic::error(format!("expected {}", what), sexp.span)),
    }
}

fn expect_int(sexp: &Spanned<Sexp>, what: &str) -> Result<i64, Diagnostic> {
    match &sexp.node {
        Sexp::Int(v) => Ok(*v),
        _ => Err(Diagnostic::error(format!("expected {}", what), sexp.span)),
    }
}

fn expect_dtype(sexp: &Spanned<Sexp>) -> Result<DataType, Diagnostic> {
    let text = expect_atom(sexp, "a data type")?;
    text.parse::<DataType>()
        .map_err(|e| Diagnostic::error(e, sexp.span))
}

fn expect_lanes(sexp: &Spanned<Sexp>) -> Result<u16, Diagnostic> {
    let v = expect_int(sexp, "a lane count")?;
    u16::try_from(v)
        .ok()
        .filter(|l| *l > 0)
        .ok_or_else(|| Diagnostic::error(format!("invalid lane count {}", v), sexp.span))
}

/// Head symbol of a list form, if any.
fn head(items: &[Spanned<Sexp>]) -> Option<&str> {
    match items.first().map(|s| &s.node) {
        Some(Sexp::Atom(s)) => Some(s),
        _ => None,
    }
}

/// Check that a form has exactly `n` operands after its head.
fn operands(items: &[Spanned<Sexp>], n: usize, form: &str, span: Span) -> Result<(), Diagnostic> {
    if items.len() == n + 1 {
        Ok(())
    } else {
        Err(Diagnostic::error(
            format!(
                "'{}' expects {} operands, found {}",
                form,
                n,
                items.len().saturating_sub(1)
            ),
            span,
        ))
    }
}
