use std::collections::{HashMap, HashSet};

use crate::diagnostic::Diagnostic;
use crate::ir::{BufferId, DataType, StorageScope, Var, VarId};
use crate::span::Span;

/// A cached single-assignment binding: the temp holding an already
/// printed expression, valid while the scope it was declared in is open.
struct SsaEntry {
    vid: String,
    scope_id: usize,
}

/// Shared state of a C-family printer.
///
/// Owns the two text regions of a translation unit: the prologue
/// (declarations that may be appended at any point during traversal)
/// and the body (grows strictly in traversal order).
pub struct CPrinter {
    /// Declarations placed before all kernel bodies.
    pub prologue: String,
    /// Kernel text in traversal order.
    pub body: String,
    indent: usize,
    taken: HashSet<String>,
    counters: HashMap<String, u32>,
    var_ids: HashMap<VarId, String>,
    ssa: HashMap<String, SsaEntry>,
    /// Open/closed flag per scope id; scope 0 is the translation unit.
    scope_open: Vec<bool>,
    scope_stack: Vec<usize>,
    alloc_scopes: HashMap<BufferId, StorageScope>,
    handle_types: HashMap<BufferId, DataType>,
    volatile: HashSet<BufferId>,
    consts: HashSet<String>,
}

impl Default for CPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl CPrinter {
    pub fn new() -> Self {
        Self {
            prologue: String::new(),
            body: String::new(),
            indent: 0,
            taken: HashSet::new(),
            counters: HashMap::new(),
            var_ids: HashMap::new(),
            ssa: HashMap::new(),
            scope_open: vec![true],
            scope_stack: vec![0],
            alloc_scopes: HashMap::new(),
            handle_types: HashMap::new(),
            volatile: HashSet::new(),
            consts: HashSet::new(),
        }
    }

    // ── Names ──

    /// Reserve a fresh identifier. The first request for a prefix gets
    /// the prefix itself, later ones get `prefix1`, `prefix2`, ...
    pub fn fresh_name(&mut self, prefix: &str) -> String {
        let prefix = sanitize(prefix);
        if self.taken.insert(prefix.clone()) {
            return prefix;
        }
        let counter = self.counters.entry(prefix.clone()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}{}", prefix, counter);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// True if `text` is exactly an identifier this printer handed out.
    pub fn is_name(&self, text: &str) -> bool {
        self.taken.contains(text)
    }

    /// Allocate the printed name of a variable on first definition.
    pub fn alloc_var_id(&mut self, var: &Var) -> Result<String, Diagnostic> {
        if self.var_ids.contains_key(&var.id) {
            return Err(Diagnostic::error(
                format!("variable '{}' is defined twice", var.name),
                Span::dummy(),
            ));
        }
        let name = self.fresh_name(&var.name);
        self.var_ids.insert(var.id, name.clone());
        Ok(name)
    }

    /// Bind a variable to an arbitrary expression text (thread indices).
    pub fn bind_var(&mut self, var: &Var, text: String) {
        self.var_ids.insert(var.id, text);
    }

    pub fn is_bound(&self, var: &Var) -> bool {
        self.var_ids.contains_key(&var.id)
    }

    pub fn var_id(&self, var: &Var) -> Result<String, Diagnostic> {
        self.var_ids.get(&var.id).cloned().ok_or_else(|| {
            Diagnostic::error(
                format!("variable '{}' is used before its definition", var.name),
                Span::dummy(),
            )
        })
    }

    // ── Text ──

    pub fn indent(&self) -> String {
        " ".repeat(self.indent)
    }

    /// Append one indented line to the body.
    pub fn line(&mut self, text: &str) {
        self.body.push_str(&self.indent());
        self.body.push_str(text);
        self.body.push('\n');
    }

    /// Append raw text to the prologue.
    pub fn declare(&mut self, text: &str) {
        self.prologue.push_str(text);
    }

    pub fn enter(&mut self) {
        self.indent += 2;
    }

    pub fn exit(&mut self) {
        self.indent = self.indent.saturating_sub(2);
    }

    /// Open a binding scope. Temps bound inside are forgotten when it
    /// closes.
    pub fn begin_scope(&mut self) -> usize {
        let id = self.scope_open.len();
        self.scope_open.push(true);
        self.scope_stack.push(id);
        id
    }

    pub fn end_scope(&mut self, id: usize) {
        self.scope_open[id] = false;
        self.scope_stack.retain(|s| *s != id);
    }

    // ── Single-assignment temps ──

    pub fn ssa_lookup(&self, src: &str) -> Option<String> {
        self.ssa
            .get(src)
            .filter(|e| self.scope_open[e.scope_id])
            .map(|e| e.vid.clone())
    }

    pub fn ssa_insert(&mut self, src: String, vid: String) {
        let scope_id = self.scope_stack.last().copied().unwrap_or(0);
        self.ssa.insert(src, SsaEntry { vid, scope_id });
    }

    // ── Buffer bookkeeping ──

    pub fn record_scope(&mut self, buffer: BufferId, scope: StorageScope) {
        self.alloc_scopes.insert(buffer, scope);
    }

    /// Declared scope of a buffer; buffers without a `storage_scope`
    /// annotation live in registers.
    pub fn scope_of(&self, buffer: BufferId) -> StorageScope {
        self.alloc_scopes
            .get(&buffer)
            .copied()
            .unwrap_or(StorageScope::Local)
    }

    pub fn register_handle_type(&mut self, buffer: BufferId, dtype: DataType) {
        self.handle_types.insert(buffer, dtype);
    }

    pub fn handle_type(&self, buffer: BufferId) -> Option<DataType> {
        self.handle_types.get(&buffer).copied()
    }

    pub fn mark_volatile(&mut self, buffer: BufferId) {
        self.volatile.insert(buffer);
    }

    pub fn is_volatile(&self, buffer: BufferId) -> bool {
        self.volatile.contains(&buffer)
    }

    /// Record a literal as already declared. Returns false if it was.
    pub fn mark_const(&mut self, text: &str) -> bool {
        self.consts.insert(text.to_string())
    }

    pub fn is_const_declared(&self, text: &str) -> bool {
        self.consts.contains(text)
    }

    /// Prologue followed by body.
    pub fn finish(self) -> String {
        let mut out = self.prologue;
        out.push_str(&self.body);
        out
    }
}

/// Make a variable name a valid C identifier.
fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Format like C++ `std::scientific` with six fractional digits:
/// `1.000000e+00`, `-2.500000e-03`, `1.000000e+100`.
pub fn scientific(value: f64) -> String {
    let raw = format!("{:.6e}", value);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => raw,
    }
}
