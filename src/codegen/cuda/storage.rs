//! Buffer declarations: shared and register arrays, tensor-core fragments.

use std::collections::HashMap;

use tracing::trace;

use super::{CudaCodegen, Features};
use crate::codegen::c::{constant_allocation_size, Dialect};
use crate::diagnostic::Diagnostic;
use crate::ir::{
    BufferId, DataType, Expr, FragmentFamily, FragmentRole, FragmentShape, Layout, Stmt,
    StorageScope, Var,
};
use crate::span::Span;

/// Shape and layout annotations per fragment buffer.
///
/// Filled by `fragment_shape` / `fragment_layout` attributes, which
/// always precede the allocation they describe.
#[derive(Debug, Default)]
pub struct FragmentTable {
    shapes: HashMap<BufferId, FragmentShape>,
    layouts: HashMap<BufferId, Layout>,
}

fn literal<'a>(value: &'a Expr, key: &str) -> Result<&'a str, Diagnostic> {
    value.as_str().ok_or_else(|| {
        Diagnostic::error(format!("{} value must be a string literal", key), value.span)
    })
}

impl FragmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_shape(&mut self, buffer: &Var, value: &Expr) -> Result<(), Diagnostic> {
        let shape: FragmentShape = literal(value, "fragment_shape")?
            .parse()
            .map_err(|m| Diagnostic::error(m, value.span))?;
        trace!(buffer = %buffer.name, %shape, "fragment shape recorded");
        self.shapes.insert(buffer.id, shape);
        Ok(())
    }

    pub fn record_layout(&mut self, buffer: &Var, value: &Expr) -> Result<(), Diagnostic> {
        let layout: Layout = literal(value, "fragment_layout")?
            .parse()
            .map_err(|m| Diagnostic::error(m, value.span))?;
        trace!(buffer = %buffer.name, %layout, "fragment layout recorded");
        self.layouts.insert(buffer.id, layout);
        Ok(())
    }

    pub fn shape(&self, buffer: &Var) -> Result<FragmentShape, Diagnostic> {
        self.shapes.get(&buffer.id).copied().ok_or_else(|| {
            Diagnostic::error(
                format!("fragment '{}' has no fragment_shape annotation", buffer.name),
                Span::dummy(),
            )
            .with_help("annotate the buffer with (attr fragment_shape ...) before allocating it".to_string())
        })
    }

    pub fn layout(&self, buffer: &Var) -> Result<Layout, Diagnostic> {
        self.layouts.get(&buffer.id).copied().ok_or_else(|| {
            Diagnostic::error(
                format!("fragment '{}' has no fragment_layout annotation", buffer.name),
                Span::dummy(),
            )
            .with_help("annotate the buffer with (attr fragment_layout ...) before allocating it".to_string())
        })
    }
}

fn role_name(role: FragmentRole) -> &'static str {
    match role {
        FragmentRole::MatrixA => "matrix_a",
        FragmentRole::MatrixB => "matrix_b",
        FragmentRole::Accumulator => "accumulator",
    }
}

/// Element types the `nvcuda::wmma` API instantiates fragments for.
fn wmma_elem_allowed(role: FragmentRole, t: DataType) -> bool {
    match role {
        FragmentRole::MatrixA | FragmentRole::MatrixB => [
            DataType::float16(),
            DataType::int(8),
            DataType::uint(8),
            DataType::int(4),
            DataType::uint(4),
            DataType::int(1),
        ]
        .contains(&t),
        FragmentRole::Accumulator => {
            [DataType::float16(), DataType::float32(), DataType::int32()].contains(&t)
        }
    }
}

/// Sub-byte element types are named by their experimental precision tag.
fn wmma_precision(t: DataType) -> Option<&'static str> {
    match (t.is_uint(), t.bits) {
        (false, 4) => Some("nvcuda::wmma::experimental::precision::s4"),
        (true, 4) => Some("nvcuda::wmma::experimental::precision::u4"),
        (false, 1) => Some("nvcuda::wmma::experimental::precision::b1"),
        _ => None,
    }
}

fn fragment_count(
    buffer: &Var,
    size: i64,
    shape: FragmentShape,
    role: FragmentRole,
    span: Span,
) -> Result<i64, Diagnostic> {
    let tile = shape.tile_elems(role);
    let whole = u64::try_from(size)
        .ok()
        .filter(|size| size % tile == 0)
        .and_then(|size| i64::try_from(size / tile).ok());
    whole.ok_or_else(|| {
        Diagnostic::error(
            format!(
                "{} elements of fragment '{}' do not fill whole {} tiles of shape {}",
                size,
                buffer.name,
                role_name(role),
                shape
            ),
            span,
        )
        .with_note(format!("each {} tile holds {} elements", role_name(role), tile))
    })
}

impl CudaCodegen {
    pub(super) fn record_fragment_attr(
        &mut self,
        shape: bool,
        node: &Var,
        value: &Expr,
    ) -> Result<(), Diagnostic> {
        if shape {
            self.fragments.record_shape(node, value)
        } else {
            self.fragments.record_layout(node, value)
        }
    }

    pub(super) fn print_allocate(
        &mut self,
        s: &Stmt,
        buffer: &Var,
        dtype: DataType,
        extents: &[Expr],
        condition: &Expr,
        body: &Stmt,
    ) -> Result<(), Diagnostic> {
        let size = constant_allocation_size(extents, condition, s.span)?;
        let scope = self.c.scope_of(buffer.id);

        let decl = match scope {
            StorageScope::Global => {
                return Err(Diagnostic::error(
                    format!("cannot allocate '{}' in global memory", buffer.name),
                    s.span,
                )
                .with_help("pass global arrays as kernel parameters".to_string()))
            }
            StorageScope::Shared | StorageScope::Local => {
                let qualifier = self.storage_qualifier(scope)?;
                let ty = self.spell(dtype)?;
                let mut count = size;
                // Sub-byte shared arrays are declared in 32-bit words.
                if scope == StorageScope::Shared
                    && [DataType::int(4), DataType::uint(4), DataType::int(1)].contains(&dtype)
                {
                    let per_word = i64::from(32 / dtype.bits);
                    count = (size + per_word - 1) / per_word;
                }
                let name = self.c.alloc_var_id(buffer)?;
                format!("{}{} {}[{}];", qualifier, ty, name, count)
            }
            StorageScope::Fragment(FragmentFamily::Wmma, role) => {
                if !wmma_elem_allowed(role, dtype) {
                    return Err(Diagnostic::error(
                        format!(
                            "wmma.{} fragments cannot hold {} elements",
                            role_name(role),
                            dtype
                        ),
                        s.span,
                    ));
                }
                let shape = self.fragments.shape(buffer)?;
                let count = fragment_count(buffer, size, shape, role, s.span)?;
                let elem = match wmma_precision(dtype) {
                    Some(tag) => tag.to_string(),
                    None => self.spell(dtype)?,
                };
                let ty = match role {
                    FragmentRole::Accumulator => format!(
                        "nvcuda::wmma::fragment<nvcuda::wmma::accumulator, {}, {}>",
                        shape, elem
                    ),
                    _ => {
                        let layout = self.fragments.layout(buffer)?;
                        format!(
                            "nvcuda::wmma::fragment<nvcuda::wmma::{}, {}, {}, nvcuda::wmma::{}>",
                            role_name(role),
                            shape,
                            elem,
                            layout
                        )
                    }
                };
                self.enable(Features::MMA_HEADER);
                let name = self.c.alloc_var_id(buffer)?;
                format!("{} {}[{}];", ty, name, count)
            }
            StorageScope::Fragment(FragmentFamily::Mma, role) => {
                let expected = match role {
                    FragmentRole::Accumulator => DataType::float32(),
                    _ => DataType::float16(),
                };
                if dtype != expected {
                    return Err(Diagnostic::error(
                        format!(
                            "mma.{} fragments must hold {}, not {}",
                            role_name(role),
                            expected,
                            dtype
                        ),
                        s.span,
                    ));
                }
                let shape = self.fragments.shape(buffer)?;
                let count = fragment_count(buffer, size, shape, role, s.span)?;
                self.enable(Features::FP16);
                let name = self.c.alloc_var_id(buffer)?;
                match role {
                    FragmentRole::MatrixA => format!("int {}[{}][2];", name, count),
                    FragmentRole::MatrixB => format!("int {}[{}];", name, count),
                    FragmentRole::Accumulator => format!("float {}[{}][4];", name, count),
                }
            }
        };

        self.c.line(&decl);
        self.c.register_handle_type(buffer.id, dtype);
        self.print_stmt(body)
    }
}
