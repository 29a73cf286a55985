use super::*;
use crate::ir::{AttrKey, Builtin, CallOp, ExprKind, ForKind, StmtKind};

fn parse_one(source: &str) -> crate::ir::Kernel {
    let module = parse_module(source).unwrap_or_else(|errs| panic!("parse errors: {:?}", errs));
    assert_eq!(module.kernels.len(), 1);
    module.kernels.into_iter().next().unwrap()
}

fn first_error(source: &str) -> Diagnostic {
    parse_module(source).unwrap_err().remove(0)
}

#[test]
fn test_parse_kernel_params() {
    let k = parse_one("(kernel f (param A (ptr float16)) (param n int32) (param H handle) (seq))");
    assert_eq!(k.name, "f");
    assert_eq!(k.params.len(), 3);
    assert_eq!(k.params[0].var.dtype, DataType::handle());
    assert_eq!(k.params[0].elem, Some(DataType::float16()));
    assert_eq!(k.params[1].var.dtype, DataType::int32());
    assert_eq!(k.params[1].elem, None);
    assert_eq!(k.params[2].elem, None);
}

#[test]
fn test_parse_vector_store() {
    let k = parse_one(
        "(kernel f (param A (ptr float32)) (param B (ptr float32))
           (store B (ramp 0 1 4) (+ (load float32x4 A (ramp 0 1 4)) (broadcast 1.0 4))))",
    );
    let StmtKind::Store { buffer, index, value } = &k.body.kind else {
        panic!("expected a store, got {:?}", k.body.kind);
    };
    assert_eq!(buffer.id, k.params[1].var.id);
    assert_eq!(index.dtype, DataType::int32().with_lanes(4));
    assert_eq!(value.dtype, DataType::float32().with_lanes(4));
    assert!(!k.body.span.is_dummy());
}

#[test]
fn test_parse_loops_and_threads() {
    let k = parse_one(
        "(kernel f (param A (ptr int32))
           (thread tx threadIdx.x 32
             (for i 0 8 unrolled (store A (+ tx i) i))))",
    );
    let StmtKind::Attr { key, node, body, .. } = &k.body.kind else {
        panic!("expected thread attr");
    };
    assert_eq!(key, &AttrKey::ThreadExtent("threadIdx.x".to_string()));
    assert_eq!(node.name, "tx");
    let StmtKind::For { kind, var, .. } = &body.kind else {
        panic!("expected loop");
    };
    assert_eq!(*kind, ForKind::Unrolled);
    assert_eq!(var.dtype, DataType::int32());
}

#[test]
fn test_parse_annotations_share_buffer_with_allocation() {
    let k = parse_one(
        "(kernel f
           (attr storage_scope S \"shared\"
             (allocate S float16x4 16 (eval 0))))",
    );
    let StmtKind::Attr { key, node, value, body } = &k.body.kind else {
        panic!("expected attr");
    };
    assert_eq!(key, &AttrKey::StorageScope);
    assert_eq!(value.as_str(), Some("shared"));
    let StmtKind::Allocate { buffer, dtype, extents, .. } = &body.kind else {
        panic!("expected allocate");
    };
    assert_eq!(buffer.id, node.id);
    assert_eq!(*dtype, DataType::float16().with_lanes(4));
    assert_eq!(extents[0].as_int(), Some(16));
}

#[test]
fn test_parse_builtin_calls() {
    let k = parse_one(
        "(kernel f (param x float32)
           (seq
             (eval (call tvm_storage_sync \"shared\"))
             (let y (call float32 tvm_warp_shuffle (call tvm_warp_activemask) x 0 32 32)
               (eval (call_extern float32 \"expf\" y)))))",
    );
    let StmtKind::Seq(stmts) = &k.body.kind else {
        panic!("expected seq");
    };
    let StmtKind::Evaluate(sync) = &stmts[0].kind else {
        panic!("expected evaluate");
    };
    assert!(matches!(
        &sync.kind,
        ExprKind::Call { op: CallOp::Builtin(Builtin::StorageSync), args } if args.len() == 1
    ));
    let StmtKind::Let { value, body, .. } = &stmts[1].kind else {
        panic!("expected let");
    };
    assert_eq!(value.dtype, DataType::float32());
    let StmtKind::Evaluate(ext) = &body.kind else {
        panic!("expected evaluate");
    };
    assert!(matches!(&ext.kind, ExprKind::Call { op: CallOp::CallExtern, args } if args.len() == 2));
}

#[test]
fn test_parse_float_constants() {
    let k = parse_one(
        "(kernel f (param A (ptr float32))
           (seq (store A 0 (const float32 inf))
                (store A 1 (const float16 -inf))
                (store A 2 (const float64 nan))
                (store A 3 (const int8 -3))))",
    );
    let StmtKind::Seq(stmts) = &k.body.kind else {
        panic!("expected seq");
    };
    let values: Vec<&ExprKind> = stmts
        .iter()
        .map(|s| match &s.kind {
            StmtKind::Store { value, .. } => &value.kind,
            other => panic!("expected store, got {:?}", other),
        })
        .collect();
    assert!(matches!(values[0], ExprKind::FloatImm(v) if v.is_infinite() && *v > 0.0));
    assert!(matches!(values[1], ExprKind::FloatImm(v) if v.is_infinite() && *v < 0.0));
    assert!(matches!(values[2], ExprKind::FloatImm(v) if v.is_nan()));
    assert!(matches!(values[3], ExprKind::IntImm(-3)));
}

#[test]
fn test_parse_multiple_kernels_share_id_space() {
    let module = parse_module("(kernel a (param x int32) (seq)) (kernel b (param x int32) (seq))")
        .unwrap();
    assert_eq!(module.kernels.len(), 2);
    assert_ne!(
        module.kernels[0].params[0].var.id,
        module.kernels[1].params[0].var.id
    );
}

#[test]
fn test_parse_error_unknown_variable() {
    let src = "(kernel f (store B 0 1))";
    let err = first_error(src);
    assert!(err.message.contains("unknown variable 'B'"));
    assert_eq!(&src[err.span.range()], "B");
}

#[test]
fn test_parse_error_unbalanced() {
    assert!(first_error("(kernel f (seq)").message.contains("unclosed"));
    assert!(first_error("(kernel f (seq)))").message.contains("unexpected ')'"));
}

#[test]
fn test_parse_error_unknown_forms() {
    let err = first_error("(kernel f (loop i 0 4 (seq)))");
    assert!(err.message.contains("unknown statement form 'loop'"));
    assert!(err.help.is_some());

    let err = first_error("(kernel f (eval (call tvm_teleport 1)))");
    assert!(err.message.contains("unknown builtin 'tvm_teleport'"));

    let err = first_error("(kernel f (eval (cast quad32 1)))");
    assert!(err.message.contains("unknown data type 'quad32'"));
}

#[test]
fn test_parse_error_double_allocation() {
    let err = first_error(
        "(kernel f (seq (allocate S int32 4 (eval 0)) (allocate S int32 4 (eval 0))))",
    );
    assert!(err.message.contains("allocated twice"));
}

#[test]
fn test_parse_collects_errors_per_kernel() {
    let errs = parse_module("(kernel a (store X 0 1)) (kernel b (store Y 0 1))").unwrap_err();
    assert_eq!(errs.len(), 2);
}
