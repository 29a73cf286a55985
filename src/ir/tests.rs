use super::*;

#[test]
fn test_dtype_parse_and_display() {
    for text in [
        "int8", "uint8x4", "float16x4", "float32", "int1x32", "uint4x8", "bool", "boolx4",
        "handle", "int64x2",
    ] {
        let t: DataType = text.parse().unwrap();
        assert_eq!(t.to_string(), text);
    }
    let t: DataType = "float16x8".parse().unwrap();
    assert_eq!(t, DataType::float16().with_lanes(8));
    assert!(t.is_float16());
    assert!(t.is_vector());
}

#[test]
fn test_dtype_parse_rejects_garbage() {
    assert!("float".parse::<DataType>().is_err());
    assert!("int8x0".parse::<DataType>().is_err());
    assert!("int0".parse::<DataType>().is_err());
    assert!("quad32".parse::<DataType>().is_err());
    assert!("int8xq".parse::<DataType>().is_err());
}

#[test]
fn test_sub_byte() {
    assert!(DataType::int(4).is_sub_byte());
    assert!(DataType::uint(4).is_sub_byte());
    assert!(DataType::int(1).is_sub_byte());
    assert!(!DataType::int(8).is_sub_byte());
    assert!(!DataType::bool().is_sub_byte());
}

#[test]
fn test_storage_scope_roundtrip() {
    for text in [
        "global",
        "shared",
        "local",
        "wmma.matrix_a",
        "wmma.matrix_b",
        "wmma.accumulator",
        "mma.matrix_a",
        "mma.matrix_b",
        "mma.accumulator",
    ] {
        let scope: StorageScope = text.parse().unwrap();
        assert_eq!(scope.to_string(), text);
    }
    assert!("texture".parse::<StorageScope>().is_err());
    assert_eq!(
        "mma.accumulator".parse::<StorageScope>().unwrap(),
        StorageScope::Fragment(FragmentFamily::Mma, FragmentRole::Accumulator)
    );
}

#[test]
fn test_fragment_shape_parse() {
    let s: FragmentShape = "16, 8, 8".parse().unwrap();
    assert_eq!((s.m, s.n, s.k), (16, 8, 8));
    assert_eq!(s.tile_elems(FragmentRole::MatrixA), 128);
    assert_eq!(s.tile_elems(FragmentRole::MatrixB), 64);
    assert_eq!(s.tile_elems(FragmentRole::Accumulator), 128);
    assert_eq!(s.to_string(), "16, 8, 8");

    let wide: FragmentShape = "4294967295, 1, 4294967295".parse().unwrap();
    assert_eq!(wide.tile_elems(FragmentRole::MatrixA), 18446744065119617025);

    assert!("16,16,16".parse::<FragmentShape>().is_ok());
    assert!("16, 16".parse::<FragmentShape>().is_err());
    assert!("16, x, 16".parse::<FragmentShape>().is_err());
    assert!("16, 0, 16".parse::<FragmentShape>().is_err());
}

#[test]
fn test_layout_parse() {
    assert_eq!("row_major".parse::<Layout>().unwrap(), Layout::RowMajor);
    assert_eq!("col-major".parse::<Layout>().unwrap(), Layout::ColMajor);
    assert!("diagonal".parse::<Layout>().is_err());
}

#[test]
fn test_builtin_lookup_and_arity() {
    let b = Builtin::from_name("tvm_ldmatrix_x2_sync").unwrap();
    assert_eq!(b, Builtin::LdmatrixX2Sync);
    assert!(b.arity().accepts(10));
    assert!(!b.arity().accepts(9));
    assert!(Builtin::StorageSync.arity().accepts(1));
    assert!(Builtin::StorageSync.arity().accepts(3));
    assert!(!Builtin::StorageSync.arity().accepts(2));
    assert_eq!(Builtin::StorageSync.arity().to_string(), "1 or 3");
    assert!(Builtin::from_name("tvm_launch_rockets").is_none());
}

#[test]
fn test_binary_result_types() {
    let mut vars = VarAllocator::new();
    let a = vars.var("a", DataType::float32().with_lanes(4));
    let sum = Expr::binary(BinaryOp::Add, Expr::var(&a), Expr::var(&a));
    assert_eq!(sum.dtype, DataType::float32().with_lanes(4));
    let cmp = Expr::binary(BinaryOp::Lt, Expr::var(&a), Expr::var(&a));
    assert_eq!(cmp.dtype, DataType::bool().with_lanes(4));
    assert_eq!(BinaryOp::from_token("max"), Some(BinaryOp::Max));
    assert_eq!(BinaryOp::from_token("<<"), Some(BinaryOp::Shl));
}

#[test]
fn test_var_allocator_unique_ids() {
    let mut vars = VarAllocator::new();
    let a = vars.var("A", DataType::handle());
    let b = vars.var("A", DataType::handle());
    assert_ne!(a.id, b.id);
}
