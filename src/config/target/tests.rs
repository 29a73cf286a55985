use super::*;

#[test]
fn test_cuda_defaults() {
    let target = CudaTarget::cuda();
    assert_eq!(target.name, "cuda");
    assert_eq!(target.arch, None);
    assert_eq!(target.long_bits, 64);
    assert!(target.restrict);
    assert_eq!(target.output_extension, ".cu");
    assert_eq!(target.supports(NATIVE_HALF_ARCH), None);
}

#[test]
fn test_resolve_builtin_sm() {
    let target = CudaTarget::resolve("sm_80").unwrap();
    assert_eq!(target.name, "sm_80");
    assert_eq!(target.arch, Some(80));
    assert_eq!(target.supports(NATIVE_HALF_ARCH), Some(true));
    assert_eq!(CudaTarget::resolve("sm_50").unwrap().supports(53), Some(false));
    assert_eq!(CudaTarget::resolve("ptx").unwrap(), CudaTarget::cuda());
}

#[test]
fn test_resolve_rejects_path_traversal() {
    assert!(CudaTarget::resolve("../etc/passwd").is_err());
    assert!(CudaTarget::resolve("./sneaky").is_err());
    assert!(CudaTarget::resolve("foo/bar").is_err());
    assert!(CudaTarget::resolve(".hidden").is_err());
}

#[test]
fn test_resolve_unknown_has_help() {
    let err = CudaTarget::resolve("no_such_gpu").unwrap_err();
    assert!(err.message.contains("unknown target 'no_such_gpu'"));
    assert!(err.help.is_some());
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jetson.toml");
    std::fs::write(
        &path,
        r#"
# Embedded board, 32-bit host longs
[target]
name = "jetson"
display_name = "Jetson Nano"
arch = "sm_53"

[codegen]
long_bits = 32
restrict = false
output_extension = ".cuh"
"#,
    )
    .unwrap();

    let target = CudaTarget::load(&path).unwrap();
    assert_eq!(target.name, "jetson");
    assert_eq!(target.display_name, "Jetson Nano");
    assert_eq!(target.arch, Some(53));
    assert_eq!(target.long_bits, 32);
    assert!(!target.restrict);
    assert_eq!(target.output_extension, ".cuh");
}

#[test]
fn test_load_numeric_and_any_arch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.toml");
    std::fs::write(&path, "[target]\nname = \"a\"\narch = 75\n").unwrap();
    let target = CudaTarget::load(&path).unwrap();
    assert_eq!(target.arch, Some(75));
    assert_eq!(target.display_name, "a");

    std::fs::write(&path, "[target]\nname = \"a\"\narch = \"any\"\n").unwrap();
    assert_eq!(CudaTarget::load(&path).unwrap().arch, None);
}

#[test]
fn test_load_rejects_bad_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");

    std::fs::write(&path, "[codegen]\nlong_bits = 64\n").unwrap();
    let err = CudaTarget::load(&path).unwrap_err();
    assert!(err.message.contains("missing target.name"));

    std::fs::write(&path, "[target]\nname = \"x\"\n[codegen]\nlong_bits = 48\n").unwrap();
    let err = CudaTarget::load(&path).unwrap_err();
    assert!(err.message.contains("long_bits must be 32 or 64"));

    std::fs::write(&path, "[target]\nname = \"x\"\narch = \"volta\"\n").unwrap();
    let err = CudaTarget::load(&path).unwrap_err();
    assert!(err.message.contains("invalid target.arch"));
}

#[test]
fn test_load_missing_file() {
    let err = CudaTarget::load(Path::new("/definitely/not/here.toml")).unwrap_err();
    assert!(err.message.contains("cannot read target config"));
}
