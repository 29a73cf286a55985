use std::path::Path;
use std::process::Command;

use cudagen::{compile_source_silent, CudaSource, CudaTarget};

fn lower_demo(name: &str, target: &CudaTarget) -> CudaSource {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join(name);
    let source = std::fs::read_to_string(&path).expect("read demo");
    compile_source_silent(&source, name, target).unwrap_or_else(|errs| {
        panic!(
            "{} should lower, got {} errors: {:?}",
            name,
            errs.len(),
            errs.iter().map(|e| &e.message).collect::<Vec<_>>()
        );
    })
}

fn cudagen() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cudagen"))
}

// ── demos ──

#[test]
fn test_vector_add_demo() {
    let cuda = lower_demo("vector_add.tir", &CudaTarget::cuda());
    let code = &cuda.code;
    assert!(code.starts_with("extern \"C\" __global__ void vadd("), "{}", code);
    assert!(code.contains("float4 _;"));
    assert_eq!(code.matches("((float4*)(A + ").count(), 1);
    assert_eq!(code.matches("((float4*)(B + ").count(), 1);
    for lane in ["x", "y", "z", "w"] {
        assert_eq!(code.matches(&format!("_.{} = ", lane)).count(), 1, "{}", code);
    }
}

#[test]
fn test_gemm_wmma_demo() {
    let cuda = lower_demo("gemm_wmma.tir", &CudaTarget::sm(80));
    let code = &cuda.code;
    assert!(code.contains("#include <mma.h>\n"));
    assert!(code.contains("__shared__ half As[256];"));
    assert!(code.contains(
        "nvcuda::wmma::fragment<nvcuda::wmma::matrix_a, 16, 16, 16, half, nvcuda::wmma::row_major> a_frag[1];"
    ));
    assert!(code.contains(
        "nvcuda::wmma::fragment<nvcuda::wmma::matrix_b, 16, 16, 16, half, nvcuda::wmma::col_major> b_frag[1];"
    ));
    assert!(code.contains("nvcuda::wmma::fragment<nvcuda::wmma::accumulator, 16, 16, 16, float> acc[1];"));
    assert!(code.contains("nvcuda::wmma::mma_sync(acc[0], a_frag[0], b_frag[0], acc[0]);"));
    assert!(code.contains("nvcuda::wmma::store_matrix_sync(C, acc[0], 16, nvcuda::wmma::mem_row_major);"));
    assert!(code.contains("#pragma unroll\n"));
    assert!(code.contains("__syncthreads();"));
}

#[test]
fn test_mma_compact_demo() {
    let cuda = lower_demo("mma_compact.tir", &CudaTarget::sm(80));
    let code = &cuda.code;
    assert!(code.contains("int a_frag[1][2];"));
    assert!(code.contains("int b_frag[1];"));
    assert!(code.contains("float acc[1][4];"));
    assert!(code.contains("mma_accumulator_init_float((float4 *) (acc[0]));"));
    assert!(code.contains("mma_ldmatrix_x2_half(As, 8, a_frag[0], 0);"));
    assert!(code.contains("mma_ldmatrix_x1_half(Bs, 8, b_frag[0], 0);"));
    assert!(code.contains("mma_sync_m16n8k8_161632(a_frag[0], b_frag[0], acc[0], acc[0]);"));
    // Helpers are emitted once, before the kernel.
    let kernel_at = code.find("extern \"C\" __global__").unwrap();
    let helper_at = code.find("mma_sync_m16n8k8_161632").unwrap();
    assert!(helper_at < kernel_at);
}

#[test]
fn test_global_barrier_demo() {
    let cuda = lower_demo("global_barrier.tir", &CudaTarget::cuda());
    let code = &cuda.code;
    assert_eq!(
        code.matches("extern \"C\" __device__ unsigned __global_barrier_state;")
            .count(),
        1
    );
    assert!(code.contains("__shared__ unsigned __barrier_expect;"));
    assert!(code.contains("atomicAdd(&__global_barrier_state, 1);"));
    let fence = code.find("__threadfence_system();").unwrap();
    let arbiter = code.find("atomicAdd(").unwrap();
    assert!(fence < arbiter);
    assert!(code[arbiter..].contains("__syncthreads();"));
}

#[test]
fn test_demos_are_deterministic() {
    for name in ["vector_add.tir", "gemm_wmma.tir", "mma_compact.tir", "global_barrier.tir"] {
        let a = lower_demo(name, &CudaTarget::sm(75));
        let b = lower_demo(name, &CudaTarget::sm(75));
        assert_eq!(a, b, "{} lowered differently twice", name);
    }
}

// ── target configs ──

#[test]
fn test_target_config_file_drives_lowering() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.toml");
    std::fs::write(
        &path,
        "[target]\nname = \"legacy\"\narch = 35\n\n[codegen]\nrestrict = false\n",
    )
    .unwrap();
    let target = CudaTarget::load(&path).unwrap();
    let cuda = lower_demo("vector_add.tir", &target);
    assert!(!cuda.code.contains("__restrict__"));
    assert!(cuda.code.contains("float* A"));
}

#[test]
fn test_shipped_target_config_uses_native_half() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("targets/jetson_nano.toml");
    let target = CudaTarget::load(&path).unwrap();
    assert_eq!(target.arch, Some(53));
    let cuda = lower_demo("gemm_wmma.tir", &target);
    assert!(cuda.code.contains("#include <cuda_fp16.h>"));
    assert!(!cuda.code.contains("#if defined(__CUDA_ARCH__)"));
}

// ── command line ──

#[test]
fn test_cli_build_writes_cu_next_to_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("vadd.tir");
    std::fs::copy(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/vector_add.tir"),
        &input,
    )
    .unwrap();
    let status = cudagen().arg("build").arg(&input).status().unwrap();
    assert!(status.success());
    let written = std::fs::read_to_string(dir.path().join("vadd.cu")).unwrap();
    assert_eq!(written, lower_demo("vector_add.tir", &CudaTarget::cuda()).code);
}

#[test]
fn test_cli_build_rejects_output_with_many_inputs() {
    let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
    let out = cudagen()
        .arg("build")
        .arg(demos.join("vector_add.tir"))
        .arg(demos.join("gemm_wmma.tir"))
        .arg("-o")
        .arg("both.cu")
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--output needs exactly one input"));
}

#[test]
fn test_cli_build_reports_failures_in_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = vec!["build".to_string()];
    for name in ["G", "H", "I", "J"] {
        let input = dir.path().join(format!("{}.tir", name));
        std::fs::write(
            &input,
            format!(
                "(kernel k (attr storage_scope {n} \"global\" (allocate {n} float32 4 (store {n} 0 1.0))))\n",
                n = name
            ),
        )
        .unwrap();
        args.push(input.to_string_lossy().into_owned());
    }
    let out = cudagen().args(&args).output().unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    let positions: Vec<usize> = ["'G'", "'H'", "'I'", "'J'"]
        .iter()
        .map(|needle| stderr.find(&format!("cannot allocate {}", needle)).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", stderr);
    assert!(stderr.contains("4 of 4 inputs failed"));
}

#[test]
fn test_cli_check_reports_lowering_errors() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.tir");
    std::fs::write(
        &input,
        "(kernel k (param A (ptr float32))\n  (attr storage_scope G \"global\" (allocate G float32 4 (store G 0 1.0))))\n",
    )
    .unwrap();
    let out = cudagen().arg("check").arg(&input).output().unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("cannot allocate 'G' in global memory"));
}

#[test]
fn test_cli_hash_matches_library_fingerprint() {
    let demo = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/gemm_wmma.tir");
    let out = cudagen()
        .args(["hash", "--full", "--target", "sm_80"])
        .arg(&demo)
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let expected = lower_demo("gemm_wmma.tir", &CudaTarget::sm(80)).fingerprint;
    assert!(stdout.starts_with(&expected), "{}", stdout);
}

#[test]
fn test_cli_spell_prints_spellings() {
    let out = cudagen()
        .args(["spell", "--target", "sm_80", "float16x4", "int8x4", "uint8x4"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("uint2"), "{}", stdout);
    assert!(stdout.contains("int"));

    let out = cudagen().args(["spell", "float24"]).output().unwrap();
    assert!(!out.status.success());
}
