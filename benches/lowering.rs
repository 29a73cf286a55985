//! Lowering throughput: parse plus CUDA emission for each demo kernel,
//! and emission alone for a synthetic wide-vector kernel.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cudagen::syntax::parse_module;
use cudagen::{compile_source_silent, lower_module, CudaTarget};

const DEMOS: [(&str, &str); 4] = [
    ("vector_add", include_str!("../demos/vector_add.tir")),
    ("gemm_wmma", include_str!("../demos/gemm_wmma.tir")),
    ("mma_compact", include_str!("../demos/mma_compact.tir")),
    ("global_barrier", include_str!("../demos/global_barrier.tir")),
];

/// `n` kernels, each adding two float32x4 vectors.
fn synthetic_module(n: usize) -> String {
    let mut src = String::new();
    for i in 0..n {
        src.push_str(&format!(
            "(kernel k{i} (param A (ptr float32)) (param B (ptr float32))
               (thread tx threadIdx.x 64
                 (store B (ramp (* tx 4) 1 4)
                   (+ (load float32x4 A (ramp (* tx 4) 1 4)) (broadcast (const float32 1.0) 4)))))\n"
        ));
    }
    src
}

fn bench_demos(c: &mut Criterion) {
    let target = CudaTarget::sm(80);
    let mut group = c.benchmark_group("compile_source");
    for (name, src) in DEMOS {
        group.bench_function(name, |b| {
            b.iter(|| compile_source_silent(black_box(src), name, &target))
        });
    }
    group.finish();
}

fn bench_emission(c: &mut Criterion) {
    let target = CudaTarget::cuda();
    let src = synthetic_module(64);
    let module = match parse_module(&src) {
        Ok(m) => m,
        Err(errs) => panic!("synthetic module failed to parse: {:?}", errs),
    };
    c.bench_function("lower_module_64_kernels", |b| {
        b.iter(|| lower_module(black_box(&module), &target))
    });
}

criterion_group!(benches, bench_demos, bench_emission);
criterion_main!(benches);
