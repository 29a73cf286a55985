//! Fixed CUDA text emitted ahead of the kernels.

/// `cuda_fp16.h` plus `half` overloads of `max`/`min`.
pub const HALF_NATIVE: &str = r#"#include <cuda_fp16.h>
__device__ half max(half a, half b)
{
  return __hgt(__half(a), __half(b)) ? a : b;
}
__device__ half min(half a, half b)
{
  return __hlt(__half(a), __half(b)) ? a : b;
}
"#;

/// Storage-only `half` for devices without native fp16 arithmetic.
/// Arithmetic goes through `float`.
pub const HALF_FALLBACK: &str = r#"static inline __host__ __device__ unsigned short __float2half_bits(float f) {
  unsigned int x = *((unsigned int *)&f);
  unsigned int sign = (x >> 16) & 0x8000;
  unsigned int fexp = (x >> 23) & 0xff;
  unsigned int mant = x & 0x7fffff;
  int exp = (int)fexp - 127 + 15;
  if (fexp == 0xff) return (unsigned short)(sign | 0x7c00 | (mant ? 0x200 : 0));
  if (exp >= 31) return (unsigned short)(sign | 0x7c00);
  if (exp <= 0) {
    if (exp < -10) return (unsigned short)sign;
    mant |= 0x800000;
    unsigned int shift = (unsigned int)(14 - exp);
    unsigned int h = mant >> shift;
    if ((mant >> (shift - 1)) & 1) h += 1;
    return (unsigned short)(sign | h);
  }
  unsigned int h = sign | ((unsigned int)exp << 10) | (mant >> 13);
  if (mant & 0x1000) h += 1;
  return (unsigned short)h;
}
static inline __host__ __device__ float __half_bits2float(unsigned short h) {
  unsigned int sign = ((unsigned int)h & 0x8000) << 16;
  unsigned int exp = ((unsigned int)h >> 10) & 0x1f;
  unsigned int mant = (unsigned int)h & 0x3ff;
  unsigned int x;
  if (exp == 0x1f) {
    x = sign | 0x7f800000 | (mant << 13);
  } else if (exp == 0) {
    if (mant == 0) {
      x = sign;
    } else {
      exp = 113;
      while (!(mant & 0x400)) { mant <<= 1; exp--; }
      mant &= 0x3ff;
      x = sign | (exp << 23) | (mant << 13);
    }
  } else {
    x = sign | ((exp + 112) << 23) | (mant << 13);
  }
  return *((float *)&x);
}
struct __align__(2) half {
  unsigned short __x;
  __host__ __device__ half() : __x(0) {}
  __host__ __device__ half(float f) : __x(__float2half_bits(f)) {}
  __host__ __device__ operator float() const { return __half_bits2float(__x); }
};
static inline __host__ __device__ half operator+(half a, half b) { return half(float(a) + float(b)); }
static inline __host__ __device__ half operator-(half a, half b) { return half(float(a) - float(b)); }
static inline __host__ __device__ half operator*(half a, half b) { return half(float(a) * float(b)); }
static inline __host__ __device__ half operator/(half a, half b) { return half(float(a) / float(b)); }
static inline __host__ __device__ half max(half a, half b) { return float(a) > float(b) ? a : b; }
static inline __host__ __device__ half min(half a, half b) { return float(a) < float(b) ? a : b; }
static inline __host__ __device__ half __float2half_rn(float f) { return half(f); }
"#;

/// Two halves packed into one 32-bit word, low lane first.
pub const PACK_HALF2: &str = r#"static inline __device__ __host__ unsigned
__pack_half2(const half x, const half y) {
  unsigned v0 = *((unsigned short *)&x);
  unsigned v1 = *((unsigned short *)&y);
  return (v1 << 16) | v0;
}
"#;

/// Map the `*_sync` shuffles onto the pre-CUDA 9 intrinsics.
pub const WARP_SHUFFLE_LEGACY: &str = r#"#if defined(__CUDACC_VER_MAJOR__) && (__CUDACC_VER_MAJOR__ < 9)
#define __shfl_sync(mask, var, lane, width) \
        __shfl((var), (lane), (width))

#define __shfl_down_sync(mask, var, offset, width) \
        __shfl_down((var), (offset), (width))

#define __shfl_up_sync(mask, var, offset, width) \
        __shfl_up((var), (offset), (width))
#endif

"#;

pub const INT8_INTRINSICS: &str = "#include <sm_61_intrinsics.h>\n";

/// Inline-PTX helpers called by the compact fragment path.
pub const MMA_HELPERS: &str = r#"__device__ inline void store_fragment_float(float fragmentC[4], float * buffer, int strides, bool swizzle) {
  int row_gap = max(1ul, 128 / strides / sizeof(float));
  int pad_size = 16 / sizeof(float);
  buffer = buffer + threadIdx.x / 4 * strides + (swizzle ? (threadIdx.x / 4 / row_gap * pad_size) : 0) + threadIdx.x % 4 * 2;
  ((float2 *) buffer)[0] = ((float2 *) fragmentC)[0];
  ((float2 *) (buffer + 8 * strides + (swizzle ? (8 / row_gap * pad_size) : 0)))[0] = ((float2 *) fragmentC)[1];
}

__device__ inline void mma_accumulator_init_float(float4 * ptr) {
  *ptr = make_float4(0, 0, 0, 0);
}

__device__ inline void mma_ldmatrix_x1_half(half * shared_mem_ptr, int strides, int & fragment, bool swizzle) {
  int row_gap = max(1ul, 128 / strides / sizeof(half));
  int pad_size = 16 / sizeof(half);
  asm volatile (
    "{\n"
    ".reg .u32 smem_ptr; .reg .u64 smem_ptr_long;\n"
    "cvta.to.shared.u64 smem_ptr_long, %1; cvt.u32.u64 smem_ptr, smem_ptr_long;\n"
    "ldmatrix.sync.aligned.m8n8.x1.shared.b16 {%0}, [smem_ptr];\n"
    "}\n"
    : "=r"(fragment)
    : "l"(shared_mem_ptr + threadIdx.x % 8 * strides + (swizzle ? (threadIdx.x % 8 / row_gap * pad_size) : 0))
  );
}

__device__ inline void mma_ldmatrix_x1_trans_half(half * shared_mem_ptr, int strides, int & fragment, bool swizzle) {
  int row_gap = max(1ul, 128 / strides / sizeof(half));
  int pad_size = 16 / sizeof(half);
  asm volatile (
    "{\n"
    ".reg .u32 smem_ptr; .reg .u64 smem_ptr_long;\n"
    "cvta.to.shared.u64 smem_ptr_long, %1; cvt.u32.u64 smem_ptr, smem_ptr_long;\n"
    "ldmatrix.sync.aligned.m8n8.x1.trans.shared.b16 {%0}, [smem_ptr];\n"
    "}\n"
    : "=r"(fragment)
    : "l"(shared_mem_ptr + threadIdx.x % 8 * strides + (swizzle ? (threadIdx.x % 8 / row_gap * pad_size) : 0))
  );
}

__device__ inline void mma_ldmatrix_x2_half(half * shared_mem_ptr, int strides, int * fragment, bool swizzle) {
  int row_gap = max(1ul, 128 / strides / sizeof(half));
  int pad_size = 16 / sizeof(half);
  asm volatile (
    "{\n"
    ".reg .u32 smem_ptr; .reg .u64 smem_ptr_long;\n"
    "cvta.to.shared.u64 smem_ptr_long, %2; cvt.u32.u64 smem_ptr, smem_ptr_long;\n"
    "ldmatrix.sync.aligned.m8n8.x2.shared.b16 {%0, %1}, [smem_ptr];\n"
    "}\n"
    : "=r"(fragment[0]), "=r"(fragment[1])
    : "l"(shared_mem_ptr + threadIdx.x % 16 * strides + (swizzle ? (threadIdx.x % 16 / row_gap * pad_size) : 0))
  );
}

__device__ inline void mma_ldmatrix_x2_trans_half(half * shared_mem_ptr, int strides, int * fragment, bool swizzle) {
  int row_gap = max(1ul, 128 / strides / sizeof(half));
  int pad_size = 16 / sizeof(half);
  asm volatile (
    "{\n"
    ".reg .u32 smem_ptr; .reg .u64 smem_ptr_long;\n"
    "cvta.to.shared.u64 smem_ptr_long, %2; cvt.u32.u64 smem_ptr, smem_ptr_long;\n"
    "ldmatrix.sync.aligned.m8n8.x2.trans.shared.b16 {%0, %1}, [smem_ptr];\n"
    "}\n"
    : "=r"(fragment[0]), "=r"(fragment[1])
    : "l"(shared_mem_ptr + threadIdx.x % 8 * strides + threadIdx.x / 8 * 8 + (swizzle ? (threadIdx.x % 8 / row_gap * pad_size) : 0))
  );
}

__device__ inline void mma_sync_m16n8k8_161632(float * fragmentD, int * fragmentA, int fragmentB, float * fragmentC) {
  asm volatile("mma.sync.aligned.m16n8k8.row.col.f32.f16.f16.f32 {%0, %1, %2, %3}, {%4, %5}, {%6}, {%7, %8, %9, %10};\n"
    : "=f"(fragmentD[0]), "=f"(fragmentD[1]), "=f"(fragmentD[2]), "=f"(fragmentD[3])
    : "r"(fragmentA[0]), "r"(fragmentA[1]), "r"(fragmentB),
      "f"(fragmentC[0]), "f"(fragmentC[1]), "f"(fragmentC[2]), "f"(fragmentC[3])
  );
}

"#;
