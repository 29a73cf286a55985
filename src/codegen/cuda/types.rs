//! CUDA spelling of IR data types.

use super::emission::Features;
use crate::config::target::CudaTarget;
use crate::diagnostic::Diagnostic;
use crate::ir::{DataType, TypeCode};
use crate::span::Span;

/// A type's CUDA spelling and the prologue features it relies on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spelling {
    pub text: String,
    pub needs: Features,
}

impl Spelling {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            needs: Features::NONE,
        }
    }

    fn with(text: impl Into<String>, needs: Features) -> Self {
        Self {
            text: text.into(),
            needs,
        }
    }
}

fn unsupported(t: DataType) -> Diagnostic {
    Diagnostic::error(
        format!("cannot convert type {} to a CUDA type", t),
        Span::dummy(),
    )
}

/// Map a data type onto its CUDA spelling. Pure: the caller merges
/// `needs` into its feature set.
pub fn spell(t: DataType, target: &CudaTarget) -> Result<Spelling, Diagnostic> {
    let lanes = t.lanes;
    match t.code {
        TypeCode::Handle => {
            if lanes != 1 {
                return Err(unsupported(t));
            }
            Ok(Spelling::plain("void*"))
        }
        TypeCode::Float => spell_float(t),
        TypeCode::Bool => match lanes {
            1 => Ok(Spelling::plain("bool")),
            // Bool vectors live in ushort vectors.
            2..=4 => Ok(Spelling::plain(format!("ushort{}", lanes))),
            _ => Err(unsupported(t)),
        },
        TypeCode::Int | TypeCode::UInt => spell_integer(t, target),
    }
}

fn spell_float(t: DataType) -> Result<Spelling, Diagnostic> {
    let lanes = t.lanes;
    match t.bits {
        16 => {
            if lanes == 1 {
                Ok(Spelling::with("half", Features::FP16))
            } else if lanes <= 8 && lanes % 2 == 0 {
                // Two halves per 32-bit word.
                Ok(Spelling::with(format!("uint{}", lanes / 2), Features::FP16))
            } else {
                Err(unsupported(t))
            }
        }
        32 | 64 => {
            let base = if t.bits == 32 { "float" } else { "double" };
            match lanes {
                1 => Ok(Spelling::plain(base)),
                2..=4 => Ok(Spelling::plain(format!("{}{}", base, lanes))),
                _ => Err(unsupported(t)),
            }
        }
        _ => Err(unsupported(t)),
    }
}

fn spell_integer(t: DataType, target: &CudaTarget) -> Result<Spelling, Diagnostic> {
    let lanes = t.lanes;
    let mut needs = Features::NONE;

    // Packed spellings carry the lane count in the container type.
    let packed = match (t.bits, lanes) {
        (1, 1) | (4, 1) => Some("int"),
        (1, 8) => Some("int8_t"),
        (1, 16) | (4, 4) => Some("int16_t"),
        (1, 32) | (4, 8) => Some("int"),
        (4, 16) => Some("int2"),
        (4, 32) => Some("int4"),
        (4, 64) => Some("int8"),
        (1, _) | (4, _) => return Err(unsupported(t)),
        (8, 4) => {
            needs = Features::INT8;
            Some("int")
        }
        (8, 8) => {
            needs = Features::INT8;
            Some("int2")
        }
        (8, 16) => {
            needs = Features::INT8;
            Some("int4")
        }
        _ => None,
    };
    if let Some(base) = packed {
        return Ok(Spelling::with(sign_prefix(t, base), needs));
    }

    let base = match t.bits {
        8 => {
            if t.is_int() && lanes == 1 {
                return Ok(Spelling::plain("signed char"));
            }
            "char"
        }
        16 => "short",
        32 => "int",
        64 => {
            if target.long_bits == 64 {
                "long"
            } else {
                match lanes {
                    1 => "long long",
                    2 => "longlong",
                    _ => return Err(unsupported(t)),
                }
            }
        }
        _ => return Err(unsupported(t)),
    };

    match lanes {
        1 => Ok(Spelling::plain(sign_prefix(t, base))),
        2..=4 => Ok(Spelling::plain(format!(
            "{}{}",
            sign_prefix(t, base),
            lanes
        ))),
        _ => Err(unsupported(t)),
    }
}

/// Unsigned scalars read `unsigned T`; unsigned vectors use the `uT` names.
fn sign_prefix(t: DataType, base: &str) -> String {
    if !t.is_uint() {
        base.to_string()
    } else if t.lanes == 1 {
        format!("unsigned {}", base)
    } else {
        format!("u{}", base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(ty: &str) -> String {
        spell(ty.parse().unwrap(), &CudaTarget::cuda()).unwrap().text
    }

    #[test]
    fn test_legal_spellings() {
        let table = [
            ("handle", "void*"),
            ("float16", "half"),
            ("float16x2", "uint1"),
            ("float16x4", "uint2"),
            ("float16x8", "uint4"),
            ("float32", "float"),
            ("float32x4", "float4"),
            ("float64x2", "double2"),
            ("bool", "bool"),
            ("boolx4", "ushort4"),
            ("int1", "int"),
            ("int1x8", "int8_t"),
            ("uint1x16", "uint16_t"),
            ("int1x32", "int"),
            ("int4", "int"),
            ("uint4", "unsigned int"),
            ("int4x4", "int16_t"),
            ("int4x8", "int"),
            ("uint4x8", "uint"),
            ("int4x16", "int2"),
            ("int4x32", "int4"),
            ("int4x64", "int8"),
            ("int8", "signed char"),
            ("uint8", "unsigned char"),
            ("int8x2", "char2"),
            ("uint8x3", "uchar3"),
            ("int8x4", "int"),
            ("uint8x4", "uint"),
            ("int8x8", "int2"),
            ("int8x16", "int4"),
            ("int16", "short"),
            ("uint16x2", "ushort2"),
            ("int32", "int"),
            ("uint32", "unsigned int"),
            ("int32x4", "int4"),
            ("int64", "long"),
            ("uint64x2", "ulong2"),
        ];
        for (ty, expected) in table {
            assert_eq!(text(ty), expected, "spelling of {}", ty);
        }
    }

    #[test]
    fn test_illegal_spellings() {
        for ty in [
            "float16x3",
            "float16x16",
            "float32x8",
            "float8",
            "boolx8",
            "int1x4",
            "int4x2",
            "int8x5",
            "int32x8",
            "int12",
            "int64x8",
        ] {
            let t: DataType = ty.parse().unwrap();
            let err = spell(t, &CudaTarget::cuda()).unwrap_err();
            assert!(
                err.message.contains(&format!("cannot convert type {}", ty)),
                "{}",
                err.message
            );
        }
        let t = DataType::handle().with_lanes(2);
        assert!(spell(t, &CudaTarget::cuda()).is_err());
    }

    #[test]
    fn test_long_width_follows_target() {
        let mut narrow = CudaTarget::cuda();
        narrow.long_bits = 32;
        let s = |ty: &str| spell(ty.parse().unwrap(), &narrow).map(|s| s.text);
        assert_eq!(s("int64").unwrap(), "long long");
        assert_eq!(s("uint64").unwrap(), "unsigned long long");
        assert_eq!(s("int64x2").unwrap(), "longlong2");
        assert!(s("int64x3").is_err());
        assert_eq!(text("int64x4"), "long4");
    }

    #[test]
    fn test_feature_requirements() {
        let target = CudaTarget::cuda();
        let needs = |ty: &str| spell(ty.parse().unwrap(), &target).unwrap().needs;
        assert_eq!(needs("float16"), Features::FP16);
        assert_eq!(needs("float16x8"), Features::FP16);
        assert_eq!(needs("int8x4"), Features::INT8);
        assert_eq!(needs("int8x16"), Features::INT8);
        assert_eq!(needs("int8x2"), Features::NONE);
        assert_eq!(needs("float32x4"), Features::NONE);
    }
}
