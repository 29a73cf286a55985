use std::fmt;
use std::str::FromStr;

/// Scalar kind of a [`DataType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Int,
    UInt,
    Float,
    Bool,
    /// Opaque pointer-sized handle (buffer base addresses).
    Handle,
}

/// `{code, bits, lanes}`. `lanes == 1` is a scalar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DataType {
    pub code: TypeCode,
    pub bits: u8,
    pub lanes: u16,
}

impl DataType {
    pub const fn new(code: TypeCode, bits: u8, lanes: u16) -> Self {
        Self { code, bits, lanes }
    }

    pub const fn int(bits: u8) -> Self {
        Self::new(TypeCode::Int, bits, 1)
    }

    pub const fn uint(bits: u8) -> Self {
        Self::new(TypeCode::UInt, bits, 1)
    }

    pub const fn float(bits: u8) -> Self {
        Self::new(TypeCode::Float, bits, 1)
    }

    pub const fn bool() -> Self {
        Self::new(TypeCode::Bool, 1, 1)
    }

    pub const fn handle() -> Self {
        Self::new(TypeCode::Handle, 64, 1)
    }

    pub const fn int32() -> Self {
        Self::int(32)
    }

    pub const fn float16() -> Self {
        Self::float(16)
    }

    pub const fn float32() -> Self {
        Self::float(32)
    }

    /// Same scalar kind with a different lane count.
    pub const fn with_lanes(self, lanes: u16) -> Self {
        Self::new(self.code, self.bits, lanes)
    }

    /// The scalar type of one lane.
    pub const fn element_of(self) -> Self {
        self.with_lanes(1)
    }

    pub fn is_scalar(&self) -> bool {
        self.lanes == 1
    }

    pub fn is_vector(&self) -> bool {
        self.lanes > 1
    }

    pub fn is_int(&self) -> bool {
        self.code == TypeCode::Int
    }

    pub fn is_uint(&self) -> bool {
        self.code == TypeCode::UInt
    }

    pub fn is_integer(&self) -> bool {
        self.is_int() || self.is_uint()
    }

    pub fn is_float(&self) -> bool {
        self.code == TypeCode::Float
    }

    pub fn is_float16(&self) -> bool {
        self.is_float() && self.bits == 16
    }

    pub fn is_bool(&self) -> bool {
        self.code == TypeCode::Bool
    }

    pub fn is_handle(&self) -> bool {
        self.code == TypeCode::Handle
    }

    /// Integer of fewer than eight bits (int1, int4, uint4).
    pub fn is_sub_byte(&self) -> bool {
        self.is_integer() && self.bits < 8
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            TypeCode::Handle => return write!(f, "handle"),
            TypeCode::Bool => write!(f, "bool")?,
            TypeCode::Int => write!(f, "int{}", self.bits)?,
            TypeCode::UInt => write!(f, "uint{}", self.bits)?,
            TypeCode::Float => write!(f, "float{}", self.bits)?,
        }
        if self.lanes > 1 {
            write!(f, "x{}", self.lanes)?;
        }
        Ok(())
    }
}

impl FromStr for DataType {
    type Err = String;

    /// Parse `int8`, `uint4x8`, `float16x4`, `bool`, `boolx4`, `handle`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "handle" {
            return Ok(Self::handle());
        }
        let (base, lanes) = match s.split_once('x') {
            Some((base, lanes)) => {
                let lanes: u16 = lanes
                    .parse()
                    .map_err(|_| format!("invalid lane count in '{}'", s))?;
                if lanes == 0 {
                    return Err(format!("lane count must be at least 1 in '{}'", s));
                }
                (base, lanes)
            }
            None => (s, 1),
        };
        let (code, digits) = if base == "bool" {
            return Ok(Self::bool().with_lanes(lanes));
        } else if let Some(rest) = base.strip_prefix("uint") {
            (TypeCode::UInt, rest)
        } else if let Some(rest) = base.strip_prefix("int") {
            (TypeCode::Int, rest)
        } else if let Some(rest) = base.strip_prefix("float") {
            (TypeCode::Float, rest)
        } else {
            return Err(format!("unknown data type '{}'", s));
        };
        let bits: u8 = digits
            .parse()
            .map_err(|_| format!("invalid bit width in '{}'", s))?;
        if bits == 0 {
            return Err(format!("bit width must be positive in '{}'", s));
        }
        Ok(Self::new(code, bits, lanes))
    }
}
