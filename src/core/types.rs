//! IR value types as seen by the ARM32 backend.
//!
//! Every operand carries one of these types. The ARM32 specific attributes
//! (mnemonic width suffixes and the immediate offset widths of the load/store
//! encodings) live next to the type so that operand legality checks and
//! emission share a single table.

use std::fmt;

/// Value type of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    V4I1,
    V8I1,
    V16I1,
    V16I8,
    V8I16,
    V4I32,
    V4F32,
}

/// Per-type ARM32 attributes.
#[derive(Debug, Clone, Copy)]
struct TypeAttributes {
    int_width: &'static str,
    vec_width: &'static str,
    sext_offset_bits: u32,
    zext_offset_bits: u32,
}

const fn attrs(
    int_width: &'static str,
    vec_width: &'static str,
    sext_offset_bits: u32,
    zext_offset_bits: u32,
) -> TypeAttributes {
    TypeAttributes {
        int_width,
        vec_width,
        sext_offset_bits,
        zext_offset_bits,
    }
}

impl Type {
    /// ldr/str take a 12-bit offset, ldrh/ldrsb/ldrsh/ldrd an 8-bit one and
    /// vldr/vstr an 8-bit word count (10 bits of byte offset). Vector loads
    /// use vld1, which has no immediate offset.
    fn attributes(self) -> TypeAttributes {
        match self {
            Type::Void => attrs("", "", 0, 0),
            Type::I1 | Type::I8 => attrs("b", "", 8, 12),
            Type::I16 => attrs("h", "", 8, 8),
            Type::I32 => attrs("", "", 12, 12),
            Type::I64 => attrs("d", "", 8, 8),
            Type::F32 => attrs("", ".f32", 10, 10),
            Type::F64 => attrs("", ".f64", 10, 10),
            Type::V4I1 | Type::V4I32 => attrs("", ".i32", 0, 0),
            Type::V8I1 | Type::V8I16 => attrs("", ".i16", 0, 0),
            Type::V16I1 | Type::V16I8 => attrs("", ".i8", 0, 0),
            Type::V4F32 => attrs("", ".f32", 0, 0),
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Type::I1 | Type::I8 | Type::I16 | Type::I32 | Type::I64)
    }

    pub fn is_scalar_float(self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    pub fn is_vector(self) -> bool {
        matches!(
            self,
            Type::V4I1
                | Type::V8I1
                | Type::V16I1
                | Type::V16I8
                | Type::V8I16
                | Type::V4I32
                | Type::V4F32
        )
    }

    /// Whether values of this type live in a single core register.
    pub fn is_gpr_type(self) -> bool {
        matches!(self, Type::I1 | Type::I8 | Type::I16 | Type::I32)
    }

    /// Size in bytes.
    pub fn size_bytes(self) -> u32 {
        match self {
            Type::Void => 0,
            Type::I1 | Type::I8 => 1,
            Type::I16 => 2,
            Type::I32 | Type::F32 => 4,
            Type::I64 | Type::F64 => 8,
            _ => 16,
        }
    }

    /// Mnemonic suffix selecting the access width of integer loads and
    /// stores (`ldrb`, `ldrh`, `ldrd`) and of the extend instructions.
    pub fn width_str(self) -> &'static str {
        self.attributes().int_width
    }

    /// Data type suffix of VFP and NEON mnemonics (`vadd.f32`).
    pub fn vec_width_str(self) -> &'static str {
        self.attributes().vec_width
    }

    /// Number of magnitude bits available for an immediate offset.
    pub fn offset_bits(self, sign_ext: bool) -> u32 {
        let attrs = self.attributes();
        if sign_ext {
            attrs.sext_offset_bits
        } else {
            attrs.zext_offset_bits
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Void => "void",
            Type::I1 => "i1",
            Type::I8 => "i8",
            Type::I16 => "i16",
            Type::I32 => "i32",
            Type::I64 => "i64",
            Type::F32 => "float",
            Type::F64 => "double",
            Type::V4I1 => "<4 x i1>",
            Type::V8I1 => "<8 x i1>",
            Type::V16I1 => "<16 x i1>",
            Type::V16I8 => "<16 x i8>",
            Type::V8I16 => "<8 x i16>",
            Type::V4I32 => "<4 x i32>",
            Type::V4F32 => "<4 x float>",
        };
        f.write_str(name)
    }
}
