use std::fmt;

use serde::{Deserialize, Serialize};

/// Element types understood by plans and memory descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum DataType {
    F32,
    F16,
    Bf16,
    S8,
    U8,
    S4,
    U4,
    S32,
    /// Placeholder carried by the absent descriptor.
    #[default]
    Undef,
}

impl DataType {
    /// Storage width of one element in bits.
    pub const fn bits(self) -> usize {
        match self {
            DataType::F32 | DataType::S32 => 32,
            DataType::F16 | DataType::Bf16 => 16,
            DataType::S8 | DataType::U8 => 8,
            DataType::S4 | DataType::U4 => 4,
            DataType::Undef => 0,
        }
    }

    /// Bytes needed to hold `elements` values; int4 packs two per byte.
    /// `None` when the bit count does not fit in `usize`.
    pub const fn storage_bytes(self, elements: usize) -> Option<usize> {
        match elements.checked_mul(self.bits()) {
            Some(bits) => Some(bits.div_ceil(8)),
            None => None,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, DataType::F32 | DataType::F16 | DataType::Bf16)
    }

    pub const fn is_int4(self) -> bool {
        matches!(self, DataType::S4 | DataType::U4)
    }

    pub const fn is_quantized_weight(self) -> bool {
        matches!(self, DataType::S4 | DataType::U4 | DataType::S8 | DataType::U8)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            DataType::F32 => "f32",
            DataType::F16 => "f16",
            DataType::Bf16 => "bf16",
            DataType::S8 => "s8",
            DataType::U8 => "u8",
            DataType::S4 => "s4",
            DataType::U4 => "u4",
            DataType::S32 => "s32",
            DataType::Undef => "undef",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical ordering of a 2-D operand. Part of the plan key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Layout {
    #[default]
    RowMajor,
    /// The last two dimensions are swapped in memory.
    ColMajor,
}
