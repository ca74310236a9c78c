//! Operation keys identifying a unique plan shape and configuration.

use std::fmt;

use serde::Serialize;
use smallvec::SmallVec;

use crate::types::{DataType, TensorDesc};
use crate::variant::OpVariant;

/// How a quantization parameter is shared across the weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Granularity {
    /// One value for the whole tensor: shape `[1]`.
    PerTensor,
    /// One value per output channel: shape `[N]`.
    PerChannel,
    /// One value per `group` rows of K per output channel: shape `[K / group, N]`.
    Grouped { group: usize },
}

impl Granularity {
    /// Parameter tensor shape for `[k, n]` weights.
    pub fn param_dims(self, k: usize, n: usize) -> Option<SmallVec<[usize; 4]>> {
        match self {
            Granularity::PerTensor => Some(SmallVec::from_slice(&[1])),
            Granularity::PerChannel => Some(SmallVec::from_slice(&[n])),
            Granularity::Grouped { group } if group > 0 && k.is_multiple_of(group) => Some(SmallVec::from_slice(&[k / group, n])),
            Granularity::Grouped { .. } => None,
        }
    }

    /// Element index into the parameter tensor for weight `(row, col)`.
    #[inline]
    pub fn param_index(self, row: usize, col: usize, n: usize) -> usize {
        match self {
            Granularity::PerTensor => 0,
            Granularity::PerChannel => col,
            Granularity::Grouped { group } => (row / group) * n + col,
        }
    }
}

/// Presence, granularity and element type of one weight decoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct QuantParam {
    pub granularity: Granularity,
    pub dtype: DataType,
}

impl QuantParam {
    pub const fn new(granularity: Granularity, dtype: DataType) -> Self {
        Self { granularity, dtype }
    }
}

/// Weight decorations that change how a plan is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Decorations {
    pub scales: Option<QuantParam>,
    pub zero_points: Option<QuantParam>,
}

/// Cache key: every property that selects a distinct compiled plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OpKey {
    pub operands: SmallVec<[TensorDesc; 4]>,
    pub variant: OpVariant,
    pub decorations: Decorations,
}

impl OpKey {
    pub fn new(operands: impl IntoIterator<Item = TensorDesc>, variant: OpVariant) -> Self {
        Self {
            operands: operands.into_iter().collect(),
            variant,
            decorations: Decorations::default(),
        }
    }

    #[must_use]
    pub fn with_scales(mut self, param: QuantParam) -> Self {
        self.decorations.scales = Some(param);
        self
    }

    #[must_use]
    pub fn with_zero_points(mut self, param: QuantParam) -> Self {
        self.decorations.zero_points = Some(param);
        self
    }

    #[inline]
    pub fn operand(&self, index: usize) -> Option<&TensorDesc> {
        self.operands.get(index)
    }
}

impl fmt::Display for OpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{operand}")?;
        }
        write!(f, "] {}", self.variant)?;
        if let Some(scales) = self.decorations.scales {
            write!(f, " scales={}/{:?}", scales.dtype, scales.granularity)?;
        }
        if let Some(zps) = self.decorations.zero_points {
            write!(f, " zp={}/{:?}", zps.dtype, zps.granularity)?;
        }
        Ok(())
    }
}
