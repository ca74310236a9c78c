use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::dtype::{DataType, Layout};

pub type Dims = SmallVec<[usize; 4]>;

/// Logical description of one operand as it appears in a plan key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorDesc {
    pub dims: Dims,
    pub dtype: DataType,
    pub layout: Layout,
}

impl TensorDesc {
    pub fn new(dims: impl IntoIterator<Item = usize>, dtype: DataType) -> Self {
        Self {
            dims: dims.into_iter().collect(),
            dtype,
            layout: Layout::RowMajor,
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn element_count(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |count, &dim| count.checked_mul(dim))
    }

    /// Element strides implied by `layout`. Strides saturate on overflow,
    /// which [`MemoryDesc::size_bytes`] then reports as `None`.
    pub fn strides(&self) -> Dims {
        let rank = self.dims.len();
        let mut order: SmallVec<[usize; 4]> = (0..rank).collect();
        if self.layout == Layout::ColMajor && rank >= 2 {
            order.swap(rank - 1, rank - 2);
        }
        let mut strides: Dims = SmallVec::from_elem(0, rank);
        let mut running = 1usize;
        for &axis in order.iter().rev() {
            strides[axis] = running;
            running = running.saturating_mul(self.dims[axis]);
        }
        strides
    }

    pub fn memory_desc(&self) -> MemoryDesc {
        MemoryDesc::new(self.dims.clone(), self.strides(), self.dtype)
    }
}

impl fmt::Display for TensorDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.dtype)?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str("x")?;
            }
            write!(f, "{dim}")?;
        }
        f.write_str("]")?;
        if self.layout == Layout::ColMajor {
            f.write_str("^T")?;
        }
        Ok(())
    }
}

/// Physical memory layout of a plan argument as reported by the plan.
///
/// The default value is the absent sentinel: a plan returns it for any
/// parameter it does not have.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MemoryDesc {
    dims: Dims,
    strides: Dims,
    dtype: DataType,
}

impl MemoryDesc {
    pub fn new(dims: Dims, strides: Dims, dtype: DataType) -> Self {
        debug_assert_eq!(dims.len(), strides.len());
        Self { dims, strides, dtype }
    }

    pub fn row_major(dims: &[usize], dtype: DataType) -> Self {
        TensorDesc::new(dims.iter().copied(), dtype).memory_desc()
    }

    /// The absent sentinel.
    #[inline]
    pub fn zero() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.dims.is_empty() || self.dtype == DataType::Undef
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    #[inline]
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn element_count(&self) -> Option<usize> {
        if self.is_zero() {
            return Some(0);
        }
        self.dims.iter().try_fold(1usize, |count, &dim| count.checked_mul(dim))
    }

    /// Element offset of the coordinate `index`.
    #[inline]
    pub fn offset(&self, index: &[usize]) -> usize {
        index.iter().zip(self.strides.iter()).map(|(i, s)| i * s).sum()
    }

    /// Bytes spanned by the described memory, including stride padding.
    /// `None` when the span does not fit in `usize`.
    pub fn size_bytes(&self) -> Option<usize> {
        if self.is_zero() || self.dims.contains(&0) {
            return Some(0);
        }
        let last = self
            .dims
            .iter()
            .zip(self.strides.iter())
            .try_fold(0usize, |span, (dim, stride)| (dim - 1).checked_mul(*stride)?.checked_add(span))?;
        self.dtype.storage_bytes(last.checked_add(1)?)
    }
}
