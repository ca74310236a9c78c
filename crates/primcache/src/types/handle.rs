use std::ffi::c_void;

/// Raw, caller-owned data address bound to a plan argument.
///
/// Handles are plain pointers: they are `Copy`, carry no lifetime and are
/// neither `Send` nor `Sync`. Whoever passes one to
/// [`PlanHandle::execute`](crate::plan::PlanHandle::execute) vouches that it
/// points to memory matching the argument's descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataHandle(*mut c_void);

impl DataHandle {
    #[inline]
    pub const fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    #[inline]
    pub fn from_mut<T>(ptr: *mut T) -> Self {
        Self(ptr.cast())
    }

    /// Wrap a read-only pointer. The plan must only read through it.
    #[inline]
    pub fn from_const<T>(ptr: *const T) -> Self {
        Self(ptr.cast_mut().cast())
    }

    #[inline]
    pub fn as_ptr(self) -> *mut c_void {
        self.0
    }

    #[inline]
    pub fn cast<T>(self) -> *mut T {
        self.0.cast()
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Default for DataHandle {
    fn default() -> Self {
        Self::null()
    }
}

/// How a memory object refers to its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryKind {
    /// Unified shared memory: the handle is a directly addressable pointer.
    #[default]
    Usm,
    /// Backend-managed buffer object.
    Buffer,
}
