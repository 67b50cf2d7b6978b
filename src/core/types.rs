/*!
 * Core Types
 * Common types used across the kernel
 */

/// Process ID type (index into the process table)
pub type Pid = u32;

/// Address type for memory operations
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

/// Logical clock tick, advanced once per kernel loop iteration
pub type Tick = u64;

/// Common result type for kernel operations
pub type KernelResult<T> = Result<T, super::errors::KernelError>;

/// Round `value` up to the next multiple of `align` (power of two)
#[inline]
pub const fn align_up(value: Size, align: Size) -> Size {
    (value + align - 1) & !(align - 1)
}

/// `align_up` that reports overflow instead of wrapping
#[inline]
pub const fn checked_align_up(value: Size, align: Size) -> Option<Size> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}
