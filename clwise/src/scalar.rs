//! Trait describing host element types that can be stored in device buffers

use crate::{dispatch::BinaryOp, dtype::DType};

mod sealed {
    pub trait Sealed {}
}

/// Scalar trait is implemented for all [dtypes](DType).
///
/// The trait is sealed, every implementor is plain old data for which
/// any bit pattern is a valid value.
pub trait Scalar:
    Copy
    + Clone
    + Sized
    + core::fmt::Debug
    + 'static
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + sealed::Sealed
{
    /// Get dtype of Self
    #[must_use]
    fn dtype() -> DType;
    /// Zero of Self
    #[must_use]
    fn zero() -> Self;
    /// From native endian bytes, `bytes` must be exactly `size_of::<Self>()` long
    #[must_use]
    fn from_ne_bytes(bytes: &[u8]) -> Self;
    /// Add, wrapping for integers
    #[must_use]
    fn add(self, rhs: Self) -> Self;
    /// Sub, wrapping for integers
    #[must_use]
    fn sub(self, rhs: Self) -> Self;
    /// Mul, wrapping for integers
    #[must_use]
    fn mul(self, rhs: Self) -> Self;
    /// Div, integer division by zero gives zero
    #[must_use]
    fn div(self, rhs: Self) -> Self;

    /// Host reference evaluation of a binary operation
    #[must_use]
    fn binary(self, op: BinaryOp, rhs: Self) -> Self {
        match op {
            BinaryOp::Add => self.add(rhs),
            BinaryOp::Sub => self.sub(rhs),
            BinaryOp::Mul => self.mul(rhs),
            BinaryOp::Div => self.div(rhs),
        }
    }

    /// View slice as bytes
    #[must_use]
    fn slice_as_bytes(data: &[Self]) -> &[u8] {
        // SAFETY: implementors are sealed plain old data without padding
        unsafe { core::slice::from_raw_parts(data.as_ptr().cast(), core::mem::size_of_val(data)) }
    }

    /// View mutable slice as bytes
    #[must_use]
    fn slice_as_bytes_mut(data: &mut [Self]) -> &mut [u8] {
        // SAFETY: implementors are sealed plain old data, every bit pattern is valid
        unsafe {
            core::slice::from_raw_parts_mut(data.as_mut_ptr().cast(), core::mem::size_of_val(data))
        }
    }
}

macro_rules! impl_int {
    ($($t:ty => $dtype:ident),* $(,)?) => {$(
        impl sealed::Sealed for $t {}

        impl Scalar for $t {
            fn dtype() -> DType {
                DType::$dtype
            }

            fn zero() -> Self {
                0
            }

            fn from_ne_bytes(bytes: &[u8]) -> Self {
                let mut raw = [0; core::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_ne_bytes(raw)
            }

            fn add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }

            fn sub(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }

            fn mul(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }

            fn div(self, rhs: Self) -> Self {
                if rhs == 0 {
                    0
                } else {
                    self.wrapping_div(rhs)
                }
            }
        }
    )*};
}

macro_rules! impl_float {
    ($($t:ty => $dtype:ident),* $(,)?) => {$(
        impl sealed::Sealed for $t {}

        impl Scalar for $t {
            fn dtype() -> DType {
                DType::$dtype
            }

            fn zero() -> Self {
                0.
            }

            fn from_ne_bytes(bytes: &[u8]) -> Self {
                let mut raw = [0; core::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_ne_bytes(raw)
            }

            fn add(self, rhs: Self) -> Self {
                self + rhs
            }

            fn sub(self, rhs: Self) -> Self {
                self - rhs
            }

            fn mul(self, rhs: Self) -> Self {
                self * rhs
            }

            fn div(self, rhs: Self) -> Self {
                self / rhs
            }
        }
    )*};
}

impl_int!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
);

impl_float!(f32 => F32, f64 => F64);
