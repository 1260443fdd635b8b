//! Bounds-checked little-endian reads.
//!
//! Everything in a PE image and in ECMA-335 metadata is little-endian. These helpers read a
//! primitive at an offset and fail with [`crate::Error::OutOfBounds`] instead of panicking
//! when the buffer is too short.

use crate::Result;

/// A primitive that can be decoded from little-endian bytes.
pub trait CilIO: Sized {
    /// The fixed-size byte array backing this type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Decode from little-endian bytes.
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_cil_io {
    ($($ty:ty),*) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_cil_io!(u8, u16, u32, u64, i32);

/// Reads a `T` from the start of `data`.
///
/// # Errors
/// [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0;
    read_le_at(data, &mut offset)
}

/// Reads a `T` at `offset` and advances `offset` past it.
///
/// # Errors
/// [`crate::Error::OutOfBounds`] if the read would leave `data`.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let end = offset
        .checked_add(type_len)
        .ok_or_else(|| out_of_bounds_error!())?;

    let Some(bytes) = data.get(*offset..end) else {
        return Err(out_of_bounds_error!());
    };
    let Ok(bytes) = bytes.try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;
    Ok(T::from_le_bytes(bytes))
}

/// Reads a metadata index that is 4 bytes wide when `is_large` and 2 bytes otherwise.
///
/// # Errors
/// [`crate::Error::OutOfBounds`] if the read would leave `data`.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    if is_large {
        read_le_at::<u32>(data, offset)
    } else {
        Ok(u32::from(read_le_at::<u16>(data, offset)?))
    }
}
