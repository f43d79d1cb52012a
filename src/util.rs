use alloc::string::ToString;
use core::{
    any::type_name,
    ops::{Add, Rem, Sub},
};

use zerocopy::FromBytes;

use crate::ReadError;

/// Read a `T` from the start of `data`.
pub fn read<T: FromBytes + Copy>(data: &[u8]) -> Result<T, ReadError> {
    T::read_from_prefix(data)
        .map_err(|_| ReadError(type_name::<T>().to_string()))
        .map(|(value, _)| value)
}

/// Read a `T` at `offset` into `data`, failing instead of panicking when the offset is out of range.
pub fn read_at<T: FromBytes + Copy, O: TryInto<usize>>(
    data: &[u8], offset: O,
) -> Result<T, ReadError> {
    read(slice_at(data, offset, 0)?)
}

/// Returns `data[offset..offset + len]`, or everything from `offset` when `len` is zero.
pub fn slice_at<O: TryInto<usize>>(data: &[u8], offset: O, len: usize) -> Result<&[u8], ReadError> {
    let out_of_range = || ReadError(alloc::format!("offset outside of {} bytes", data.len()));
    let offset = offset.try_into().map_err(|_| out_of_range())?;
    let tail = data.get(offset..).ok_or_else(out_of_range)?;
    if len == 0 {
        return Ok(tail);
    }
    tail.get(..len).ok_or_else(out_of_range)
}

pub fn aligned_to<T: Add<Output = T> + Sub<Output = T> + Rem<Output = T> + Eq + Copy + Default>(
    value: T, alignment: T,
) -> T {
    if alignment == T::default() || value % alignment == T::default() {
        return value;
    }
    value + alignment - (value % alignment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_values() {
        assert_eq!(aligned_to(0u32, 0x200), 0);
        assert_eq!(aligned_to(1u32, 0x200), 0x200);
        assert_eq!(aligned_to(0x200u32, 0x200), 0x200);
        assert_eq!(aligned_to(0x201u32, 0x200), 0x400);
        assert_eq!(aligned_to(7u32, 0), 7);
    }

    #[test]
    fn read_out_of_range() {
        let data = [0x4d, 0x5a, 0x00, 0x00];
        assert_eq!(read_at::<u16, _>(&data, 0u32).unwrap(), 0x5a4d);
        assert!(read_at::<u32, _>(&data, 2u32).is_err());
        assert!(read_at::<u16, _>(&data, 0x3cu32).is_err());
        assert!(slice_at(&data, 1u32, 8).is_err());
        assert_eq!(slice_at(&data, 1u32, 2).unwrap(), &[0x5a, 0x00]);
    }
}
