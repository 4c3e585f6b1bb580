//! Fixed-size little-endian codecs for primitive values.

use super::bytes::{read_array, write_bytes};
use super::{DataType, FixedSizeDataType};
use crate::error::CodecError;

macro_rules! primitive_data_type {
    ($(#[$meta:meta])* $name:ident, $value:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name;

        impl DataType for $name {
            type Value = $value;

            fn size(&self, _value: &$value) -> usize {
                size_of::<$value>()
            }

            fn size_at(&self, _buf: &[u8], _position: usize) -> Result<usize, CodecError> {
                Ok(size_of::<$value>())
            }

            fn write(&self, buf: &mut [u8], position: usize, value: &$value) -> Result<(), CodecError> {
                write_bytes(buf, position, &value.to_le_bytes())
            }

            fn read(&self, buf: &[u8], position: usize) -> Result<$value, CodecError> {
                read_array(buf, position).map(<$value>::from_le_bytes)
            }
        }

        impl FixedSizeDataType for $name {
            fn fixed_size(&self) -> usize {
                size_of::<$value>()
            }
        }
    };
}

primitive_data_type!(
    /// `u8` in one byte.
    ByteDataType,
    u8
);
primitive_data_type!(
    /// `i16` in two bytes.
    ShortDataType,
    i16
);
primitive_data_type!(
    /// `i32` in four bytes.
    IntegerDataType,
    i32
);
primitive_data_type!(
    /// `i64` in eight bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use orbis_core::codec::{DataType, FixedSizeDataType, LongDataType};
    ///
    /// # fn main() -> Result<(), orbis_core::CodecError> {
    /// let mut buf = [0_u8; 16];
    /// LongDataType.write(&mut buf, 8, &-42)?;
    /// assert_eq!(LongDataType.read(&buf, 8)?, -42);
    /// assert_eq!(LongDataType.fixed_size(), 8);
    /// # Ok(())
    /// # }
    /// ```
    LongDataType,
    i64
);
primitive_data_type!(
    /// `u64` in eight bytes; used for byte offsets.
    UnsignedLongDataType,
    u64
);
primitive_data_type!(
    /// `f32` in four bytes.
    FloatDataType,
    f32
);
primitive_data_type!(
    /// `f64` in eight bytes.
    DoubleDataType,
    f64
);

/// `bool` in one byte; any non-zero byte reads back as `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BooleanDataType;

impl DataType for BooleanDataType {
    type Value = bool;

    fn size(&self, _value: &bool) -> usize {
        1
    }

    fn size_at(&self, _buf: &[u8], _position: usize) -> Result<usize, CodecError> {
        Ok(1)
    }

    fn write(&self, buf: &mut [u8], position: usize, value: &bool) -> Result<(), CodecError> {
        write_bytes(buf, position, &[u8::from(*value)])
    }

    fn read(&self, buf: &[u8], position: usize) -> Result<bool, CodecError> {
        read_array::<1>(buf, position).map(|[byte]| byte != 0)
    }
}

impl FixedSizeDataType for BooleanDataType {
    fn fixed_size(&self) -> usize {
        1
    }
}
