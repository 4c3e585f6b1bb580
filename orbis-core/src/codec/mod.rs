//! Binary codecs that place values into segment buffers.
//!
//! A [`DataType`] is a stateless description of how one value is laid out at
//! a byte position. Fixed-size codecs implement [`FixedSizeDataType`] and
//! always occupy the same number of bytes; variable-size codecs start with a
//! little-endian `u32` holding the total encoded size (prefix included), so
//! [`DataType::size_at`] never needs to decode the payload.
//!
//! Writing then reading a value at the same position returns an equal value,
//! and `size(&value)` always equals `size_at` over the written bytes.

use crate::error::CodecError;

pub mod bytes;
mod composite;
mod primitive;
mod variable;

pub use composite::{OptionalDataType, PairDataType};
pub use primitive::{
    BooleanDataType, ByteDataType, DoubleDataType, FloatDataType, IntegerDataType, LongDataType,
    ShortDataType, UnsignedLongDataType,
};
pub use variable::{
    ByteListDataType, IntegerListDataType, ListDataType, LongListDataType, StringDataType,
};

/// Serialises values of one type at arbitrary buffer positions.
///
/// # Examples
///
/// ```
/// use orbis_core::codec::{DataType, StringDataType};
///
/// # fn main() -> Result<(), orbis_core::CodecError> {
/// let codec = StringDataType;
/// let value = String::from("highway");
/// let mut buf = vec![0_u8; 32];
/// codec.write(&mut buf, 3, &value)?;
/// assert_eq!(codec.size_at(&buf, 3)?, codec.size(&value));
/// assert_eq!(codec.read(&buf, 3)?, value);
/// # Ok(())
/// # }
/// ```
pub trait DataType: Send + Sync {
    /// Decoded value type.
    type Value;

    /// Number of bytes `value` occupies once encoded.
    fn size(&self, value: &Self::Value) -> usize;

    /// Number of bytes of the value encoded at `position`.
    fn size_at(&self, buf: &[u8], position: usize) -> Result<usize, CodecError>;

    /// Encodes `value` at `position`.
    fn write(&self, buf: &mut [u8], position: usize, value: &Self::Value)
    -> Result<(), CodecError>;

    /// Decodes the value stored at `position`.
    fn read(&self, buf: &[u8], position: usize) -> Result<Self::Value, CodecError>;
}

/// A codec whose encoding always has the same length.
///
/// An all-zero region decodes to the codec's zero value.
pub trait FixedSizeDataType: DataType {
    /// Encoded length of every value.
    fn fixed_size(&self) -> usize;
}

impl<D: DataType + ?Sized> DataType for &D {
    type Value = D::Value;

    fn size(&self, value: &Self::Value) -> usize {
        (**self).size(value)
    }

    fn size_at(&self, buf: &[u8], position: usize) -> Result<usize, CodecError> {
        (**self).size_at(buf, position)
    }

    fn write(
        &self,
        buf: &mut [u8],
        position: usize,
        value: &Self::Value,
    ) -> Result<(), CodecError> {
        (**self).write(buf, position, value)
    }

    fn read(&self, buf: &[u8], position: usize) -> Result<Self::Value, CodecError> {
        (**self).read(buf, position)
    }
}

impl<D: FixedSizeDataType + ?Sized> FixedSizeDataType for &D {
    fn fixed_size(&self) -> usize {
        (**self).fixed_size()
    }
}
