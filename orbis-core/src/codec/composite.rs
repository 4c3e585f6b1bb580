//! Codecs composed from other codecs.

use super::bytes::{advance, read_array, write_bytes};
use super::{DataType, FixedSizeDataType};
use crate::error::CodecError;

/// Two values stored back to back.
///
/// The pair is fixed-size when both halves are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PairDataType<A, B> {
    first: A,
    second: B,
}

impl<A, B> PairDataType<A, B> {
    /// Combines two codecs.
    pub const fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: DataType, B: DataType> DataType for PairDataType<A, B> {
    type Value = (A::Value, B::Value);

    fn size(&self, (first, second): &Self::Value) -> usize {
        self.first.size(first) + self.second.size(second)
    }

    fn size_at(&self, buf: &[u8], position: usize) -> Result<usize, CodecError> {
        let first = self.first.size_at(buf, position)?;
        let second = self.second.size_at(buf, advance(position, first)?)?;
        Ok(first + second)
    }

    fn write(
        &self,
        buf: &mut [u8],
        position: usize,
        (first, second): &Self::Value,
    ) -> Result<(), CodecError> {
        self.first.write(buf, position, first)?;
        self.second
            .write(buf, advance(position, self.first.size(first))?, second)
    }

    fn read(&self, buf: &[u8], position: usize) -> Result<Self::Value, CodecError> {
        let offset = advance(position, self.first.size_at(buf, position)?)?;
        Ok((self.first.read(buf, position)?, self.second.read(buf, offset)?))
    }
}

impl<A: FixedSizeDataType, B: FixedSizeDataType> FixedSizeDataType for PairDataType<A, B> {
    fn fixed_size(&self) -> usize {
        self.first.fixed_size() + self.second.fixed_size()
    }
}

/// A presence byte followed by the value when present.
///
/// Absent values occupy the presence byte only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OptionalDataType<D> {
    inner: D,
}

impl<D> OptionalDataType<D> {
    /// Wraps the codec of the present value.
    pub const fn new(inner: D) -> Self {
        Self { inner }
    }
}

impl<D: DataType> DataType for OptionalDataType<D> {
    type Value = Option<D::Value>;

    fn size(&self, value: &Self::Value) -> usize {
        1 + value.as_ref().map_or(0, |value| self.inner.size(value))
    }

    fn size_at(&self, buf: &[u8], position: usize) -> Result<usize, CodecError> {
        match read_array::<1>(buf, position)? {
            [0] => Ok(1),
            _ => Ok(1 + self.inner.size_at(buf, advance(position, 1)?)?),
        }
    }

    fn write(
        &self,
        buf: &mut [u8],
        position: usize,
        value: &Self::Value,
    ) -> Result<(), CodecError> {
        match value {
            Some(value) => {
                write_bytes(buf, position, &[1])?;
                self.inner.write(buf, advance(position, 1)?, value)
            }
            None => write_bytes(buf, position, &[0]),
        }
    }

    fn read(&self, buf: &[u8], position: usize) -> Result<Self::Value, CodecError> {
        match read_array::<1>(buf, position)? {
            [0] => Ok(None),
            _ => self.inner.read(buf, advance(position, 1)?).map(Some),
        }
    }
}
