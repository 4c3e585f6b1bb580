//! Length-prefixed codecs for strings, byte strings and nested lists.

use super::bytes::{PREFIX_SIZE, advance, read_prefix, slice, write_bytes, write_prefix};
use super::{DataType, IntegerDataType, LongDataType};
use crate::error::CodecError;

/// Reads the payload of a prefixed value, checking the whole region is present.
fn payload(buf: &[u8], position: usize) -> Result<&[u8], CodecError> {
    let size = read_prefix(buf, position)?;
    slice(buf, position + PREFIX_SIZE, size - PREFIX_SIZE)
}

/// UTF-8 strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StringDataType;

impl DataType for StringDataType {
    type Value = String;

    fn size(&self, value: &String) -> usize {
        PREFIX_SIZE + value.len()
    }

    fn size_at(&self, buf: &[u8], position: usize) -> Result<usize, CodecError> {
        read_prefix(buf, position)
    }

    fn write(&self, buf: &mut [u8], position: usize, value: &String) -> Result<(), CodecError> {
        write_prefix(buf, position, self.size(value))?;
        write_bytes(buf, position + PREFIX_SIZE, value.as_bytes())
    }

    fn read(&self, buf: &[u8], position: usize) -> Result<String, CodecError> {
        let bytes = payload(buf, position)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8 { position })
    }
}

/// Raw byte strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ByteListDataType;

impl DataType for ByteListDataType {
    type Value = Vec<u8>;

    fn size(&self, value: &Vec<u8>) -> usize {
        PREFIX_SIZE + value.len()
    }

    fn size_at(&self, buf: &[u8], position: usize) -> Result<usize, CodecError> {
        read_prefix(buf, position)
    }

    fn write(&self, buf: &mut [u8], position: usize, value: &Vec<u8>) -> Result<(), CodecError> {
        write_prefix(buf, position, self.size(value))?;
        write_bytes(buf, position + PREFIX_SIZE, value)
    }

    fn read(&self, buf: &[u8], position: usize) -> Result<Vec<u8>, CodecError> {
        payload(buf, position).map(<[u8]>::to_vec)
    }
}

/// A list of self-describing elements behind one total-size prefix.
///
/// Elements are read back by advancing `position += size_at(position)` until
/// the prefix limit is reached, so the element codec may itself be variable.
///
/// # Examples
///
/// ```
/// use orbis_core::codec::{DataType, ListDataType, StringDataType};
///
/// # fn main() -> Result<(), orbis_core::CodecError> {
/// let codec = ListDataType::new(StringDataType);
/// let tags = vec![String::from("name"), String::from("highway")];
/// let mut buf = vec![0_u8; codec.size(&tags)];
/// codec.write(&mut buf, 0, &tags)?;
/// assert_eq!(codec.read(&buf, 0)?, tags);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ListDataType<D> {
    element: D,
}

/// A list of `i32` values.
pub type IntegerListDataType = ListDataType<IntegerDataType>;

/// A list of `i64` values, as used for way and relation member references.
pub type LongListDataType = ListDataType<LongDataType>;

impl<D> ListDataType<D> {
    /// Wraps an element codec.
    pub const fn new(element: D) -> Self {
        Self { element }
    }

    /// Codec used for each element.
    pub const fn element(&self) -> &D {
        &self.element
    }
}

impl<D: DataType> DataType for ListDataType<D> {
    type Value = Vec<D::Value>;

    fn size(&self, value: &Self::Value) -> usize {
        PREFIX_SIZE
            + value
                .iter()
                .map(|element| self.element.size(element))
                .sum::<usize>()
    }

    fn size_at(&self, buf: &[u8], position: usize) -> Result<usize, CodecError> {
        read_prefix(buf, position)
    }

    fn write(
        &self,
        buf: &mut [u8],
        position: usize,
        value: &Self::Value,
    ) -> Result<(), CodecError> {
        write_prefix(buf, position, self.size(value))?;
        let mut cursor = position + PREFIX_SIZE;
        for element in value {
            self.element.write(buf, cursor, element)?;
            cursor = advance(cursor, self.element.size(element))?;
        }
        Ok(())
    }

    fn read(&self, buf: &[u8], position: usize) -> Result<Self::Value, CodecError> {
        let size = read_prefix(buf, position)?;
        let end = advance(position, size)?;
        slice(buf, position, size)?;
        let mut cursor = position + PREFIX_SIZE;
        let mut values = Vec::new();
        while cursor < end {
            let step = self.element.size_at(buf, cursor)?;
            if step == 0 || step > end - cursor {
                return Err(CodecError::InvalidSize {
                    position: cursor,
                    size: step,
                });
            }
            values.push(self.element.read(buf, cursor)?);
            cursor += step;
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn round_trip<D: DataType>(codec: &D, value: &D::Value) -> D::Value {
        let size = codec.size(value);
        let mut buf = vec![0_u8; size + 5];
        codec.write(&mut buf, 5, value).expect("write");
        assert_eq!(codec.size_at(&buf, 5).expect("size"), size);
        codec.read(&buf, 5).expect("read")
    }

    #[rstest]
    #[case("")]
    #[case("residential")]
    #[case("Zürich Hauptbahnhof")]
    fn strings_round_trip(#[case] value: &str) {
        assert_eq!(round_trip(&StringDataType, &value.to_owned()), value);
    }

    #[rstest]
    fn empty_list_is_just_a_prefix() {
        let codec = LongListDataType::default();
        assert_eq!(codec.size(&Vec::new()), PREFIX_SIZE);
        assert!(round_trip(&codec, &Vec::new()).is_empty());
    }

    #[rstest]
    fn nested_lists_read_back_element_by_element() {
        let codec = ListDataType::new(IntegerListDataType::default());
        let value = vec![vec![1, 2], Vec::new(), vec![3]];
        assert_eq!(round_trip(&codec, &value), value);
    }

    #[rstest]
    fn invalid_utf8_is_reported() {
        let mut buf = vec![0_u8; 6];
        ByteListDataType
            .write(&mut buf, 0, &vec![0xff, 0xfe])
            .expect("write");
        assert_eq!(
            StringDataType.read(&buf, 0),
            Err(CodecError::InvalidUtf8 { position: 0 })
        );
    }

    #[rstest]
    fn truncated_payload_is_reported() {
        let mut buf = vec![0_u8; 12];
        StringDataType
            .write(&mut buf, 0, &"abcdefgh".to_owned())
            .expect("write");
        assert!(matches!(
            StringDataType.read(&buf[..8], 0),
            Err(CodecError::OutOfBounds { .. })
        ));
    }

    proptest! {
        #[test]
        fn long_lists_round_trip(values in prop::collection::vec(any::<i64>(), 0..64)) {
            prop_assert_eq!(round_trip(&LongListDataType::default(), &values), values);
        }

        #[test]
        fn byte_lists_round_trip(values in prop::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(round_trip(&ByteListDataType, &values), values);
        }
    }
}
