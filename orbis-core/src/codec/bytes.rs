//! Bounds-checked byte access shared by every codec.
//!
//! Short buffers surface as [`CodecError::OutOfBounds`]; nothing here panics.

use crate::error::CodecError;

/// Width of the length prefix carried by variable-size values.
pub const PREFIX_SIZE: usize = 4;

fn out_of_bounds(buf_len: usize, position: usize, len: usize) -> CodecError {
    CodecError::OutOfBounds {
        position,
        len,
        available: buf_len,
    }
}

/// Borrows `len` bytes starting at `position`.
pub fn slice(buf: &[u8], position: usize, len: usize) -> Result<&[u8], CodecError> {
    position
        .checked_add(len)
        .and_then(|end| buf.get(position..end))
        .ok_or_else(|| out_of_bounds(buf.len(), position, len))
}

/// Mutably borrows `len` bytes starting at `position`.
pub fn slice_mut(buf: &mut [u8], position: usize, len: usize) -> Result<&mut [u8], CodecError> {
    let available = buf.len();
    position
        .checked_add(len)
        .and_then(|end| buf.get_mut(position..end))
        .ok_or_else(|| out_of_bounds(available, position, len))
}

/// Copies `N` bytes starting at `position` into an array.
pub fn read_array<const N: usize>(buf: &[u8], position: usize) -> Result<[u8; N], CodecError> {
    let mut array = [0_u8; N];
    array.copy_from_slice(slice(buf, position, N)?);
    Ok(array)
}

/// Copies `bytes` into the buffer at `position`.
pub fn write_bytes(buf: &mut [u8], position: usize, bytes: &[u8]) -> Result<(), CodecError> {
    slice_mut(buf, position, bytes.len())?.copy_from_slice(bytes);
    Ok(())
}

/// Reads the total-size prefix of a variable-size value.
pub fn read_prefix(buf: &[u8], position: usize) -> Result<usize, CodecError> {
    let size = u32::from_le_bytes(read_array(buf, position)?) as usize;
    if size < PREFIX_SIZE {
        return Err(CodecError::InvalidSize { position, size });
    }
    Ok(size)
}

/// Writes the total-size prefix of a variable-size value.
pub fn write_prefix(buf: &mut [u8], position: usize, size: usize) -> Result<(), CodecError> {
    let prefix = u32::try_from(size).map_err(|_| CodecError::TooLarge { size })?;
    write_bytes(buf, position, &prefix.to_le_bytes())
}

/// Advances `position` by `len`, failing instead of overflowing.
pub fn advance(position: usize, len: usize) -> Result<usize, CodecError> {
    position
        .checked_add(len)
        .ok_or(CodecError::InvalidSize { position, size: len })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 5)]
    #[case(3, 2)]
    #[case(usize::MAX, 1)]
    fn short_buffers_are_reported(#[case] position: usize, #[case] len: usize) {
        let buf = [0_u8; 4];
        assert_eq!(
            slice(&buf, position, len),
            Err(CodecError::OutOfBounds {
                position,
                len,
                available: 4
            })
        );
    }

    #[rstest]
    fn prefix_rejects_sizes_smaller_than_itself() {
        let mut buf = [0_u8; 8];
        write_prefix(&mut buf, 0, 2).expect("write prefix");
        assert_eq!(
            read_prefix(&buf, 0),
            Err(CodecError::InvalidSize {
                position: 0,
                size: 2
            })
        );
    }

    #[rstest]
    fn prefix_is_little_endian() {
        let mut buf = [0_u8; 4];
        write_prefix(&mut buf, 0, 0x0102).expect("write prefix");
        assert_eq!(buf, [0x02, 0x01, 0, 0]);
        assert_eq!(read_prefix(&buf, 0), Ok(0x0102));
    }
}
