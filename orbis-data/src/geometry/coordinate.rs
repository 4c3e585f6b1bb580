//! Fixed-size codecs for single positions.

use geo::{Coord, Point};
use orbis_core::CodecError;
use orbis_core::codec::{DataType, DoubleDataType, FixedSizeDataType};

const COORDINATE_SIZE: usize = 16;
const ORDINATE_SIZE: usize = 8;

fn write_coord(buf: &mut [u8], position: usize, coord: Coord<f64>) -> Result<(), CodecError> {
    DoubleDataType.write(buf, position, &coord.x)?;
    DoubleDataType.write(buf, position + ORDINATE_SIZE, &coord.y)
}

fn read_coord(buf: &[u8], position: usize) -> Result<Coord<f64>, CodecError> {
    Ok(Coord {
        x: DoubleDataType.read(buf, position)?,
        y: DoubleDataType.read(buf, position + ORDINATE_SIZE)?,
    })
}

const ABSENT: Coord<f64> = Coord {
    x: f64::NAN,
    y: f64::NAN,
};

fn is_absent(coord: Coord<f64>) -> bool {
    coord.x.is_nan() && coord.y.is_nan()
}

/// `x` then `y` as little-endian `f64`s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CoordinateDataType;

impl DataType for CoordinateDataType {
    type Value = Coord<f64>;

    fn size(&self, _value: &Coord<f64>) -> usize {
        COORDINATE_SIZE
    }

    fn size_at(&self, _buf: &[u8], _position: usize) -> Result<usize, CodecError> {
        Ok(COORDINATE_SIZE)
    }

    fn write(&self, buf: &mut [u8], position: usize, value: &Coord<f64>) -> Result<(), CodecError> {
        write_coord(buf, position, *value)
    }

    fn read(&self, buf: &[u8], position: usize) -> Result<Coord<f64>, CodecError> {
        read_coord(buf, position)
    }
}

impl FixedSizeDataType for CoordinateDataType {
    fn fixed_size(&self) -> usize {
        COORDINATE_SIZE
    }
}

/// A coordinate that may be missing; `None` is stored as a NaN pair.
///
/// Node caches use this so unresolvable nodes keep their slot.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use orbis_core::codec::DataType;
/// use orbis_data::OptionalCoordinateDataType;
///
/// # fn main() -> Result<(), orbis_core::CodecError> {
/// let mut buf = [0_u8; 32];
/// OptionalCoordinateDataType.write(&mut buf, 0, &Some(Coord { x: 2.35, y: 48.85 }))?;
/// OptionalCoordinateDataType.write(&mut buf, 16, &None)?;
/// assert_eq!(OptionalCoordinateDataType.read(&buf, 0)?, Some(Coord { x: 2.35, y: 48.85 }));
/// assert_eq!(OptionalCoordinateDataType.read(&buf, 16)?, None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OptionalCoordinateDataType;

impl DataType for OptionalCoordinateDataType {
    type Value = Option<Coord<f64>>;

    fn size(&self, _value: &Self::Value) -> usize {
        COORDINATE_SIZE
    }

    fn size_at(&self, _buf: &[u8], _position: usize) -> Result<usize, CodecError> {
        Ok(COORDINATE_SIZE)
    }

    fn write(&self, buf: &mut [u8], position: usize, value: &Self::Value) -> Result<(), CodecError> {
        write_coord(buf, position, value.unwrap_or(ABSENT))
    }

    fn read(&self, buf: &[u8], position: usize) -> Result<Self::Value, CodecError> {
        let coord = read_coord(buf, position)?;
        Ok((!is_absent(coord)).then_some(coord))
    }
}

impl FixedSizeDataType for OptionalCoordinateDataType {
    fn fixed_size(&self) -> usize {
        COORDINATE_SIZE
    }
}

/// Points, where the empty point (`None`) is the NaN/NaN sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PointDataType;

impl DataType for PointDataType {
    type Value = Option<Point<f64>>;

    fn size(&self, _value: &Self::Value) -> usize {
        COORDINATE_SIZE
    }

    fn size_at(&self, _buf: &[u8], _position: usize) -> Result<usize, CodecError> {
        Ok(COORDINATE_SIZE)
    }

    fn write(&self, buf: &mut [u8], position: usize, value: &Self::Value) -> Result<(), CodecError> {
        write_coord(buf, position, value.map_or(ABSENT, |point| point.0))
    }

    fn read(&self, buf: &[u8], position: usize) -> Result<Self::Value, CodecError> {
        OptionalCoordinateDataType
            .read(buf, position)
            .map(|coord| coord.map(Point::from))
    }
}

impl FixedSizeDataType for PointDataType {
    fn fixed_size(&self) -> usize {
        COORDINATE_SIZE
    }
}
