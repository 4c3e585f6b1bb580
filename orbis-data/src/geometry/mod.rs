//! Codecs for `geo` geometries.
//!
//! Single positions are fixed-size (two little-endian `f64`s). Everything
//! else is variable-size: a total-size prefix followed by self-describing
//! elements. [`GeometryDataType`] adds a [`GeometryKind`] tag byte so any
//! `geo::Geometry` can be stored in one collection.

use geo::{Geometry, LineString};
use orbis_core::CodecError;
use orbis_core::codec::bytes::{
    PREFIX_SIZE, advance, read_array, read_prefix, write_bytes, write_prefix,
};
use orbis_core::codec::{DataType, FixedSizeDataType};

mod coordinate;
mod shape;

pub use coordinate::{CoordinateDataType, OptionalCoordinateDataType, PointDataType};
pub use shape::{
    GeometryCollectionDataType, LineStringDataType, MultiLineStringDataType, MultiPointDataType,
    MultiPolygonDataType, PolygonDataType,
};

const TAG_SIZE: usize = 1;
const HEADER_SIZE: usize = PREFIX_SIZE + TAG_SIZE;

/// Stored shape of a [`Geometry`].
///
/// `Line` is stored as a line string, `Rect` and `Triangle` as polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GeometryKind {
    /// A single position.
    Point = 1,
    /// An open or closed run of positions.
    LineString = 2,
    /// An exterior ring with optional holes.
    Polygon = 3,
    /// Several points.
    MultiPoint = 4,
    /// Several line strings.
    MultiLineString = 5,
    /// Several polygons.
    MultiPolygon = 6,
    /// Heterogeneous geometries, possibly nested.
    GeometryCollection = 7,
}

impl GeometryKind {
    /// Kind under which `geometry` is stored.
    #[must_use]
    pub const fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) => Self::Point,
            Geometry::Line(_) | Geometry::LineString(_) => Self::LineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => Self::Polygon,
            Geometry::MultiPoint(_) => Self::MultiPoint,
            Geometry::MultiLineString(_) => Self::MultiLineString,
            Geometry::MultiPolygon(_) => Self::MultiPolygon,
            Geometry::GeometryCollection(_) => Self::GeometryCollection,
        }
    }

    /// Tag byte written ahead of the payload.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Parses a tag byte.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Point),
            2 => Some(Self::LineString),
            3 => Some(Self::Polygon),
            4 => Some(Self::MultiPoint),
            5 => Some(Self::MultiLineString),
            6 => Some(Self::MultiPolygon),
            7 => Some(Self::GeometryCollection),
            _ => None,
        }
    }
}

fn line_to_string(line: &geo::Line<f64>) -> LineString<f64> {
    LineString::new(vec![line.start, line.end])
}

/// Any geometry: total size, kind tag, then the kind's own encoding.
///
/// # Examples
///
/// ```
/// use geo::{Geometry, Point, Rect, coord};
/// use orbis_core::codec::DataType;
/// use orbis_data::GeometryDataType;
///
/// # fn main() -> Result<(), orbis_core::CodecError> {
/// let codec = GeometryDataType;
/// let point = Geometry::Point(Point::new(13.4, 52.5));
/// let rect = Geometry::Rect(Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }));
/// let mut buf = vec![0_u8; codec.size(&point) + codec.size(&rect)];
/// codec.write(&mut buf, 0, &point)?;
/// let next = codec.size_at(&buf, 0)?;
/// codec.write(&mut buf, next, &rect)?;
/// assert_eq!(codec.read(&buf, 0)?, point);
/// assert!(matches!(codec.read(&buf, next)?, Geometry::Polygon(_)));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GeometryDataType;

impl GeometryDataType {
    fn payload_size(geometry: &Geometry<f64>) -> usize {
        match geometry {
            Geometry::Point(_) => CoordinateDataType.fixed_size(),
            Geometry::Line(line) => LineStringDataType.size(&line_to_string(line)),
            Geometry::LineString(line) => LineStringDataType.size(line),
            Geometry::Polygon(polygon) => PolygonDataType.size(polygon),
            Geometry::Rect(rect) => PolygonDataType.size(&rect.to_polygon()),
            Geometry::Triangle(triangle) => PolygonDataType.size(&triangle.to_polygon()),
            Geometry::MultiPoint(points) => MultiPointDataType.size(points),
            Geometry::MultiLineString(lines) => MultiLineStringDataType.size(lines),
            Geometry::MultiPolygon(polygons) => MultiPolygonDataType.size(polygons),
            Geometry::GeometryCollection(collection) => GeometryCollectionDataType.size(collection),
        }
    }

    fn write_payload(
        buf: &mut [u8],
        position: usize,
        geometry: &Geometry<f64>,
    ) -> Result<(), CodecError> {
        match geometry {
            Geometry::Point(point) => CoordinateDataType.write(buf, position, &point.0),
            Geometry::Line(line) => LineStringDataType.write(buf, position, &line_to_string(line)),
            Geometry::LineString(line) => LineStringDataType.write(buf, position, line),
            Geometry::Polygon(polygon) => PolygonDataType.write(buf, position, polygon),
            Geometry::Rect(rect) => PolygonDataType.write(buf, position, &rect.to_polygon()),
            Geometry::Triangle(triangle) => {
                PolygonDataType.write(buf, position, &triangle.to_polygon())
            }
            Geometry::MultiPoint(points) => MultiPointDataType.write(buf, position, points),
            Geometry::MultiLineString(lines) => MultiLineStringDataType.write(buf, position, lines),
            Geometry::MultiPolygon(polygons) => MultiPolygonDataType.write(buf, position, polygons),
            Geometry::GeometryCollection(collection) => {
                GeometryCollectionDataType.write(buf, position, collection)
            }
        }
    }

    fn read_payload(
        kind: GeometryKind,
        buf: &[u8],
        position: usize,
    ) -> Result<Geometry<f64>, CodecError> {
        Ok(match kind {
            GeometryKind::Point => Geometry::Point(CoordinateDataType.read(buf, position)?.into()),
            GeometryKind::LineString => Geometry::LineString(LineStringDataType.read(buf, position)?),
            GeometryKind::Polygon => Geometry::Polygon(PolygonDataType.read(buf, position)?),
            GeometryKind::MultiPoint => Geometry::MultiPoint(MultiPointDataType.read(buf, position)?),
            GeometryKind::MultiLineString => {
                Geometry::MultiLineString(MultiLineStringDataType.read(buf, position)?)
            }
            GeometryKind::MultiPolygon => {
                Geometry::MultiPolygon(MultiPolygonDataType.read(buf, position)?)
            }
            GeometryKind::GeometryCollection => {
                Geometry::GeometryCollection(GeometryCollectionDataType.read(buf, position)?)
            }
        })
    }
}

impl DataType for GeometryDataType {
    type Value = Geometry<f64>;

    fn size(&self, value: &Geometry<f64>) -> usize {
        HEADER_SIZE + Self::payload_size(value)
    }

    fn size_at(&self, buf: &[u8], position: usize) -> Result<usize, CodecError> {
        read_prefix(buf, position)
    }

    fn write(&self, buf: &mut [u8], position: usize, value: &Geometry<f64>) -> Result<(), CodecError> {
        write_prefix(buf, position, self.size(value))?;
        let tag_position = advance(position, PREFIX_SIZE)?;
        write_bytes(buf, tag_position, &[GeometryKind::of(value).tag()])?;
        Self::write_payload(buf, advance(tag_position, TAG_SIZE)?, value)
    }

    fn read(&self, buf: &[u8], position: usize) -> Result<Geometry<f64>, CodecError> {
        let size = read_prefix(buf, position)?;
        if size < HEADER_SIZE {
            return Err(CodecError::InvalidSize { position, size });
        }
        let tag_position = advance(position, PREFIX_SIZE)?;
        let [tag] = read_array::<TAG_SIZE>(buf, tag_position)?;
        let kind = GeometryKind::from_tag(tag).ok_or(CodecError::UnknownTag {
            position: tag_position,
            tag,
        })?;
        Self::read_payload(kind, buf, advance(tag_position, TAG_SIZE)?)
    }
}
