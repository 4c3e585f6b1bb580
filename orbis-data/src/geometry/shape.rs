//! Variable-size codecs for multi-vertex geometries.
//!
//! Every value starts with its total size, followed by self-describing
//! elements, so nested rings and members are skipped with `size_at` alone.

use std::iter;

use geo::{
    Coord, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon,
};
use orbis_core::CodecError;
use orbis_core::codec::bytes::{PREFIX_SIZE, advance, write_prefix};
use orbis_core::codec::{DataType, ListDataType};

use super::{CoordinateDataType, GeometryDataType};

/// Writes a size prefix followed by every element of `items`.
fn write_sequence<'a, D, I>(
    codec: &D,
    buf: &mut [u8],
    position: usize,
    items: I,
) -> Result<(), CodecError>
where
    D: DataType,
    D::Value: 'a,
    I: IntoIterator<Item = &'a D::Value> + Clone,
{
    write_prefix(buf, position, sequence_size(codec, items.clone()))?;
    let mut cursor = advance(position, PREFIX_SIZE)?;
    for item in items {
        codec.write(buf, cursor, item)?;
        cursor = advance(cursor, codec.size(item))?;
    }
    Ok(())
}

fn sequence_size<'a, D, I>(codec: &D, items: I) -> usize
where
    D: DataType,
    D::Value: 'a,
    I: IntoIterator<Item = &'a D::Value>,
{
    PREFIX_SIZE + items.into_iter().map(|item| codec.size(item)).sum::<usize>()
}

fn read_sequence<D: DataType>(
    codec: &D,
    buf: &[u8],
    position: usize,
) -> Result<Vec<D::Value>, CodecError> {
    ListDataType::new(codec).read(buf, position)
}

fn line_coords(line: &LineString<f64>) -> &[Coord<f64>] {
    &line.0
}

fn point_coords(points: &MultiPoint<f64>) -> impl Iterator<Item = &Coord<f64>> + Clone {
    points.0.iter().map(|point| &point.0)
}

fn line_strings(lines: &MultiLineString<f64>) -> &[LineString<f64>] {
    &lines.0
}

fn polygons(multi: &MultiPolygon<f64>) -> &[Polygon<f64>] {
    &multi.0
}

fn members(collection: &GeometryCollection<f64>) -> &[geo::Geometry<f64>] {
    &collection.0
}

fn multi_point(coords: Vec<Coord<f64>>) -> MultiPoint<f64> {
    coords.into_iter().map(Point::from).collect()
}

macro_rules! sequence_data_type {
    ($(#[$meta:meta])* $name:ident, $value:ty, $element:expr, $items:expr, $build:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name;

        impl DataType for $name {
            type Value = $value;

            fn size(&self, value: &$value) -> usize {
                sequence_size(&$element, $items(value))
            }

            fn size_at(&self, buf: &[u8], position: usize) -> Result<usize, CodecError> {
                ListDataType::new($element).size_at(buf, position)
            }

            fn write(&self, buf: &mut [u8], position: usize, value: &$value) -> Result<(), CodecError> {
                write_sequence(&$element, buf, position, $items(value))
            }

            fn read(&self, buf: &[u8], position: usize) -> Result<$value, CodecError> {
                read_sequence(&$element, buf, position).map($build)
            }
        }
    };
}

sequence_data_type!(
    /// Line strings as a prefixed run of coordinates.
    LineStringDataType,
    LineString<f64>,
    CoordinateDataType,
    line_coords,
    LineString::new
);

sequence_data_type!(
    /// Multi-points as a prefixed run of coordinates.
    MultiPointDataType,
    MultiPoint<f64>,
    CoordinateDataType,
    point_coords,
    multi_point
);

sequence_data_type!(
    /// Multi-line strings as a prefixed run of line strings.
    MultiLineStringDataType,
    MultiLineString<f64>,
    LineStringDataType,
    line_strings,
    MultiLineString::new
);

sequence_data_type!(
    /// Multi-polygons as a prefixed run of polygons.
    MultiPolygonDataType,
    MultiPolygon<f64>,
    PolygonDataType,
    polygons,
    MultiPolygon::new
);

sequence_data_type!(
    /// Geometry collections as a prefixed run of tagged geometries.
    GeometryCollectionDataType,
    GeometryCollection<f64>,
    GeometryDataType,
    members,
    GeometryCollection
);

/// Polygons as a prefixed run of rings, exterior first.
///
/// A polygon without rings decodes to an empty exterior.
///
/// # Examples
///
/// ```
/// use geo::{LineString, Polygon};
/// use orbis_core::codec::DataType;
/// use orbis_data::PolygonDataType;
///
/// # fn main() -> Result<(), orbis_core::CodecError> {
/// let square = Polygon::new(
///     LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]),
///     vec![],
/// );
/// let mut buf = vec![0_u8; PolygonDataType.size(&square)];
/// PolygonDataType.write(&mut buf, 0, &square)?;
/// assert_eq!(PolygonDataType.size_at(&buf, 0)?, buf.len());
/// assert_eq!(PolygonDataType.read(&buf, 0)?, square);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PolygonDataType;

fn rings(polygon: &Polygon<f64>) -> impl Iterator<Item = &LineString<f64>> + Clone {
    iter::once(polygon.exterior()).chain(polygon.interiors())
}

impl DataType for PolygonDataType {
    type Value = Polygon<f64>;

    fn size(&self, value: &Polygon<f64>) -> usize {
        sequence_size(&LineStringDataType, rings(value))
    }

    fn size_at(&self, buf: &[u8], position: usize) -> Result<usize, CodecError> {
        ListDataType::new(LineStringDataType).size_at(buf, position)
    }

    fn write(&self, buf: &mut [u8], position: usize, value: &Polygon<f64>) -> Result<(), CodecError> {
        write_sequence(&LineStringDataType, buf, position, rings(value))
    }

    fn read(&self, buf: &[u8], position: usize) -> Result<Polygon<f64>, CodecError> {
        let mut rings = read_sequence(&LineStringDataType, buf, position)?.into_iter();
        let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
        Ok(Polygon::new(exterior, rings.collect()))
    }
}
