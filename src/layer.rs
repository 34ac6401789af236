//! In-memory layer representations.
//!
//! A source GeoPackage is loaded fully into memory before any rewriting
//! happens: [`PointLayer`] carries geometry blobs alongside attribute rows,
//! [`AttributeTable`] carries attribute rows only. Both keep their rows in
//! source encounter order, which the duplicate-resolution pass relies on
//! (the first row of a reference group is the one that keeps the original
//! identifier).

use indexmap::IndexMap;

use crate::gpkg::SpatialRefSys;
use crate::value::Value;

/// One feature of a point layer: a GeoPackage geometry blob plus the
/// attribute cells, parallel to the layer's column list.
///
/// Duplicating a feature clones both parts byte-for-byte; only the
/// identifier cell is replaced afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    /// GeoPackage geometry BLOB (header + WKB). `None` for a NULL geometry.
    pub geometry: Option<Vec<u8>>,
    /// Attribute values, index-aligned with [`PointLayer::columns`].
    pub attributes: Vec<Value>,
}

/// A spatial point layer held in memory.
#[derive(Debug, Clone)]
pub struct PointLayer {
    /// Layer name, used as the destination table name.
    pub name: String,
    /// Name of the geometry column (from `gpkg_geometry_columns`).
    pub geometry_column: String,
    /// Geometry type name as registered, e.g. `POINT`.
    pub geometry_type: String,
    /// Spatial reference system carried from the source container.
    pub srs: SpatialRefSys,
    /// Attribute column names (feature-id column excluded).
    pub columns: Vec<String>,
    /// Features in source order; minted duplicates are appended at the end.
    pub features: Vec<PointFeature>,
}

impl PointLayer {
    /// Index of an attribute column by name, or `None`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// A non-spatial attribute table held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeTable {
    /// Table name, used as the destination table name.
    pub name: String,
    /// Column names (primary-key column excluded).
    pub columns: Vec<String>,
    /// Rows in source order, each index-aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
}

impl AttributeTable {
    /// Index of a column by name, or `None`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Partition row indices by the TEXT value of one column, preserving
    /// encounter order of both the keys and the rows within each group.
    ///
    /// Rows whose cell is NULL or non-text carry no usable reference and are
    /// left out of the partition entirely.
    pub fn group_by_text_column(&self, column: usize) -> IndexMap<String, Vec<usize>> {
        let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (idx, row) in self.rows.iter().enumerate() {
            if let Some(key) = row.get(column).and_then(Value::as_text) {
                groups.entry(key.to_string()).or_default().push(idx);
            }
        }
        groups
    }
}
