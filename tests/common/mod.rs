//! Shared fixture helpers for integration tests.
//!
//! Source GeoPackages are assembled in a temp directory through the crate's
//! own container API: a `gemaal`-style point layer in EPSG:28992 plus a
//! `pomp`-style attribute table referencing it.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use hydamo_duplicates::geom;
use hydamo_duplicates::{
    AttributeTable, GpkgContainer, PointFeature, PointLayer, SpatialRefSys, Value,
};

/// A temp directory that owns the GeoPackage files of one test.
pub struct TestDir {
    dir: tempfile::TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        TestDir {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// A point layer with one feature per `(globalid, x, y)`, plus a `code`
/// attribute derived from the globalid.
pub fn point_layer(name: &str, features: &[(&str, f64, f64)]) -> PointLayer {
    PointLayer {
        name: name.to_string(),
        geometry_column: "geom".to_string(),
        geometry_type: "POINT".to_string(),
        srs: SpatialRefSys::rd_new(),
        columns: vec!["globalid".into(), "code".into()],
        features: features
            .iter()
            .map(|(globalid, x, y)| PointFeature {
                geometry: Some(geom::encode_point(*x, *y, 28992).expect("encode point")),
                attributes: vec![
                    Value::from(*globalid),
                    Value::Text(format!("GM-{globalid}")),
                ],
            })
            .collect(),
    }
}

/// An attribute table with one row per foreign-key reference. Each row also
/// carries its own `globalid` and a numeric `capaciteit` so the rewrite can
/// be checked to leave other columns alone.
pub fn reference_table(name: &str, fk_column: &str, refs: &[&str]) -> AttributeTable {
    AttributeTable {
        name: name.to_string(),
        columns: vec![
            "globalid".into(),
            fk_column.to_string(),
            "capaciteit".into(),
        ],
        rows: refs
            .iter()
            .enumerate()
            .map(|(i, reference)| {
                vec![
                    Value::Text(format!("PMP-{i}")),
                    Value::from(*reference),
                    Value::Real(25.0 + i as f64),
                ]
            })
            .collect(),
    }
}

/// Write a source GeoPackage containing both layers.
pub fn write_source(path: &Path, layer: &PointLayer, table: &AttributeTable) {
    let mut gpkg = GpkgContainer::create(path).expect("create source gpkg");
    gpkg.write_feature_layer(layer).expect("write point layer");
    gpkg.write_attribute_table(table).expect("write table layer");
}

/// The values of one column of an attribute table, as text.
pub fn text_column(table: &AttributeTable, column: &str) -> Vec<String> {
    let idx = table.column_index(column).expect("column exists");
    table
        .rows
        .iter()
        .map(|row| {
            row[idx]
                .as_text()
                .unwrap_or_else(|| panic!("non-text value in column {column}"))
                .to_string()
        })
        .collect()
}

/// The `globalid` values of a point layer, in row order.
pub fn globalids(layer: &PointLayer) -> Vec<String> {
    let idx = layer.column_index("globalid").expect("globalid exists");
    layer
        .features
        .iter()
        .map(|f| {
            f.attributes[idx]
                .as_text()
                .expect("text globalid")
                .to_string()
        })
        .collect()
}
