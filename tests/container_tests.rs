//! Tests for GeoPackage container reads, writes, and registry entries.

mod common;

use common::{TestDir, point_layer, reference_table};
use hydamo_duplicates::{DataType, GpkgContainer, HydamoDupError};

#[test]
fn test_created_container_is_a_readable_geopackage() {
    let dir = TestDir::new();
    let path = dir.path("fresh.gpkg");
    GpkgContainer::create(&path).unwrap();

    let gpkg = GpkgContainer::open_read_only(&path).unwrap();
    assert!(gpkg.contents().unwrap().is_empty(), "no layers registered yet");
}

#[test]
fn test_open_read_only_rejects_plain_sqlite() {
    let dir = TestDir::new();
    let path = dir.path("plain.sqlite");
    // A valid SQLite database without the GeoPackage registry.
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute("CREATE TABLE t (x INTEGER)", []).unwrap();
    drop(conn);

    let err = GpkgContainer::open_read_only(&path).unwrap_err();
    assert!(matches!(err, HydamoDupError::NotAGeoPackage(_)));
    assert!(err.is_schema_error());
}

#[test]
fn test_open_read_only_missing_file_fails() {
    let dir = TestDir::new();
    let err = GpkgContainer::open_read_only(dir.path("nope.gpkg")).unwrap_err();
    assert!(matches!(err, HydamoDupError::Sqlite(_)));
}

#[test]
fn test_feature_layer_roundtrip() {
    let dir = TestDir::new();
    let path = dir.path("layer.gpkg");
    let layer = point_layer(
        "gemaal",
        &[("P1", 155000.0, 463000.0), ("P2", 156200.5, 464100.25)],
    );
    let mut gpkg = GpkgContainer::create(&path).unwrap();
    gpkg.write_feature_layer(&layer).unwrap();

    let read = GpkgContainer::open_read_only(&path)
        .unwrap()
        .read_feature_layer("gemaal")
        .unwrap();

    assert_eq!(read.name, "gemaal");
    assert_eq!(read.geometry_column, "geom");
    assert_eq!(read.geometry_type, "POINT");
    assert_eq!(read.srs.srs_id, 28992);
    assert_eq!(read.srs.organization, "EPSG");
    assert_eq!(read.columns, ["globalid", "code"], "feature id not surfaced as a column");
    assert_eq!(read.features.len(), 2);
    for (original, roundtripped) in layer.features.iter().zip(&read.features) {
        assert_eq!(roundtripped.geometry, original.geometry, "blob carried opaquely");
        assert_eq!(roundtripped.attributes, original.attributes);
    }
}

#[test]
fn test_feature_layer_contents_entry_has_envelope() {
    let dir = TestDir::new();
    let path = dir.path("layer.gpkg");
    let layer = point_layer(
        "gemaal",
        &[("P1", 155000.0, 463000.0), ("P2", 156000.0, 464000.0)],
    );
    let mut gpkg = GpkgContainer::create(&path).unwrap();
    gpkg.write_feature_layer(&layer).unwrap();

    let contents = gpkg.contents().unwrap();
    let entry = contents
        .iter()
        .find(|e| e.table_name == "gemaal")
        .expect("gemaal registered");
    assert_eq!(entry.data_type, DataType::Features);
    assert_eq!(entry.identifier.as_deref(), Some("gemaal"));
    assert_eq!(entry.srs_id, Some(28992));

    let bounds = entry.bounds.expect("envelope computed from the points");
    assert_eq!(bounds.min_x, 155000.0);
    assert_eq!(bounds.max_x, 156000.0);
    assert_eq!(bounds.min_y, 463000.0);
    assert_eq!(bounds.max_y, 464000.0);
}

#[test]
fn test_attribute_table_roundtrip() {
    let dir = TestDir::new();
    let path = dir.path("table.gpkg");
    let table = reference_table("pomp", "gemaalid", &["P1", "P1", "P2"]);
    let mut gpkg = GpkgContainer::create(&path).unwrap();
    gpkg.write_attribute_table(&table).unwrap();

    let read = GpkgContainer::open_read_only(&path)
        .unwrap()
        .read_attribute_table("pomp")
        .unwrap();
    assert_eq!(read, table, "columns and rows survive the roundtrip in order");
}

#[test]
fn test_attribute_table_registered_as_attributes() {
    let dir = TestDir::new();
    let path = dir.path("table.gpkg");
    let table = reference_table("pomp", "gemaalid", &["P1"]);
    let mut gpkg = GpkgContainer::create(&path).unwrap();
    gpkg.write_attribute_table(&table).unwrap();

    let contents = gpkg.contents().unwrap();
    let entry = contents
        .iter()
        .find(|e| e.table_name == "pomp")
        .expect("pomp registered");
    assert_eq!(entry.data_type, DataType::Attributes);
    assert_eq!(entry.identifier.as_deref(), Some("pomp"));
    assert_eq!(entry.description.as_deref(), Some(""));
    assert!(entry.bounds.is_none(), "no envelope for a non-spatial table");
    assert!(entry.srs_id.is_none());
    assert!(
        entry.last_change.ends_with('Z'),
        "last_change is a UTC timestamp: {}",
        entry.last_change
    );
}

#[test]
fn test_write_dataset_registers_both_layers() {
    let dir = TestDir::new();
    let path = dir.path("both.gpkg");
    let layer = point_layer("gemaal", &[("P1", 155000.0, 463000.0)]);
    let table = reference_table("pomp", "gemaalid", &["P1"]);
    let mut gpkg = GpkgContainer::create(&path).unwrap();
    gpkg.write_dataset(&layer, &table).unwrap();

    let contents = gpkg.contents().unwrap();
    let types: Vec<(&str, &DataType)> = contents
        .iter()
        .map(|e| (e.table_name.as_str(), &e.data_type))
        .collect();
    assert_eq!(
        types,
        [
            ("gemaal", &DataType::Features),
            ("pomp", &DataType::Attributes)
        ]
    );
}

#[test]
fn test_missing_layer_reads_fail() {
    let dir = TestDir::new();
    let path = dir.path("empty.gpkg");
    GpkgContainer::create(&path).unwrap();

    let gpkg = GpkgContainer::open_read_only(&path).unwrap();
    let err = gpkg.read_feature_layer("gemaal").unwrap_err();
    assert!(matches!(err, HydamoDupError::LayerNotFound(ref n) if n == "gemaal"));
    let err = gpkg.read_attribute_table("pomp").unwrap_err();
    assert!(matches!(err, HydamoDupError::LayerNotFound(ref n) if n == "pomp"));
}

#[test]
fn test_null_geometry_feature_roundtrip() {
    let dir = TestDir::new();
    let path = dir.path("nullgeom.gpkg");
    let mut layer = point_layer("gemaal", &[("P1", 155000.0, 463000.0)]);
    layer.features[0].geometry = None;
    let mut gpkg = GpkgContainer::create(&path).unwrap();
    gpkg.write_feature_layer(&layer).unwrap();

    let read = gpkg.read_feature_layer("gemaal").unwrap();
    assert_eq!(read.features[0].geometry, None);

    let entry = gpkg
        .contents()
        .unwrap()
        .into_iter()
        .find(|e| e.table_name == "gemaal")
        .unwrap();
    assert!(entry.bounds.is_none(), "no envelope without any geometry");
}
