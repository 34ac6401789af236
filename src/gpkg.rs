//! GeoPackage container access — registry tables and layer I/O.
//!
//! A GeoPackage is a SQLite database with three mandatory registry tables:
//! `gpkg_spatial_ref_sys`, `gpkg_contents`, and `gpkg_geometry_columns`.
//! This module provides typed Rust abstractions over those tables plus
//! whole-layer reads and writes for the two layer kinds the resolver needs:
//! spatial feature layers and non-spatial attribute tables.
//!
//! Reads resolve a feature layer's geometry column through
//! `gpkg_geometry_columns` and load rows in `rowid` order, so in-memory row
//! order matches source encounter order. Feature-id primary-key columns are
//! dropped on read and regenerated on write; ids are an artifact of the
//! container, not of the data model.
//!
//! All destination writes for one run go through [`GpkgContainer::write_dataset`],
//! which executes in a single SQLite transaction: either the whole corrected
//! dataset commits or nothing does.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction, params};
use tracing::debug;

use crate::error::HydamoDupError;
use crate::geom::{self, XyEnvelope};
use crate::layer::{AttributeTable, PointFeature, PointLayer};
use crate::value::{Value, infer_decl_type};

/// SQLite `application_id` for GeoPackage files: "GPKG" in big-endian.
const GPKG_APPLICATION_ID: i64 = 0x4750_4B47;

/// SQLite `user_version` for GeoPackage 1.3.
const GPKG_USER_VERSION: i64 = 10300;

/// DDL for the mandatory registry tables, per the OGC GeoPackage spec.
const REGISTRY_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS gpkg_spatial_ref_sys (
    srs_name                 TEXT NOT NULL,
    srs_id                   INTEGER PRIMARY KEY,
    organization             TEXT NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition               TEXT NOT NULL,
    description              TEXT
);

CREATE TABLE IF NOT EXISTS gpkg_contents (
    table_name  TEXT PRIMARY KEY,
    data_type   TEXT NOT NULL,
    identifier  TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    min_x       DOUBLE,
    min_y       DOUBLE,
    max_x       DOUBLE,
    max_y       DOUBLE,
    srs_id      INTEGER,
    CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id)
        REFERENCES gpkg_spatial_ref_sys(srs_id)
);

CREATE TABLE IF NOT EXISTS gpkg_geometry_columns (
    table_name         TEXT NOT NULL,
    column_name        TEXT NOT NULL,
    geometry_type_name TEXT NOT NULL,
    srs_id             INTEGER NOT NULL,
    z                  TINYINT NOT NULL,
    m                  TINYINT NOT NULL,
    CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
    CONSTRAINT fk_gc_tn FOREIGN KEY (table_name)
        REFERENCES gpkg_contents(table_name),
    CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id)
        REFERENCES gpkg_spatial_ref_sys(srs_id)
);

INSERT OR IGNORE INTO gpkg_spatial_ref_sys VALUES
    ('Undefined Cartesian SRS', -1, 'NONE', -1, 'undefined',
     'undefined Cartesian coordinate reference system'),
    ('Undefined Geographic SRS', 0, 'NONE', 0, 'undefined',
     'undefined geographic coordinate reference system'),
    ('WGS 84 geodetic', 4326, 'EPSG', 4326,
     'GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]]',
     'longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid');
"#;

/// Quote a SQL identifier (layer and column names are caller-supplied).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Content data type of a `gpkg_contents` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    /// A vector feature layer (has a row in `gpkg_geometry_columns`).
    Features,
    /// A non-spatial attribute table.
    Attributes,
    /// Any other registered content (tiles, extensions).
    Other(String),
}

impl DataType {
    /// Serialize to the `gpkg_contents.data_type` value.
    pub fn as_str(&self) -> &str {
        match self {
            DataType::Features => "features",
            DataType::Attributes => "attributes",
            DataType::Other(s) => s,
        }
    }

    /// Deserialize from a `gpkg_contents.data_type` value.
    pub fn from_str(s: &str) -> Self {
        match s {
            "features" => DataType::Features,
            "attributes" => DataType::Attributes,
            other => DataType::Other(other.to_string()),
        }
    }
}

/// One row of `gpkg_contents`.
#[derive(Debug, Clone)]
pub struct ContentsEntry {
    pub table_name: String,
    pub data_type: DataType,
    pub identifier: Option<String>,
    pub description: Option<String>,
    pub last_change: String,
    pub bounds: Option<XyEnvelope>,
    pub srs_id: Option<i32>,
}

/// One row of `gpkg_spatial_ref_sys`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialRefSys {
    pub srs_name: String,
    pub srs_id: i32,
    pub organization: String,
    pub organization_coordsys_id: i32,
    pub definition: String,
    pub description: Option<String>,
}

impl SpatialRefSys {
    /// WGS 84 (EPSG:4326), present in every GeoPackage.
    pub fn wgs84() -> Self {
        SpatialRefSys {
            srs_name: "WGS 84 geodetic".into(),
            srs_id: 4326,
            organization: "EPSG".into(),
            organization_coordsys_id: 4326,
            definition: "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563,AUTHORITY[\"EPSG\",\"7030\"]],AUTHORITY[\"EPSG\",\"6326\"]],PRIMEM[\"Greenwich\",0,AUTHORITY[\"EPSG\",\"8901\"]],UNIT[\"degree\",0.0174532925199433,AUTHORITY[\"EPSG\",\"9122\"]],AUTHORITY[\"EPSG\",\"4326\"]]".into(),
            description: Some("longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid".into()),
        }
    }

    /// Amersfoort / RD New (EPSG:28992), the projected CRS HyDAMO data
    /// is normally delivered in.
    pub fn rd_new() -> Self {
        SpatialRefSys {
            srs_name: "Amersfoort / RD New".into(),
            srs_id: 28992,
            organization: "EPSG".into(),
            organization_coordsys_id: 28992,
            definition: "PROJCS[\"Amersfoort / RD New\",GEOGCS[\"Amersfoort\",DATUM[\"Amersfoort\",SPHEROID[\"Bessel 1841\",6377397.155,299.1528128]],PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433]],PROJECTION[\"Oblique_Stereographic\"],PARAMETER[\"latitude_of_origin\",52.1561605555556],PARAMETER[\"central_meridian\",5.38763888888889],PARAMETER[\"scale_factor\",0.9999079],PARAMETER[\"false_easting\",155000],PARAMETER[\"false_northing\",463000],UNIT[\"metre\",1],AUTHORITY[\"EPSG\",\"28992\"]]".into(),
            description: Some("Dutch national grid".into()),
        }
    }

    /// An SRS row for an id the source container does not define.
    fn undefined(srs_id: i32) -> Self {
        SpatialRefSys {
            srs_name: format!("Undefined SRS {srs_id}"),
            srs_id,
            organization: "NONE".into(),
            organization_coordsys_id: srs_id,
            definition: "undefined".into(),
            description: None,
        }
    }
}

/// An open GeoPackage file.
#[derive(Debug)]
pub struct GpkgContainer {
    conn: Connection,
    path: PathBuf,
}

impl GpkgContainer {
    /// Open an existing GeoPackage without write access.
    ///
    /// Fails with [`HydamoDupError::NotAGeoPackage`] when the file lacks the
    /// `gpkg_contents` registry.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, HydamoDupError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let container = GpkgContainer { conn, path };
        container.ensure_registry()?;
        Ok(container)
    }

    /// Create a new GeoPackage, installing the registry tables and the
    /// mandatory SRS rows.
    ///
    /// The file must not already exist; destinations are disposable, so
    /// callers remove stale output first.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, HydamoDupError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "application_id", GPKG_APPLICATION_ID)?;
        conn.pragma_update(None, "user_version", GPKG_USER_VERSION)?;
        conn.execute_batch(REGISTRY_DDL)?;
        Ok(GpkgContainer { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_registry(&self) -> Result<(), HydamoDupError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'gpkg_contents'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if found.is_none() {
            return Err(HydamoDupError::NotAGeoPackage(
                self.path.display().to_string(),
            ));
        }
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────────────

    /// Load a spatial feature layer fully into memory.
    ///
    /// The geometry column and SRS are resolved through
    /// `gpkg_geometry_columns`; geometry blobs are carried opaquely.
    pub fn read_feature_layer(&self, name: &str) -> Result<PointLayer, HydamoDupError> {
        let geom_col: Option<(String, String, i32)> = self
            .conn
            .query_row(
                "SELECT column_name, geometry_type_name, srs_id \
                 FROM gpkg_geometry_columns WHERE table_name = ?1",
                [name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (geometry_column, geometry_type, srs_id) =
            geom_col.ok_or_else(|| HydamoDupError::LayerNotFound(name.to_string()))?;

        let srs = self.read_srs(srs_id)?;
        let columns: Vec<String> = self
            .table_columns(name)?
            .into_iter()
            .filter(|c| *c != geometry_column)
            .collect();

        let mut select = vec![quote_ident(&geometry_column)];
        select.extend(columns.iter().map(|c| quote_ident(c)));
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            select.join(", "),
            quote_ident(name)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut features = Vec::new();
        while let Some(row) = rows.next()? {
            let geometry: Option<Vec<u8>> = row.get(0)?;
            let mut attributes = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                attributes.push(Value::from(row.get_ref(i + 1)?));
            }
            features.push(PointFeature {
                geometry,
                attributes,
            });
        }

        Ok(PointLayer {
            name: name.to_string(),
            geometry_column,
            geometry_type,
            srs,
            columns,
            features,
        })
    }

    /// Load a non-spatial attribute table fully into memory.
    pub fn read_attribute_table(&self, name: &str) -> Result<AttributeTable, HydamoDupError> {
        let columns = self.table_columns(name)?;
        let select: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            select.join(", "),
            quote_ident(name)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut sql_rows = stmt.query([])?;
        let mut rows = Vec::new();
        while let Some(row) = sql_rows.next()? {
            let mut cells = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                cells.push(Value::from(row.get_ref(i)?));
            }
            rows.push(cells);
        }
        Ok(AttributeTable {
            name: name.to_string(),
            columns,
            rows,
        })
    }

    /// All `gpkg_contents` rows, for inspection.
    pub fn contents(&self) -> Result<Vec<ContentsEntry>, HydamoDupError> {
        let mut stmt = self.conn.prepare(
            "SELECT table_name, data_type, identifier, description, last_change, \
                    min_x, min_y, max_x, max_y, srs_id \
             FROM gpkg_contents ORDER BY table_name",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let data_type: String = row.get(1)?;
            let min_x: Option<f64> = row.get(5)?;
            let min_y: Option<f64> = row.get(6)?;
            let max_x: Option<f64> = row.get(7)?;
            let max_y: Option<f64> = row.get(8)?;
            let bounds = match (min_x, min_y, max_x, max_y) {
                (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => Some(XyEnvelope {
                    min_x,
                    max_x,
                    min_y,
                    max_y,
                }),
                _ => None,
            };
            entries.push(ContentsEntry {
                table_name: row.get(0)?,
                data_type: DataType::from_str(&data_type),
                identifier: row.get(2)?,
                description: row.get(3)?,
                last_change: row.get(4)?,
                bounds,
                srs_id: row.get(9)?,
            });
        }
        Ok(entries)
    }

    /// Column names of a table, feature-id primary key excluded.
    fn table_columns(&self, table: &str) -> Result<Vec<String>, HydamoDupError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type, pk FROM pragma_table_info(?1)")?;
        let mut rows = stmt.query([table])?;
        let mut columns = Vec::new();
        let mut seen_any = false;
        while let Some(row) = rows.next()? {
            seen_any = true;
            let name: String = row.get(0)?;
            let decl: String = row.get(1)?;
            let pk: i64 = row.get(2)?;
            // An INTEGER primary key is the container's feature id (OGR's
            // `fid`); it is regenerated on write, not part of the data model.
            if pk > 0 && decl.eq_ignore_ascii_case("INTEGER") {
                continue;
            }
            columns.push(name);
        }
        if !seen_any {
            return Err(HydamoDupError::LayerNotFound(table.to_string()));
        }
        Ok(columns)
    }

    fn read_srs(&self, srs_id: i32) -> Result<SpatialRefSys, HydamoDupError> {
        let srs = self
            .conn
            .query_row(
                "SELECT srs_name, srs_id, organization, organization_coordsys_id, \
                        definition, description \
                 FROM gpkg_spatial_ref_sys WHERE srs_id = ?1",
                [srs_id],
                |row| {
                    Ok(SpatialRefSys {
                        srs_name: row.get(0)?,
                        srs_id: row.get(1)?,
                        organization: row.get(2)?,
                        organization_coordsys_id: row.get(3)?,
                        definition: row.get(4)?,
                        description: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(srs.unwrap_or_else(|| SpatialRefSys::undefined(srs_id)))
    }

    // ── Writes ───────────────────────────────────────────────────────────

    /// Write the corrected point layer and attribute table in one
    /// transaction, registering both in `gpkg_contents`.
    ///
    /// A failure anywhere rolls the destination back to its pre-write state;
    /// a committed destination always holds the complete layer pair.
    pub fn write_dataset(
        &mut self,
        layer: &PointLayer,
        table: &AttributeTable,
    ) -> Result<(), HydamoDupError> {
        let tx = self.conn.transaction()?;
        Self::write_feature_layer_tx(&tx, layer)?;
        Self::write_attribute_table_tx(&tx, table)?;
        tx.commit()?;
        Ok(())
    }

    /// Write a single feature layer (own transaction).
    pub fn write_feature_layer(&mut self, layer: &PointLayer) -> Result<(), HydamoDupError> {
        let tx = self.conn.transaction()?;
        Self::write_feature_layer_tx(&tx, layer)?;
        tx.commit()?;
        Ok(())
    }

    /// Write a single attribute table (own transaction).
    pub fn write_attribute_table(&mut self, table: &AttributeTable) -> Result<(), HydamoDupError> {
        let tx = self.conn.transaction()?;
        Self::write_attribute_table_tx(&tx, table)?;
        tx.commit()?;
        Ok(())
    }

    fn write_feature_layer_tx(tx: &Transaction, layer: &PointLayer) -> Result<(), HydamoDupError> {
        Self::upsert_srs(tx, &layer.srs)?;

        let mut col_defs = vec![
            "\"fid\" INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
            format!(
                "{} {}",
                quote_ident(&layer.geometry_column),
                layer.geometry_type
            ),
        ];
        for (i, column) in layer.columns.iter().enumerate() {
            let decl = infer_decl_type(layer.features.iter().map(|f| &f.attributes[i]));
            col_defs.push(format!("{} {decl}", quote_ident(column)));
        }
        tx.execute(
            &format!("DROP TABLE IF EXISTS {}", quote_ident(&layer.name)),
            [],
        )?;
        tx.execute(
            &format!(
                "CREATE TABLE {} ({})",
                quote_ident(&layer.name),
                col_defs.join(", ")
            ),
            [],
        )?;

        let mut insert_cols = vec![quote_ident(&layer.geometry_column)];
        insert_cols.extend(layer.columns.iter().map(|c| quote_ident(c)));
        let placeholders: Vec<String> = (1..=insert_cols.len()).map(|i| format!("?{i}")).collect();
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&layer.name),
            insert_cols.join(", "),
            placeholders.join(", ")
        ))?;

        let mut bounds: Option<XyEnvelope> = None;
        for feature in &layer.features {
            let mut sql_params: Vec<&dyn ToSql> = Vec::with_capacity(1 + feature.attributes.len());
            sql_params.push(&feature.geometry);
            for value in &feature.attributes {
                sql_params.push(value);
            }
            stmt.execute(sql_params.as_slice())?;

            if let Some(blob) = &feature.geometry {
                match geom::parse(blob).and_then(|g| g.xy_bounds()) {
                    Ok(Some(env)) => match &mut bounds {
                        Some(b) => b.extend(&env),
                        None => bounds = Some(env),
                    },
                    Ok(None) => {}
                    Err(e) => {
                        debug!(layer = %layer.name, "skipping envelope for undecodable geometry: {e}");
                    }
                }
            }
        }
        drop(stmt);

        tx.execute(
            "INSERT OR REPLACE INTO gpkg_geometry_columns \
             (table_name, column_name, geometry_type_name, srs_id, z, m) \
             VALUES (?1, ?2, ?3, ?4, 0, 0)",
            params![
                layer.name,
                layer.geometry_column,
                layer.geometry_type,
                layer.srs.srs_id
            ],
        )?;

        Self::register_contents(
            tx,
            &ContentsEntry {
                table_name: layer.name.clone(),
                data_type: DataType::Features,
                identifier: Some(layer.name.clone()),
                description: Some(String::new()),
                last_change: now_timestamp(),
                bounds,
                srs_id: Some(layer.srs.srs_id),
            },
        )
    }

    fn write_attribute_table_tx(
        tx: &Transaction,
        table: &AttributeTable,
    ) -> Result<(), HydamoDupError> {
        // A plain relational table: only the data columns, no feature id.
        let col_defs: Vec<String> = table
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let decl = infer_decl_type(table.rows.iter().map(|r| &r[i]));
                format!("{} {decl}", quote_ident(column))
            })
            .collect();
        tx.execute(
            &format!("DROP TABLE IF EXISTS {}", quote_ident(&table.name)),
            [],
        )?;
        tx.execute(
            &format!(
                "CREATE TABLE {} ({})",
                quote_ident(&table.name),
                col_defs.join(", ")
            ),
            [],
        )?;

        let quoted: Vec<String> = table.columns.iter().map(|c| quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=quoted.len()).map(|i| format!("?{i}")).collect();
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&table.name),
            quoted.join(", "),
            placeholders.join(", ")
        ))?;
        for row in &table.rows {
            let sql_params: Vec<&dyn ToSql> = row.iter().map(|v| v as &dyn ToSql).collect();
            stmt.execute(sql_params.as_slice())?;
        }
        drop(stmt);

        Self::register_contents(
            tx,
            &ContentsEntry {
                table_name: table.name.clone(),
                data_type: DataType::Attributes,
                identifier: Some(table.name.clone()),
                description: Some(String::new()),
                last_change: now_timestamp(),
                bounds: None,
                srs_id: None,
            },
        )
    }

    fn upsert_srs(tx: &Transaction, srs: &SpatialRefSys) -> Result<(), HydamoDupError> {
        tx.execute(
            "INSERT OR REPLACE INTO gpkg_spatial_ref_sys \
             (srs_name, srs_id, organization, organization_coordsys_id, definition, description) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                srs.srs_name,
                srs.srs_id,
                srs.organization,
                srs.organization_coordsys_id,
                srs.definition,
                srs.description
            ],
        )?;
        Ok(())
    }

    fn register_contents(tx: &Transaction, entry: &ContentsEntry) -> Result<(), HydamoDupError> {
        tx.execute(
            "INSERT OR REPLACE INTO gpkg_contents \
             (table_name, data_type, identifier, description, last_change, \
              min_x, min_y, max_x, max_y, srs_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.table_name,
                entry.data_type.as_str(),
                entry.identifier,
                entry.description,
                entry.last_change,
                entry.bounds.map(|b| b.min_x),
                entry.bounds.map(|b| b.min_y),
                entry.bounds.map(|b| b.max_x),
                entry.bounds.map(|b| b.max_y),
                entry.srs_id
            ],
        )?;
        Ok(())
    }
}

/// ISO 8601 UTC timestamp in the format GeoPackage uses for `last_change`.
fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
