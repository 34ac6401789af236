//! Duplicate resolver — one point feature per table reference.
//!
//! HyDAMO attribute tables reference a point layer through a foreign-key
//! column (`pomp.gemaalid` → `gemaal.globalid`, `kunstwerkopening.stuwid` →
//! `stuw.globalid`). Several table rows may legitimately reference the same
//! point even though each reference stands for a distinct physical
//! structure. The resolver materializes that distinction: for every
//! reference beyond the first in a group, it clones the referenced point
//! feature under a freshly minted `globalid` and rewrites the table row to
//! point at the clone.
//!
//! The pass is a single synchronous run: load both layers, partition the
//! table rows by reference, mint and rewrite, write the corrected dataset
//! to the destination container in one transaction.
//!
//! ## Identifier minting
//!
//! Minted identifiers take the form `<original>_<n>` with `n` counted from 1
//! per original. Minting is collision-checked against every `globalid`
//! already present in the point layer and everything minted earlier in the
//! run, advancing the suffix past taken values, so re-running over data that
//! already contains suffixed identifiers cannot produce a clash.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::HydamoDupError;
use crate::gpkg::GpkgContainer;
use crate::value::Value;

/// Identifier column every HyDAMO layer carries.
pub const GLOBALID_COLUMN: &str = "globalid";

/// Parameters of one resolver run.
///
/// Defaults mirror the common HyDAMO pumping-station case: `pomp` rows
/// referencing `gemaal` points through `gemaalid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateJob {
    /// Source GeoPackage holding the original layers.
    pub src_gpkg_path: PathBuf,
    /// Destination GeoPackage. Treated as disposable output: deleted and
    /// recreated wholesale when it already exists.
    #[serde(default = "default_dst_path")]
    pub dst_gpkg_path: PathBuf,
    /// Name of the spatial point layer.
    #[serde(default = "default_pointlayer")]
    pub pointlayer: String,
    /// Name of the non-spatial table layer referencing the point layer.
    #[serde(default = "default_tablelayer")]
    pub tablelayer: String,
    /// Column in the table layer referencing `pointlayer.globalid`.
    #[serde(default = "default_layerid")]
    pub layerid: String,
}

fn default_dst_path() -> PathBuf {
    PathBuf::from("hydamo_duplicates.gpkg")
}

fn default_pointlayer() -> String {
    "gemaal".to_string()
}

fn default_tablelayer() -> String {
    "pomp".to_string()
}

fn default_layerid() -> String {
    "gemaalid".to_string()
}

impl DuplicateJob {
    /// A job for `src_gpkg_path` with the default layer names and output path.
    pub fn new(src_gpkg_path: impl Into<PathBuf>) -> Self {
        DuplicateJob {
            src_gpkg_path: src_gpkg_path.into(),
            dst_gpkg_path: default_dst_path(),
            pointlayer: default_pointlayer(),
            tablelayer: default_tablelayer(),
            layerid: default_layerid(),
        }
    }
}

/// Outcome of a resolver run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// The destination GeoPackage that was written.
    pub output_gpkg: PathBuf,
    /// Number of point features minted (0 when no group had duplicates).
    pub duplicates_created: usize,
    /// Multi-row reference groups whose foreign key matched no point
    /// `globalid`. Skipped without error, surfaced here.
    pub orphaned_groups: usize,
}

/// Collision-checked minting of `<original>_<n>` identifiers.
///
/// `mint` reserves and returns the first free suffix for a base id. With no
/// pre-existing suffixed ids this yields `base_1`, `base_2`, … in call
/// order — the shape downstream tooling expects.
#[derive(Debug, Default)]
pub struct IdMinter {
    taken: HashSet<String>,
}

impl IdMinter {
    /// A minter that treats `ids` as already taken.
    pub fn with_taken(ids: impl IntoIterator<Item = String>) -> Self {
        IdMinter {
            taken: ids.into_iter().collect(),
        }
    }

    /// Mint the next free identifier for `base`.
    pub fn mint(&mut self, base: &str) -> String {
        let mut suffix: u32 = 1;
        loop {
            let candidate = format!("{base}_{suffix}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// Run the resolver: read the source layers, materialize one point feature
/// per table reference, write the corrected dataset.
///
/// Schema validation (the point layer's `globalid` column, the table
/// layer's foreign-key column) happens before the destination is touched.
/// Dangling references are tolerated: a multi-row group whose key matches
/// no point feature produces no duplicates and no rewrite, and is counted
/// in the report.
pub fn materialize_duplicates(job: &DuplicateJob) -> Result<DuplicateReport, HydamoDupError> {
    let src = GpkgContainer::open_read_only(&job.src_gpkg_path)?;
    let mut points = src.read_feature_layer(&job.pointlayer)?;
    let mut table = src.read_attribute_table(&job.tablelayer)?;

    let globalid_col =
        points
            .column_index(GLOBALID_COLUMN)
            .ok_or_else(|| HydamoDupError::MissingColumn {
                layer: job.pointlayer.clone(),
                column: GLOBALID_COLUMN.to_string(),
            })?;
    let layerid_col =
        table
            .column_index(&job.layerid)
            .ok_or_else(|| HydamoDupError::MissingColumn {
                layer: job.tablelayer.clone(),
                column: job.layerid.clone(),
            })?;

    // First occurrence wins: each reference group maps to one point feature.
    let mut point_by_globalid: HashMap<String, usize> = HashMap::new();
    for (idx, feature) in points.features.iter().enumerate() {
        if let Some(gid) = feature.attributes[globalid_col].as_text() {
            point_by_globalid.entry(gid.to_string()).or_insert(idx);
        }
    }

    let mut minter = IdMinter::with_taken(point_by_globalid.keys().cloned());
    let groups = table.group_by_text_column(layerid_col);

    let mut minted = Vec::new();
    let mut orphaned_groups = 0usize;
    for (globalid, row_indices) in &groups {
        if row_indices.len() < 2 {
            continue;
        }
        let Some(&point_idx) = point_by_globalid.get(globalid) else {
            warn!(
                tablelayer = %job.tablelayer,
                rows = row_indices.len(),
                "reference group '{globalid}' matches no point feature, skipping"
            );
            orphaned_groups += 1;
            continue;
        };

        // The first row keeps the original reference; every later row gets
        // its own copy of the point feature.
        for &row_idx in &row_indices[1..] {
            let new_globalid = minter.mint(globalid);
            let mut feature = points.features[point_idx].clone();
            feature.attributes[globalid_col] = Value::Text(new_globalid.clone());
            minted.push(feature);
            table.rows[row_idx][layerid_col] = Value::Text(new_globalid.clone());
            debug!(
                original = %globalid,
                minted = %new_globalid,
                row = row_idx,
                "materialized duplicate point feature"
            );
        }
    }

    let duplicates_created = minted.len();
    points.features.extend(minted);

    if job.dst_gpkg_path.exists() {
        fs::remove_file(&job.dst_gpkg_path)?;
    }
    let mut dst = GpkgContainer::create(&job.dst_gpkg_path)?;
    dst.write_dataset(&points, &table)?;

    info!(
        src = %job.src_gpkg_path.display(),
        dst = %job.dst_gpkg_path.display(),
        duplicates_created,
        orphaned_groups,
        "duplicate resolution finished"
    );

    Ok(DuplicateReport {
        output_gpkg: job.dst_gpkg_path.clone(),
        duplicates_created,
        orphaned_groups,
    })
}
