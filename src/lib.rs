//! hydamo-duplicates — materialize one point feature per table reference.
//!
//! HyDAMO (Hydrologische Data Afspraken Model) GeoPackages pair spatial
//! point layers with non-spatial attribute tables that reference them
//! through a foreign-key column: `pomp.gemaalid` points at
//! `gemaal.globalid`, `kunstwerkopening.stuwid` at `stuw.globalid`. Several
//! table rows referencing one point is valid data, but each reference stands
//! for a distinct physical structure, and downstream tooling that joins the
//! table onto the point layer needs a one-to-one mapping.
//!
//! This crate rewrites a source GeoPackage into that shape: for every
//! reference beyond the first in a group, the referenced point feature is
//! cloned under a freshly minted `globalid` (`<original>_<n>`,
//! collision-checked) and the table row is rewritten to reference the clone.
//! The corrected point layer and attribute table are written to a new
//! GeoPackage in a single transaction, with the attribute table registered
//! as an `attributes` entry in `gpkg_contents`.
//!
//! # References
//!
//! - **HyDAMO**: the Dutch water-authority data model for hydrological
//!   objects. <https://www.hydamo.nl>
//! - **OGC GeoPackage Encoding Standard**, v1.3.
//!   <https://www.geopackage.org/spec/>
//!
//! # Quick start
//!
//! ```no_run
//! use hydamo_duplicates::{DuplicateJob, materialize_duplicates};
//!
//! let mut job = DuplicateJob::new("HyDAMO.gpkg");
//! job.pointlayer = "stuw".to_string();
//! job.tablelayer = "kunstwerkopening".to_string();
//! job.layerid = "stuwid".to_string();
//!
//! let report = materialize_duplicates(&job)?;
//! println!("{} duplicates", report.duplicates_created);
//! # Ok::<(), hydamo_duplicates::HydamoDupError>(())
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod geom;
pub mod gpkg;
pub mod layer;
pub mod resolver;
pub mod value;

pub use error::HydamoDupError;
pub use gpkg::{ContentsEntry, DataType, GpkgContainer, SpatialRefSys};
pub use layer::{AttributeTable, PointFeature, PointLayer};
pub use resolver::{DuplicateJob, DuplicateReport, IdMinter, materialize_duplicates};
pub use value::Value;
