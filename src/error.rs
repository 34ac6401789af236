//! Error types for hydamo-duplicates.
//!
//! All failures are represented by [`HydamoDupError`] and propagated via
//! `Result<T, HydamoDupError>` throughout the crate.
//!
//! # Error Classification
//!
//! Errors fall into two categories with different guarantees:
//! - **Schema** — a required layer or column is missing from an input, or the
//!   source file is not a GeoPackage. Raised before anything is written to
//!   the destination. Never retried.
//! - **Container** — SQLite and filesystem failures while reading the source
//!   or writing the destination, and malformed geometry blobs. Propagated
//!   as-is from the underlying layer. Never retried.
//!
//! Dangling foreign-key references are deliberately NOT an error: a table row
//! whose reference matches no point `globalid` is skipped and counted in the
//! run report.

/// Primary error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum HydamoDupError {
    // ── Schema errors — raised before any destination write ─────────────
    /// A named layer is not present in the source container.
    #[error("layer not found in source GeoPackage: {0}")]
    LayerNotFound(String),

    /// A required column is missing from an input layer.
    #[error("layer '{layer}' must contain a '{column}' column")]
    MissingColumn { layer: String, column: String },

    /// The source file is not a GeoPackage (no `gpkg_contents` registry).
    #[error("not a GeoPackage: {0}")]
    NotAGeoPackage(String),

    // ── Container errors — propagated from the storage layer ─────────────
    /// A GeoPackage geometry blob could not be encoded or parsed.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// An underlying SQLite error while reading or writing a container.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A filesystem error (e.g., removing a stale destination file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HydamoDupError {
    /// Whether this error comes from input validation rather than I/O.
    ///
    /// Schema errors are detected before the destination is touched, so a
    /// caller seeing one knows no output file was created or modified.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            HydamoDupError::LayerNotFound(_)
                | HydamoDupError::MissingColumn { .. }
                | HydamoDupError::NotAGeoPackage(_)
        )
    }
}
