//! GeoPackage geometry BLOB codec.
//!
//! A GeoPackage geometry is a small binary header (magic, flags, SRS id,
//! optional envelope) followed by an OGC WKB geometry. The duplicate
//! resolver never rewrites geometry — duplicated features carry the source
//! blob byte-for-byte — so this module only needs to:
//!
//! - build point blobs when constructing layers (WKB via the `wkb` writer),
//! - parse headers to find the WKB payload and XY bounds for the
//!   `gpkg_contents` envelope of a written layer.
//!
//! Header layout per the OGC GeoPackage spec, table "GeoPackage Binary
//! Header": 2 magic bytes `GP`, 1 version byte, 1 flags byte, 4-byte SRS id,
//! then 0/32/48/64 envelope bytes depending on the flags.

use geo_traits::{CoordTrait, GeometryTrait, GeometryType, PointTrait};
use wkb::writer::{WriteOptions, write_geometry};

use crate::error::HydamoDupError;

const MAGIC: [u8; 2] = *b"GP";

/// Flags byte for blobs this crate writes: little-endian header, no envelope.
const FLAGS_LE_NO_ENVELOPE: u8 = 0b0000_0001;

/// A parsed GeoPackage geometry blob, borrowing the WKB payload.
#[derive(Debug, Clone, PartialEq)]
pub struct GpkgGeometry<'a> {
    pub srs_id: i32,
    /// XY envelope from the header, when the writer included one.
    pub envelope: Option<XyEnvelope>,
    /// Empty-geometry flag from the header.
    pub empty: bool,
    /// The WKB payload following the header.
    pub wkb: &'a [u8],
}

/// Minimum bounding rectangle in layer coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XyEnvelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl XyEnvelope {
    /// Grow to include another envelope.
    pub fn extend(&mut self, other: &XyEnvelope) {
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
    }
}

/// Encode an XY point as a GeoPackage geometry blob.
pub fn encode_point(x: f64, y: f64, srs_id: i32) -> Result<Vec<u8>, HydamoDupError> {
    let point = geo_types::Point::new(x, y);
    let mut wkb_buf: Vec<u8> = Vec::with_capacity(21);
    write_geometry(&mut wkb_buf, &point, &WriteOptions::default())
        .map_err(|e| HydamoDupError::Geometry(format!("WKB encode failed: {e}")))?;

    let mut blob = Vec::with_capacity(8 + wkb_buf.len());
    blob.extend_from_slice(&MAGIC);
    blob.push(0);
    blob.push(FLAGS_LE_NO_ENVELOPE);
    blob.extend_from_slice(&srs_id.to_le_bytes());
    blob.extend_from_slice(&wkb_buf);
    Ok(blob)
}

/// Parse a GeoPackage geometry blob header.
pub fn parse(blob: &[u8]) -> Result<GpkgGeometry<'_>, HydamoDupError> {
    if blob.len() < 8 {
        return Err(HydamoDupError::Geometry(format!(
            "geometry blob too short: {} bytes",
            blob.len()
        )));
    }
    if blob[0..2] != MAGIC {
        return Err(HydamoDupError::Geometry(
            "geometry blob does not start with 'GP'".into(),
        ));
    }
    let flags = blob[3];
    let little_endian = flags & 0b0000_0001 != 0;
    let envelope_indicator = (flags >> 1) & 0b0000_0111;
    let empty = flags & 0b0001_0000 != 0;

    let srs_bytes: [u8; 4] = blob[4..8].try_into().expect("slice length checked");
    let srs_id = if little_endian {
        i32::from_le_bytes(srs_bytes)
    } else {
        i32::from_be_bytes(srs_bytes)
    };

    // Envelope sizes per indicator: XY, XYZ, XYM, XYZM.
    let envelope_len = match envelope_indicator {
        0 => 0,
        1 => 32,
        2 | 3 => 48,
        4 => 64,
        other => {
            return Err(HydamoDupError::Geometry(format!(
                "invalid envelope indicator {other} in geometry header"
            )));
        }
    };
    let wkb_start = 8 + envelope_len;
    if blob.len() < wkb_start {
        return Err(HydamoDupError::Geometry(format!(
            "geometry blob truncated: {} bytes, header needs {wkb_start}",
            blob.len()
        )));
    }

    let envelope = if envelope_len >= 32 {
        let read_f64 = |offset: usize| -> f64 {
            let bytes: [u8; 8] = blob[offset..offset + 8]
                .try_into()
                .expect("slice length checked");
            if little_endian {
                f64::from_le_bytes(bytes)
            } else {
                f64::from_be_bytes(bytes)
            }
        };
        Some(XyEnvelope {
            min_x: read_f64(8),
            max_x: read_f64(16),
            min_y: read_f64(24),
            max_y: read_f64(32),
        })
    } else {
        None
    };

    Ok(GpkgGeometry {
        srs_id,
        envelope,
        empty,
        wkb: &blob[wkb_start..],
    })
}

impl GpkgGeometry<'_> {
    /// XY bounds of this geometry: the header envelope when present,
    /// otherwise the coordinate of a WKB point. `None` for empty geometries
    /// and non-point geometries without an envelope.
    pub fn xy_bounds(&self) -> Result<Option<XyEnvelope>, HydamoDupError> {
        if self.empty {
            return Ok(None);
        }
        if let Some(env) = self.envelope {
            return Ok(Some(env));
        }
        let geom = wkb::reader::read_wkb(self.wkb)
            .map_err(|e| HydamoDupError::Geometry(format!("WKB parse failed: {e}")))?;
        match geom.as_type() {
            GeometryType::Point(p) => Ok(p.coord().map(|c| XyEnvelope {
                min_x: c.x(),
                max_x: c.x(),
                min_y: c.y(),
                max_y: c.y(),
            })),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_blob_roundtrip() {
        let blob = encode_point(5.387, 52.155, 28992).unwrap();
        let geom = parse(&blob).unwrap();
        assert_eq!(geom.srs_id, 28992);
        assert!(!geom.empty);
        assert!(geom.envelope.is_none());

        let bounds = geom.xy_bounds().unwrap().unwrap();
        assert_eq!(bounds.min_x, 5.387);
        assert_eq!(bounds.max_x, 5.387);
        assert_eq!(bounds.min_y, 52.155);
        assert_eq!(bounds.max_y, 52.155);
    }

    #[test]
    fn test_wkb_payload_is_little_endian_point() {
        let blob = encode_point(1.0, 2.0, 4326).unwrap();
        let geom = parse(&blob).unwrap();
        // WKB: 1 byte order marker + u32 geometry type (1 = Point).
        assert_eq!(geom.wkb.len(), 21);
        assert_eq!(geom.wkb[0], 1, "little-endian byte order marker");
        assert_eq!(u32::from_le_bytes(geom.wkb[1..5].try_into().unwrap()), 1);
    }

    #[test]
    fn test_parse_big_endian_header() {
        let mut blob = vec![0x47, 0x50, 0, 0b0000_0000];
        blob.extend_from_slice(&4326i32.to_be_bytes());
        blob.extend_from_slice(&[1, 0, 0, 0, 0]); // placeholder payload
        let geom = parse(&blob).unwrap();
        assert_eq!(geom.srs_id, 4326);
    }

    #[test]
    fn test_parse_rejects_short_blob() {
        let err = parse(&[0x47, 0x50, 0]).unwrap_err();
        assert!(matches!(err, HydamoDupError::Geometry(_)));
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let blob = [0u8; 16];
        let err = parse(&blob).unwrap_err();
        assert!(err.to_string().contains("GP"));
    }

    #[test]
    fn test_parse_skips_xy_envelope() {
        let mut blob = vec![0x47, 0x50, 0, 0b0000_0011]; // LE + XY envelope
        blob.extend_from_slice(&28992i32.to_le_bytes());
        for v in [1.0f64, 2.0, 3.0, 4.0] {
            blob.extend_from_slice(&v.to_le_bytes());
        }
        blob.extend_from_slice(&[0xAA, 0xBB]);
        let geom = parse(&blob).unwrap();
        let env = geom.envelope.unwrap();
        assert_eq!(env.min_x, 1.0);
        assert_eq!(env.max_x, 2.0);
        assert_eq!(env.min_y, 3.0);
        assert_eq!(env.max_y, 4.0);
        assert_eq!(geom.wkb, &[0xAA, 0xBB]);
    }
}
