//! Binary tile content containers.
//!
//! A Batched 3D Model (`b3dm`) tile is a 28-byte header, a feature table, a
//! batch table and an embedded binary glTF:
//!
//! ```text
//! magic "b3dm" | version | byteLength
//! featureTableJSONByteLength | featureTableBinaryByteLength
//! batchTableJSONByteLength   | batchTableBinaryByteLength
//! feature table JSON | feature table binary | batch table JSON | batch table binary | GLB
//! ```
//!
//! All integers are little-endian `u32`. Only the parts needed to place the
//! geometry are read: `BATCH_LENGTH` and `RTC_CENTER` from the feature table.
//! The batch table holds per-feature metadata and is skipped.

use glam::DVec3;
use serde::Deserialize;

use crate::error::{Error, Result};

const B3DM_MAGIC: &[u8; 4] = b"b3dm";
const B3DM_HEADER_LEN: usize = 28;
const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_HEADER_LEN: usize = 12;
const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;

/// glTF extension for Draco-compressed meshes.
pub const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// A parsed `b3dm` tile, borrowing the embedded GLB.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedModel<'a> {
    /// Number of distinguishable features in the model.
    pub batch_length: u32,
    /// Offset the GLB's vertex positions are relative to, in the tile's
    /// Z-up frame. Zero when the tile has no `RTC_CENTER`.
    pub rtc_center: DVec3,
    /// The embedded binary glTF.
    pub glb: &'a [u8],
}

#[derive(Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct FeatureTable {
    #[serde(default)]
    batch_length: u32,
    rtc_center: Option<FeatureValue>,
}

/// A feature table property, stored inline or in the binary body.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureValue {
    Inline([f64; 3]),
    Binary {
        #[serde(rename = "byteOffset")]
        byte_offset: usize,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GlbJson {
    #[serde(default)]
    extensions_required: Vec<String>,
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    let mut word = [0; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(word)
}

fn invalid(detail: impl Into<String>) -> Error {
    Error::InvalidData {
        context: "b3dm",
        detail: detail.into(),
    }
}

/// JSON sections are padded with spaces (some writers use NULs).
fn trim_padding(json: &[u8]) -> &[u8] {
    let end = json
        .iter()
        .rposition(|b| !matches!(b, b' ' | 0))
        .map_or(0, |i| i + 1);
    &json[..end]
}

impl<'a> BatchedModel<'a> {
    /// Parse a `b3dm` payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the magic or version is wrong, the header lengths
    /// run past the buffer, the feature table is not valid JSON, or the
    /// payload does not end in a GLB.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < B3DM_HEADER_LEN {
            return Err(Error::BufferTooSmall {
                context: "b3dm header",
                expected: B3DM_HEADER_LEN,
                actual: bytes.len(),
            });
        }
        if &bytes[..4] != B3DM_MAGIC {
            return Err(invalid("missing b3dm magic"));
        }
        let version = read_u32(bytes, 4);
        if version != 1 {
            return Err(invalid(format!("unsupported version {version}")));
        }

        // Lengths are u32, so the sum cannot overflow a 64-bit usize.
        let byte_length = read_u32(bytes, 8) as usize;
        let [feature_json, feature_binary, batch_json, batch_binary] =
            [12, 16, 20, 24].map(|offset| read_u32(bytes, offset) as usize);
        if byte_length > bytes.len() {
            return Err(Error::BufferTooSmall {
                context: "b3dm",
                expected: byte_length,
                actual: bytes.len(),
            });
        }

        let feature_json_start = B3DM_HEADER_LEN;
        let feature_binary_start = feature_json_start + feature_json;
        let glb_start = feature_binary_start + feature_binary + batch_json + batch_binary;
        if glb_start > byte_length {
            return Err(Error::BufferTooSmall {
                context: "b3dm tables",
                expected: glb_start,
                actual: byte_length,
            });
        }

        let table = if feature_json == 0 {
            FeatureTable {
                batch_length: 0,
                rtc_center: None,
            }
        } else {
            let json = trim_padding(&bytes[feature_json_start..feature_binary_start]);
            serde_json::from_slice(json).map_err(|e| Error::Json {
                context: "b3dm feature table",
                message: e.to_string(),
            })?
        };
        let feature_body = &bytes[feature_binary_start..feature_binary_start + feature_binary];

        let rtc_center = match table.rtc_center {
            None => DVec3::ZERO,
            Some(FeatureValue::Inline([x, y, z])) => DVec3::new(x, y, z),
            // Binary RTC_CENTER is three FLOAT32 components.
            Some(FeatureValue::Binary { byte_offset }) => {
                if byte_offset + 12 > feature_body.len() {
                    return Err(Error::BufferTooSmall {
                        context: "b3dm RTC_CENTER",
                        expected: byte_offset + 12,
                        actual: feature_body.len(),
                    });
                }
                DVec3::new(
                    f64::from(read_f32(feature_body, byte_offset)),
                    f64::from(read_f32(feature_body, byte_offset + 4)),
                    f64::from(read_f32(feature_body, byte_offset + 8)),
                )
            }
        };

        let glb = &bytes[glb_start..byte_length];
        if glb.len() < GLB_HEADER_LEN || &glb[..4] != GLB_MAGIC {
            return Err(invalid("payload is not a binary glTF"));
        }

        Ok(Self {
            batch_length: table.batch_length,
            rtc_center,
            glb,
        })
    }
}

/// The `extensionsRequired` list of a binary glTF.
///
/// # Errors
///
/// Returns an error if `glb` is not a GLB or its JSON chunk is malformed.
pub fn glb_required_extensions(glb: &[u8]) -> Result<Vec<String>> {
    let chunk_start = GLB_HEADER_LEN + 8;
    if glb.len() < chunk_start {
        return Err(Error::BufferTooSmall {
            context: "glb header",
            expected: chunk_start,
            actual: glb.len(),
        });
    }
    if &glb[..4] != GLB_MAGIC {
        return Err(Error::InvalidData {
            context: "glb",
            detail: "missing glTF magic".to_owned(),
        });
    }
    let chunk_length = read_u32(glb, GLB_HEADER_LEN) as usize;
    if read_u32(glb, GLB_HEADER_LEN + 4) != GLB_CHUNK_JSON {
        return Err(Error::InvalidData {
            context: "glb",
            detail: "first chunk is not JSON".to_owned(),
        });
    }
    let json = glb
        .get(chunk_start..chunk_start + chunk_length)
        .ok_or(Error::BufferTooSmall {
            context: "glb json chunk",
            expected: chunk_start + chunk_length,
            actual: glb.len(),
        })?;
    let parsed: GlbJson = serde_json::from_slice(trim_padding(json)).map_err(|e| Error::Json {
        context: "glb json chunk",
        message: e.to_string(),
    })?;
    Ok(parsed.extensions_required)
}
