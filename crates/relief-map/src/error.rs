use crate::core::GeodesyError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    /// An invalid zoom level or mesh resolution.
    #[error(transparent)]
    Geodesy(#[from] GeodesyError),
    #[error("expected {expected} vertices, got {actual}")]
    VertexCountMismatch { expected: usize, actual: usize },
    #[error("tile {0} has not been assigned a coordinate")]
    UnassignedTile(String),
    #[error("elevation fetch failed: {0}")]
    ElevationFetchFailed(String),
    #[error("texture fetch failed: {0}")]
    TextureFetchFailed(String),
    #[error("geocoding failed: {0}")]
    GeocodingFailed(String),
    #[error("failed to decode network message: {0}")]
    NetworkMessageDecodeFailure(postcard::Error),
    #[error("failed to encode network message: {0}")]
    NetworkMessageEncodeFailure(postcard::Error),
}
