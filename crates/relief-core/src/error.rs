use thiserror::Error;

#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum GeodesyError {
    #[error("zoom level {0} is outside the supported scale table")]
    InvalidZoomLevel(u8),
    /// Tile meshes are square grids of at least 2x2 vertices.
    #[error("vertex count {0} is not the square of an edge length of at least 2")]
    InvalidVertexCount(usize),
}
