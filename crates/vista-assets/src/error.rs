use std::path::PathBuf;

/// Errors that abort a scene import. A failed import leaves the model
/// untouched.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("scene file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to parse scene '{0}': {1}")]
    Parse(PathBuf, String),

    #[error("scene '{0}' is incomplete")]
    Incomplete(PathBuf),

    #[error("scene '{0}' has no root node")]
    NoRootNode(PathBuf),

    #[error("I/O error reading scene '{0}': {1}")]
    Io(PathBuf, #[source] std::io::Error),
}

/// Errors for a single texture request. These are logged by the loader and
/// never abort a flush.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("I/O error reading texture '{0}': {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to decode texture '{0}': {1}")]
    Decode(PathBuf, String),

    #[error("unsupported DDS texture '{0}': {1}")]
    UnsupportedDds(PathBuf, String),
}
