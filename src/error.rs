use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReprojError {
    #[error("Projection error: {0}")]
    Projection(#[from] ProjError),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Invalid affine transform: {0}")]
    Affine(String),

    #[error("Source image failed to load: {0}")]
    DependencyFailed(String),

    #[error("Load error: {0}")]
    Load(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjError {
    #[error("Unknown projection: {0}")]
    UnknownProjection(String),

    #[error("No transform from {from} to {to}")]
    NoTransform { from: String, to: String },

    #[error("Transform failed: {0}")]
    TransformFailed(String),

    #[error("Invalid projection definition: {0}")]
    InvalidDefinition(String),
}
