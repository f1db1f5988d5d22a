use thiserror::Error;

use crate::shape::Shape;

/// Validation failures raised while materializing a model from its descriptors.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("model has no layers")]
    EmptyModel,
    #[error("first layer `{layer}` needs an input_shape")]
    MissingInputShape { layer: String },
    #[error("layer `{layer}` expects {expected} input, got {found}")]
    RankMismatch {
        layer: String,
        expected: &'static str,
        found: Shape,
    },
    #[error("layer `{layer}`: {parameter} must be > 0")]
    ZeroParameter {
        layer: String,
        parameter: &'static str,
    },
    #[error("layer `{layer}` collapses input {input} to an empty output")]
    EmptyOutput { layer: String, input: Shape },
    #[error("layer `{layer}`: axis {axis} is out of range for rank {rank}")]
    AxisOutOfRange { layer: String, axis: i32, rank: usize },
    #[error("layer `{layer}`: {tensor} shape {shape} is too large to allocate")]
    TooLarge {
        layer: String,
        tensor: &'static str,
        shape: Shape,
    },
    #[error("layer `{layer}` declares input_shape {declared} but receives {inferred}")]
    ConflictingInputShape {
        layer: String,
        declared: Shape,
        inferred: Shape,
    },
    #[error("invalid initializer: {0}")]
    InvalidInitializer(String),
    #[error("no layer named `{0}`")]
    UnknownLayer(String),
}
