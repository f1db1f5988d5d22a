//! Tensor shapes without the batch dimension.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Padding mode shared by convolution and pooling layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    #[default]
    Valid,
    Same,
}

/// Dimensions of a tensor, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Number of elements a tensor of this shape holds, saturating at `usize::MAX`.
    pub fn num_elements(&self) -> usize {
        self.0.iter().fold(1usize, |acc, &d| acc.saturating_mul(d))
    }

    /// Number of elements, or `None` when it does not fit in a `usize`.
    pub fn checked_num_elements(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Copy of this shape with the innermost dimension replaced.
    pub fn with_last(&self, value: usize) -> Self {
        let mut dims = self.0.clone();
        if let Some(last) = dims.last_mut() {
            *last = value;
        }
        Self(dims)
    }

    /// Renders the shape with a leading unknown batch dimension, e.g. `(None, 28, 28, 1)`.
    pub fn batched(&self) -> String {
        let mut parts = vec!["None".to_string()];
        parts.extend(self.0.iter().map(ToString::to_string));
        format!("({})", parts.join(", "))
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self(dims.to_vec())
    }
}

/// Python tuple notation: `(5, 5, 3, 11)`, `(11,)`, `()`.
impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "({single},)"),
            dims => {
                let parts: Vec<String> = dims.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

/// Output length of a sliding window along one axis.
///
/// Returns 0 when a `valid` window does not fit inside the input.
pub fn conv_output_length(
    input: usize,
    window: usize,
    stride: usize,
    padding: Padding,
    dilation: usize,
) -> usize {
    let dilated = window
        .saturating_sub(1)
        .saturating_mul(dilation)
        .saturating_add(1);
    let length = match padding {
        Padding::Same => input,
        Padding::Valid => {
            if input < dilated {
                return 0;
            }
            input - dilated + 1
        }
    };
    length.div_ceil(stride)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_as_python_tuple() {
        assert_eq!(Shape::from([5, 5, 3, 11]).to_string(), "(5, 5, 3, 11)");
        assert_eq!(Shape::from([11]).to_string(), "(11,)");
        assert_eq!(Shape::default().to_string(), "()");
        assert_eq!(Shape::from([28, 28, 1]).batched(), "(None, 28, 28, 1)");
    }

    #[test]
    fn same_padding_keeps_spatial_size() {
        assert_eq!(conv_output_length(29, 5, 1, Padding::Same, 1), 29);
        assert_eq!(conv_output_length(67, 5, 1, Padding::Same, 1), 67);
        assert_eq!(conv_output_length(67, 5, 2, Padding::Same, 1), 34);
    }

    #[test]
    fn valid_padding_shrinks_and_strides() {
        assert_eq!(conv_output_length(28, 5, 1, Padding::Valid, 1), 24);
        assert_eq!(conv_output_length(28, 2, 2, Padding::Valid, 1), 14);
        assert_eq!(conv_output_length(7, 2, 2, Padding::Valid, 1), 3);
        assert_eq!(conv_output_length(10, 3, 1, Padding::Valid, 2), 6);
        assert_eq!(conv_output_length(3, 5, 1, Padding::Valid, 1), 0);
    }

    #[test]
    fn replaces_innermost_dimension() {
        let shape = Shape::from([7, 7, 64]);
        assert_eq!(shape.with_last(1024), Shape::from([7, 7, 1024]));
        assert_eq!(shape.num_elements(), 7 * 7 * 64);
    }

    #[test]
    fn element_count_overflow_is_detected() {
        let shape = Shape::from([usize::MAX / 2, 3, 2]);
        assert_eq!(shape.checked_num_elements(), None);
        assert_eq!(shape.num_elements(), usize::MAX);
        assert_eq!(Shape::from([5, 5, 3, 11]).checked_num_elements(), Some(825));
        assert_eq!(conv_output_length(9, usize::MAX, 1, Padding::Valid, 2), 0);
    }
}
