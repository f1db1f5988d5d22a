//! Weight initialization and the weight tensors produced by it.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::shape::Shape;

/// Divisor that rescales the standard deviation of a normal truncated at 2σ
/// so the truncated distribution keeps the requested variance.
const TRUNCATED_NORMAL_STDDEV_SCALE: f64 = 0.879_625_66;

/// How the values of a weight tensor are drawn.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Initializer {
    Zeros,
    Ones,
    Constant { value: f32 },
    /// Uniform over `[min, max)`.
    Uniform { min: f32, max: f32 },
    Normal { mean: f32, std: f32 },
    /// Uniform over `[-l, l)` with `l = sqrt(6 / (fan_in + fan_out))`.
    #[default]
    GlorotUniform,
    /// Normal truncated at two standard deviations, scaled by `sqrt(2 / (fan_in + fan_out))`.
    GlorotNormal,
}

impl Initializer {
    /// Draws `shape.num_elements()` values in row-major order.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        shape: &Shape,
        rng: &mut R,
    ) -> Result<Vec<f32>, ModelError> {
        let n = shape.num_elements();
        let values = match *self {
            Self::Zeros => vec![0.0; n],
            Self::Ones => vec![1.0; n],
            Self::Constant { value } => {
                if !value.is_finite() {
                    return Err(ModelError::InvalidInitializer(format!(
                        "constant {value} is not finite"
                    )));
                }
                vec![value; n]
            }
            Self::Uniform { min, max } => {
                if !min.is_finite() || !max.is_finite() || !(max - min).is_finite() {
                    return Err(ModelError::InvalidInitializer(format!(
                        "uniform range [{min}, {max}) is not finite"
                    )));
                }
                if min >= max {
                    return Err(ModelError::InvalidInitializer(format!(
                        "uniform range [{min}, {max}) is empty"
                    )));
                }
                (0..n).map(|_| rng.gen_range(min..max)).collect()
            }
            Self::Normal { mean, std } => {
                if !mean.is_finite() || !std.is_finite() {
                    return Err(ModelError::InvalidInitializer(format!(
                        "normal({mean}, {std}) is not finite"
                    )));
                }
                let normal = Normal::new(mean, std)
                    .map_err(|err| ModelError::InvalidInitializer(err.to_string()))?;
                (0..n).map(|_| normal.sample(rng)).collect()
            }
            Self::GlorotUniform => {
                let (fan_in, fan_out) = compute_fans(shape);
                let limit = (6.0 / (fan_in as f64 + fan_out as f64)).sqrt() as f32;
                (0..n).map(|_| rng.gen_range(-limit..limit)).collect()
            }
            Self::GlorotNormal => {
                let (fan_in, fan_out) = compute_fans(shape);
                let std = (2.0 / (fan_in as f64 + fan_out as f64)).sqrt() / TRUNCATED_NORMAL_STDDEV_SCALE;
                let normal = Normal::new(0.0, std)
                    .map_err(|err| ModelError::InvalidInitializer(err.to_string()))?;
                (0..n)
                    .map(|_| loop {
                        let v: f64 = normal.sample(rng);
                        if v.abs() <= 2.0 * std {
                            break v as f32;
                        }
                    })
                    .collect()
            }
        };
        Ok(values)
    }
}

/// `(fan_in, fan_out)` of a weight shape; convolution kernels count their receptive field.
pub fn compute_fans(shape: &Shape) -> (usize, usize) {
    match shape.dims() {
        [] => (1, 1),
        [n] => (*n, *n),
        [rows, cols] => (*rows, *cols),
        dims => {
            let rank = dims.len();
            let receptive: usize = dims[..rank - 2].iter().product();
            (receptive * dims[rank - 2], receptive * dims[rank - 1])
        }
    }
}

/// One named parameter tensor owned by a layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightTensor {
    pub name: &'static str,
    pub shape: Shape,
    pub trainable: bool,
    pub values: Vec<f32>,
}

impl WeightTensor {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values as one sequence, last axis varying fastest.
    pub fn flatten(&self) -> &[f32] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn fans_for_dense_and_conv_kernels() {
        assert_eq!(compute_fans(&Shape::from([64, 1024])), (64, 1024));
        assert_eq!(compute_fans(&Shape::from([5, 5, 3, 11])), (75, 275));
        assert_eq!(compute_fans(&Shape::from([11])), (11, 11));
    }

    #[test]
    fn glorot_uniform_stays_within_limit() {
        let mut rng = StdRng::seed_from_u64(7);
        let shape = Shape::from([5, 5, 3, 11]);
        let values = Initializer::GlorotUniform.sample(&shape, &mut rng).unwrap();
        let limit = (6.0f32 / 350.0).sqrt();
        assert_eq!(values.len(), 825);
        assert!(values.iter().all(|v| v.abs() <= limit));
        assert!(values.iter().any(|v| *v != 0.0));
    }

    #[test]
    fn glorot_normal_is_truncated() {
        let mut rng = StdRng::seed_from_u64(3);
        let shape = Shape::from([32, 32]);
        let values = Initializer::GlorotNormal.sample(&shape, &mut rng).unwrap();
        let bound = 2.0 * (2.0f64 / 64.0).sqrt() / TRUNCATED_NORMAL_STDDEV_SCALE;
        assert!(values.iter().all(|v| (*v as f64).abs() <= bound + 1e-6));
    }

    #[test]
    fn normal_init_has_requested_moments() {
        let mut rng = StdRng::seed_from_u64(0);
        let values = Initializer::Normal { mean: 0.0, std: 1.0 }
            .sample(&Shape::from([4000]), &mut rng)
            .unwrap();
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
        assert!(mean.abs() < 0.1, "mean {mean}");
        assert!((var - 1.0).abs() < 0.1, "variance {var}");
    }

    #[test]
    fn constant_initializers_fill_every_element() {
        let mut rng = StdRng::seed_from_u64(0);
        let shape = Shape::from([2, 3]);
        assert_eq!(Initializer::Zeros.sample(&shape, &mut rng).unwrap(), vec![0.0; 6]);
        assert_eq!(Initializer::Ones.sample(&shape, &mut rng).unwrap(), vec![1.0; 6]);
        assert_eq!(
            Initializer::Constant { value: 0.5 }.sample(&shape, &mut rng).unwrap(),
            vec![0.5; 6]
        );
    }

    #[test]
    fn rejects_degenerate_ranges() {
        let mut rng = StdRng::seed_from_u64(0);
        let shape = Shape::from([3]);
        assert!(matches!(
            Initializer::Uniform { min: 0.2, max: -0.2 }.sample(&shape, &mut rng),
            Err(ModelError::InvalidInitializer(_))
        ));
        assert!(matches!(
            Initializer::Normal { mean: 0.0, std: -1.0 }.sample(&shape, &mut rng),
            Err(ModelError::InvalidInitializer(_))
        ));
    }

    #[test]
    fn rejects_non_finite_parameters() {
        let mut rng = StdRng::seed_from_u64(0);
        let shape = Shape::from([3]);
        let overflowing: Initializer =
            serde_json::from_str(r#"{"kind":"uniform","min":-1e39,"max":1e39}"#).unwrap();
        let wide = Initializer::Uniform { min: -f32::MAX, max: f32::MAX };
        for init in [
            overflowing,
            wide,
            Initializer::Uniform { min: 0.0, max: f32::INFINITY },
            Initializer::Uniform { min: f32::NAN, max: 1.0 },
            Initializer::Constant { value: f32::NAN },
            Initializer::Normal { mean: f32::INFINITY, std: 1.0 },
            Initializer::Normal { mean: 0.0, std: f32::INFINITY },
        ] {
            assert!(
                matches!(init.sample(&shape, &mut rng), Err(ModelError::InvalidInitializer(_))),
                "{init:?} should be rejected"
            );
        }
    }

    #[test]
    fn deserializes_tagged_initializers() {
        let init: Initializer = serde_json::from_str(r#"{"kind":"normal","mean":0.0,"std":0.1}"#).unwrap();
        assert_eq!(init, Initializer::Normal { mean: 0.0, std: 0.1 });
        let init: Initializer = serde_json::from_str(r#"{"kind":"glorot_uniform"}"#).unwrap();
        assert_eq!(init, Initializer::GlorotUniform);
    }
}
