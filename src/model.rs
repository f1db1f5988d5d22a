use std::collections::HashMap;

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::init::WeightTensor;
use crate::layers::LayerKind;
use crate::shape::Shape;

/// A layer descriptor as written by hand or read from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Required on the first layer. Later layers may repeat their inferred input shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_shape: Option<Shape>,
    #[serde(flatten)]
    pub kind: LayerKind,
}

impl LayerInfo {
    pub fn new(kind: LayerKind) -> Self {
        Self {
            name: None,
            input_shape: None,
            kind,
        }
    }

    pub fn with_input_shape(mut self, shape: impl Into<Shape>) -> Self {
        self.input_shape = Some(shape.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl From<LayerKind> for LayerInfo {
    fn from(kind: LayerKind) -> Self {
        Self::new(kind)
    }
}

/// An ordered stack of layer descriptors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub layers: Vec<LayerInfo>,
}

impl ModelInfo {
    pub fn sequential(layers: impl IntoIterator<Item = LayerInfo>) -> Self {
        Self {
            name: None,
            layers: layers.into_iter().collect(),
        }
    }
}

/// Hands out framework-style unique names: `dense`, `dense_1`, `dense_2`, ...
#[derive(Debug, Default)]
pub struct NameScope {
    counters: HashMap<String, usize>,
}

impl NameScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unique(&mut self, base: &str) -> String {
        let count = self.counters.entry(base.to_string()).or_insert(0);
        let name = if *count == 0 {
            base.to_string()
        } else {
            format!("{base}_{count}")
        };
        *count += 1;
        name
    }
}

/// A layer after shape inference and weight initialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltLayer {
    pub name: String,
    pub kind: LayerKind,
    pub input_shape: Shape,
    pub output_shape: Shape,
    pub weights: Vec<WeightTensor>,
}

impl BuiltLayer {
    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    pub fn get_weights(&self) -> &[WeightTensor] {
        &self.weights
    }

    pub fn param_count(&self) -> usize {
        self.weights.iter().map(WeightTensor::len).sum()
    }

    pub fn trainable_param_count(&self) -> usize {
        self.weights
            .iter()
            .filter(|w| w.trainable)
            .map(WeightTensor::len)
            .sum()
    }
}

/// Largest element count a `Vec<f32>` can hold.
const MAX_TENSOR_ELEMENTS: usize = isize::MAX as usize / std::mem::size_of::<f32>();

fn fits_in_memory(shape: &Shape) -> bool {
    shape
        .checked_num_elements()
        .is_some_and(|n| n <= MAX_TENSOR_ELEMENTS)
}

/// A materialized sequential model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    pub name: String,
    pub input_shape: Shape,
    pub layers: Vec<BuiltLayer>,
}

impl Model {
    /// Names every layer, chains shapes from the first layer's `input_shape`
    /// and draws initial weights from `rng`.
    pub fn build<R: Rng + ?Sized>(
        info: &ModelInfo,
        scope: &mut NameScope,
        rng: &mut R,
    ) -> Result<Self, ModelError> {
        let first = info.layers.first().ok_or(ModelError::EmptyModel)?;
        let name = info
            .name
            .clone()
            .unwrap_or_else(|| scope.unique("sequential"));

        let mut layer_names = Vec::with_capacity(info.layers.len());
        for layer in &info.layers {
            let layer_name = layer
                .name
                .clone()
                .unwrap_or_else(|| scope.unique(layer.kind.base_name()));
            layer_names.push(layer_name);
        }

        let input_shape = first
            .input_shape
            .clone()
            .ok_or_else(|| ModelError::MissingInputShape {
                layer: layer_names[0].clone(),
            })?;
        if input_shape.rank() == 0 || input_shape.dims().contains(&0) {
            return Err(ModelError::ZeroParameter {
                layer: layer_names[0].clone(),
                parameter: "input_shape",
            });
        }

        info!(
            "Building model `{name}` with {} layer(s) from input {}",
            info.layers.len(),
            input_shape.batched()
        );

        let mut layers = Vec::with_capacity(info.layers.len());
        let mut prev_shape = input_shape.clone();
        for (index, (layer, layer_name)) in info.layers.iter().zip(layer_names).enumerate() {
            if index > 0 {
                if let Some(declared) = layer.input_shape.as_ref().filter(|s| **s != prev_shape) {
                    return Err(ModelError::ConflictingInputShape {
                        layer: layer_name,
                        declared: declared.clone(),
                        inferred: prev_shape,
                    });
                }
            }
            let output_shape = layer.kind.output_shape(&layer_name, &prev_shape)?;
            if output_shape.checked_num_elements().is_none() {
                return Err(ModelError::TooLarge {
                    layer: layer_name,
                    tensor: "output",
                    shape: output_shape,
                });
            }
            let mut weights = Vec::new();
            for slot in layer.kind.weight_slots(&prev_shape) {
                if !fits_in_memory(&slot.shape) {
                    return Err(ModelError::TooLarge {
                        layer: layer_name,
                        tensor: slot.name,
                        shape: slot.shape,
                    });
                }
                let values = slot.initializer.sample(&slot.shape, rng)?;
                weights.push(WeightTensor {
                    name: slot.name,
                    shape: slot.shape,
                    trainable: slot.trainable,
                    values,
                });
            }
            debug!(
                "{layer_name} ({}): {} -> {}, {} weight tensor(s)",
                layer.kind.class_name(),
                prev_shape,
                output_shape,
                weights.len()
            );
            layers.push(BuiltLayer {
                name: layer_name,
                kind: layer.kind.clone(),
                input_shape: prev_shape,
                output_shape: output_shape.clone(),
                weights,
            });
            prev_shape = output_shape;
        }

        Ok(Self {
            name,
            input_shape,
            layers,
        })
    }

    pub fn layer(&self, name: &str) -> Result<&BuiltLayer, ModelError> {
        self.layers
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| ModelError::UnknownLayer(name.to_string()))
    }

    pub fn output_shape(&self) -> &Shape {
        self.layers
            .last()
            .map(|l| &l.output_shape)
            .unwrap_or(&self.input_shape)
    }

    pub fn param_count(&self) -> usize {
        self.layers.iter().map(BuiltLayer::param_count).sum()
    }

    pub fn trainable_param_count(&self) -> usize {
        self.layers.iter().map(BuiltLayer::trainable_param_count).sum()
    }
}
