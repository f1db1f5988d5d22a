//! Layer configurations: output-shape inference and the weights each kind owns.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::init::Initializer;
use crate::shape::{Padding, Shape, conv_output_length};

/// Two-dimensional window size (kernel, pool or stride). Deserializes from
/// either a single integer or a `[rows, cols]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WindowRepr", into = "WindowRepr")]
pub struct Window {
    pub rows: usize,
    pub cols: usize,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WindowRepr {
    Square(usize),
    Rect([usize; 2]),
}

impl From<WindowRepr> for Window {
    fn from(repr: WindowRepr) -> Self {
        match repr {
            WindowRepr::Square(n) => Window::square(n),
            WindowRepr::Rect([rows, cols]) => Window { rows, cols },
        }
    }
}

impl From<Window> for WindowRepr {
    fn from(window: Window) -> Self {
        if window.rows == window.cols {
            WindowRepr::Square(window.rows)
        } else {
            WindowRepr::Rect([window.rows, window.cols])
        }
    }
}

impl Window {
    pub fn square(n: usize) -> Self {
        Self { rows: n, cols: n }
    }

    fn one() -> Self {
        Self::square(1)
    }

    fn is_positive(&self) -> bool {
        self.rows > 0 && self.cols > 0
    }
}

fn default_true() -> bool {
    true
}

fn zeros() -> Initializer {
    Initializer::Zeros
}

fn ones() -> Initializer {
    Initializer::Ones
}

/// 2D convolution over `(height, width, channels)` inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conv2D {
    pub filters: usize,
    pub kernel_size: Window,
    #[serde(default = "Window::one")]
    pub strides: Window,
    #[serde(default)]
    pub padding: Padding,
    #[serde(default = "Window::one")]
    pub dilation_rate: Window,
    #[serde(default = "default_true")]
    pub use_bias: bool,
    #[serde(default)]
    pub kernel_initializer: Initializer,
    #[serde(default = "zeros")]
    pub bias_initializer: Initializer,
}

impl Conv2D {
    pub fn new(filters: usize, kernel_size: usize) -> Self {
        Self {
            filters,
            kernel_size: Window::square(kernel_size),
            strides: Window::one(),
            padding: Padding::Valid,
            dilation_rate: Window::one(),
            use_bias: true,
            kernel_initializer: Initializer::GlorotUniform,
            bias_initializer: Initializer::Zeros,
        }
    }

    pub fn padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn strides(mut self, stride: usize) -> Self {
        self.strides = Window::square(stride);
        self
    }

    pub fn use_bias(mut self, use_bias: bool) -> Self {
        self.use_bias = use_bias;
        self
    }
}

/// Max pooling over `(height, width, channels)` inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxPooling2D {
    #[serde(default = "MaxPooling2D::default_pool")]
    pub pool_size: Window,
    /// Defaults to `pool_size`.
    #[serde(default)]
    pub strides: Option<Window>,
    #[serde(default)]
    pub padding: Padding,
}

impl MaxPooling2D {
    fn default_pool() -> Window {
        Window::square(2)
    }
}

impl Default for MaxPooling2D {
    fn default() -> Self {
        Self {
            pool_size: Self::default_pool(),
            strides: None,
            padding: Padding::Valid,
        }
    }
}

/// Fully connected layer applied to the innermost axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    pub units: usize,
    #[serde(default = "default_true")]
    pub use_bias: bool,
    #[serde(default)]
    pub kernel_initializer: Initializer,
    #[serde(default = "zeros")]
    pub bias_initializer: Initializer,
}

impl Dense {
    pub fn new(units: usize) -> Self {
        Self {
            units,
            use_bias: true,
            kernel_initializer: Initializer::GlorotUniform,
            bias_initializer: Initializer::Zeros,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchNormalization {
    #[serde(default = "BatchNormalization::default_axis")]
    pub axis: i32,
    #[serde(default = "BatchNormalization::default_epsilon")]
    pub epsilon: f32,
    #[serde(default = "BatchNormalization::default_momentum")]
    pub momentum: f32,
    #[serde(default = "default_true")]
    pub center: bool,
    #[serde(default = "default_true")]
    pub scale: bool,
    #[serde(default = "ones")]
    pub gamma_initializer: Initializer,
    #[serde(default = "zeros")]
    pub beta_initializer: Initializer,
}

impl BatchNormalization {
    fn default_axis() -> i32 {
        -1
    }

    fn default_epsilon() -> f32 {
        1e-3
    }

    fn default_momentum() -> f32 {
        0.99
    }
}

impl Default for BatchNormalization {
    fn default() -> Self {
        Self {
            axis: Self::default_axis(),
            epsilon: Self::default_epsilon(),
            momentum: Self::default_momentum(),
            center: true,
            scale: true,
            gamma_initializer: Initializer::Ones,
            beta_initializer: Initializer::Zeros,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Softmax {
    #[serde(default = "Softmax::default_axis")]
    pub axis: i32,
}

impl Softmax {
    fn default_axis() -> i32 {
        -1
    }
}

impl Default for Softmax {
    fn default() -> Self {
        Self {
            axis: Self::default_axis(),
        }
    }
}

/// Every layer kind a sequential model can hold, tagged by class name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LayerKind {
    Conv2D(Conv2D),
    #[serde(alias = "MaxPool2D")]
    MaxPooling2D(MaxPooling2D),
    Dense(Dense),
    BatchNormalization(BatchNormalization),
    ReLU,
    Softmax(Softmax),
    Tanh,
    Sigmoid,
}

/// A parameter a layer declares before its values are drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSlot {
    pub name: &'static str,
    pub shape: Shape,
    pub initializer: Initializer,
    pub trainable: bool,
}

impl WeightSlot {
    fn trainable(name: &'static str, shape: Shape, initializer: &Initializer) -> Self {
        Self {
            name,
            shape,
            initializer: initializer.clone(),
            trainable: true,
        }
    }
}

/// Maps a possibly negative axis onto `0..rank`.
fn resolve_axis(axis: i32, rank: usize) -> Option<usize> {
    let rank = rank as i32;
    let resolved = if axis < 0 { rank + axis } else { axis };
    (0..rank).contains(&resolved).then_some(resolved as usize)
}

fn require_positive(layer: &str, parameter: &'static str, ok: bool) -> Result<(), ModelError> {
    if ok {
        Ok(())
    } else {
        Err(ModelError::ZeroParameter {
            layer: layer.to_string(),
            parameter,
        })
    }
}

fn require_image(layer: &str, input: &Shape) -> Result<(usize, usize, usize), ModelError> {
    match *input.dims() {
        [h, w, c] => Ok((h, w, c)),
        _ => Err(ModelError::RankMismatch {
            layer: layer.to_string(),
            expected: "a rank-3 (height, width, channels)",
            found: input.clone(),
        }),
    }
}

impl LayerKind {
    /// Class name as the summary prints it.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Conv2D(_) => "Conv2D",
            Self::MaxPooling2D(_) => "MaxPooling2D",
            Self::Dense(_) => "Dense",
            Self::BatchNormalization(_) => "BatchNormalization",
            Self::ReLU => "ReLU",
            Self::Softmax(_) => "Softmax",
            Self::Tanh => "Tanh",
            Self::Sigmoid => "Sigmoid",
        }
    }

    /// Prefix used for automatic layer names.
    pub fn base_name(&self) -> &'static str {
        match self {
            Self::Conv2D(_) => "conv2d",
            Self::MaxPooling2D(_) => "max_pooling2d",
            Self::Dense(_) => "dense",
            Self::BatchNormalization(_) => "batch_normalization",
            Self::ReLU => "re_lu",
            Self::Softmax(_) => "softmax",
            Self::Tanh => "tanh",
            Self::Sigmoid => "sigmoid",
        }
    }

    /// Infers the output shape for `input`, validating the configuration on the way.
    pub fn output_shape(&self, layer: &str, input: &Shape) -> Result<Shape, ModelError> {
        let output = match self {
            Self::Conv2D(conv) => {
                require_positive(layer, "filters", conv.filters > 0)?;
                require_positive(layer, "kernel_size", conv.kernel_size.is_positive())?;
                require_positive(layer, "strides", conv.strides.is_positive())?;
                require_positive(layer, "dilation_rate", conv.dilation_rate.is_positive())?;
                let (h, w, _) = require_image(layer, input)?;
                let out_h = conv_output_length(
                    h,
                    conv.kernel_size.rows,
                    conv.strides.rows,
                    conv.padding,
                    conv.dilation_rate.rows,
                );
                let out_w = conv_output_length(
                    w,
                    conv.kernel_size.cols,
                    conv.strides.cols,
                    conv.padding,
                    conv.dilation_rate.cols,
                );
                Shape::from([out_h, out_w, conv.filters])
            }
            Self::MaxPooling2D(pool) => {
                let strides = pool.strides.unwrap_or(pool.pool_size);
                require_positive(layer, "pool_size", pool.pool_size.is_positive())?;
                require_positive(layer, "strides", strides.is_positive())?;
                let (h, w, c) = require_image(layer, input)?;
                let out_h = conv_output_length(h, pool.pool_size.rows, strides.rows, pool.padding, 1);
                let out_w = conv_output_length(w, pool.pool_size.cols, strides.cols, pool.padding, 1);
                Shape::from([out_h, out_w, c])
            }
            Self::Dense(dense) => {
                require_positive(layer, "units", dense.units > 0)?;
                if input.rank() == 0 {
                    return Err(ModelError::RankMismatch {
                        layer: layer.to_string(),
                        expected: "at least a rank-1",
                        found: input.clone(),
                    });
                }
                input.with_last(dense.units)
            }
            Self::BatchNormalization(norm) => {
                resolve_axis(norm.axis, input.rank()).ok_or_else(|| ModelError::AxisOutOfRange {
                    layer: layer.to_string(),
                    axis: norm.axis,
                    rank: input.rank(),
                })?;
                input.clone()
            }
            Self::Softmax(softmax) => {
                resolve_axis(softmax.axis, input.rank()).ok_or_else(|| {
                    ModelError::AxisOutOfRange {
                        layer: layer.to_string(),
                        axis: softmax.axis,
                        rank: input.rank(),
                    }
                })?;
                input.clone()
            }
            Self::ReLU | Self::Tanh | Self::Sigmoid => input.clone(),
        };

        if output.dims().contains(&0) {
            return Err(ModelError::EmptyOutput {
                layer: layer.to_string(),
                input: input.clone(),
            });
        }
        Ok(output)
    }

    /// Weights in the order the layer reports them. `input` must already have
    /// passed [`LayerKind::output_shape`].
    pub fn weight_slots(&self, input: &Shape) -> Vec<WeightSlot> {
        match self {
            Self::Conv2D(conv) => {
                let channels = input.last().unwrap_or(1);
                let mut slots = vec![WeightSlot::trainable(
                    "kernel",
                    Shape::from([conv.kernel_size.rows, conv.kernel_size.cols, channels, conv.filters]),
                    &conv.kernel_initializer,
                )];
                if conv.use_bias {
                    slots.push(WeightSlot::trainable(
                        "bias",
                        Shape::from([conv.filters]),
                        &conv.bias_initializer,
                    ));
                }
                slots
            }
            Self::Dense(dense) => {
                let fan_in = input.last().unwrap_or(1);
                let mut slots = vec![WeightSlot::trainable(
                    "kernel",
                    Shape::from([fan_in, dense.units]),
                    &dense.kernel_initializer,
                )];
                if dense.use_bias {
                    slots.push(WeightSlot::trainable(
                        "bias",
                        Shape::from([dense.units]),
                        &dense.bias_initializer,
                    ));
                }
                slots
            }
            Self::BatchNormalization(norm) => {
                let axis = resolve_axis(norm.axis, input.rank()).unwrap_or(0);
                let channels = Shape::from([input.dims()[axis]]);
                let mut slots = Vec::with_capacity(4);
                if norm.scale {
                    slots.push(WeightSlot::trainable("gamma", channels.clone(), &norm.gamma_initializer));
                }
                if norm.center {
                    slots.push(WeightSlot::trainable("beta", channels.clone(), &norm.beta_initializer));
                }
                slots.push(WeightSlot {
                    name: "moving_mean",
                    shape: channels.clone(),
                    initializer: Initializer::Zeros,
                    trainable: false,
                });
                slots.push(WeightSlot {
                    name: "moving_variance",
                    shape: channels,
                    initializer: Initializer::Ones,
                    trainable: false,
                });
                slots
            }
            Self::MaxPooling2D(_) | Self::ReLU | Self::Softmax(_) | Self::Tanh | Self::Sigmoid => {
                Vec::new()
            }
        }
    }
}
