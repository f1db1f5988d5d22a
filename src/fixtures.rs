//! Reference fixtures for layer tests: model summaries and initial weights.
//!
//! Each fixture builds a small sequential model, prints its summary and, for the
//! single-layer fixtures, the flattened initial weights of the parameterized layer.

use std::io::Write;

use anyhow::{Context, Result};
use clap::ValueEnum;
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::config::FixtureSettings;
use crate::dump::{WeightDump, write_weights};
use crate::layers::{BatchNormalization, Conv2D, Dense, LayerKind, MaxPooling2D, Softmax};
use crate::model::{BuiltLayer, LayerInfo, Model, ModelInfo, NameScope};
use crate::shape::Padding;
use crate::summary::Summary;

/// Width, height and channels of the single-layer fixture input.
pub const SINGLE_LAYER_INPUT: (usize, usize, usize) = (67, 29, 3);
pub const MNIST_INPUT: [usize; 3] = [28, 28, 1];
pub const MNIST_CLASSES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Fixture {
    /// Batch normalization + ReLU on a 67x29x3 input, with weight dump.
    BatchNorm,
    /// 11-filter 5x5 convolution + ReLU on a 67x29x3 input, with weight dump.
    Conv,
    /// 10-layer MNIST classifier summary.
    Mnist,
}

impl Fixture {
    /// Run order when no fixture is requested explicitly.
    pub const ALL: [Fixture; 3] = [Fixture::BatchNorm, Fixture::Conv, Fixture::Mnist];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Summary tables and NumPy-style arrays.
    #[default]
    Text,
    /// One pretty-printed JSON document per fixture.
    Json,
}

/// conv(32) relu pool conv(64) relu pool dense(1024) relu dense(10) softmax
pub fn mnist_classifier() -> ModelInfo {
    ModelInfo::sequential([
        LayerInfo::new(LayerKind::Conv2D(Conv2D::new(32, 5).padding(Padding::Same)))
            .with_input_shape(MNIST_INPUT),
        LayerKind::ReLU.into(),
        LayerKind::MaxPooling2D(MaxPooling2D::default()).into(),
        LayerKind::Conv2D(Conv2D::new(64, 5).padding(Padding::Same)).into(),
        LayerKind::ReLU.into(),
        LayerKind::MaxPooling2D(MaxPooling2D::default()).into(),
        LayerKind::Dense(Dense::new(1024)).into(),
        LayerKind::ReLU.into(),
        LayerKind::Dense(Dense::new(MNIST_CLASSES)).into(),
        LayerKind::Softmax(Softmax::default()).into(),
    ])
}

/// `layer` on a `(height, width, channels)` input, followed by a ReLU.
pub fn single_layer_model(layer: LayerKind, (width, height, channels): (usize, usize, usize)) -> ModelInfo {
    ModelInfo::sequential([
        LayerInfo::new(layer).with_input_shape([height, width, channels]),
        LayerKind::ReLU.into(),
    ])
}

pub fn conv_fixture() -> ModelInfo {
    single_layer_model(
        LayerKind::Conv2D(Conv2D::new(11, 5).padding(Padding::Same)),
        SINGLE_LAYER_INPUT,
    )
}

pub fn batch_norm_fixture() -> ModelInfo {
    single_layer_model(
        LayerKind::BatchNormalization(BatchNormalization::default()),
        SINGLE_LAYER_INPUT,
    )
}

#[derive(Serialize)]
struct WeightSection<'a> {
    layer: &'a str,
    tensors: Vec<WeightDump>,
}

#[derive(Serialize)]
struct FixtureReport<'a> {
    summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    weights: Option<WeightSection<'a>>,
}

/// Builds fixtures into `out`. Layer names are unique across everything one
/// generator builds, and weights come from a single seeded stream.
pub struct FixtureGenerator<W: Write> {
    out: W,
    scope: NameScope,
    rng: StdRng,
    seed: u64,
    settings: FixtureSettings,
    format: OutputFormat,
}

impl<W: Write> FixtureGenerator<W> {
    pub fn new(out: W, settings: FixtureSettings) -> Self {
        let seed = settings.seed.unwrap_or_else(rand::random);
        info!("Initializing weights with seed {seed}");
        Self {
            out,
            scope: NameScope::new(),
            rng: StdRng::seed_from_u64(seed),
            seed,
            settings,
            format: OutputFormat::Text,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Builds the MNIST classifier and prints its summary.
    pub fn build_classifier_and_summarize(&mut self) -> Result<Model> {
        let model = self.build(&mnist_classifier())?;
        self.emit(&model, None)?;
        Ok(model)
    }

    /// Builds the convolution fixture and prints its summary and kernel/bias.
    pub fn build_single_layer_and_dump_weights(&mut self) -> Result<Model> {
        let model = self.build(&conv_fixture())?;
        self.emit(&model, Some(("CONV", &model.layers[0])))?;
        Ok(model)
    }

    /// Builds the batch normalization fixture and prints its summary and
    /// gamma, beta, moving mean and moving variance.
    pub fn build_batch_norm_and_dump_weights(&mut self) -> Result<Model> {
        let model = self.build(&batch_norm_fixture())?;
        self.emit(&model, Some(("BATCH NORM", &model.layers[0])))?;
        Ok(model)
    }

    /// Summarizes an arbitrary model, dumping the weights of `dump_layer` when given.
    pub fn build_custom_and_summarize(
        &mut self,
        info: &ModelInfo,
        dump_layer: Option<&str>,
    ) -> Result<Model> {
        let model = self.build(info)?;
        let dump = match dump_layer {
            Some(name) => Some(("LAYER", model.layer(name)?)),
            None => None,
        };
        self.emit(&model, dump)?;
        Ok(model)
    }

    pub fn run(&mut self, fixtures: &[Fixture]) -> Result<Vec<Model>> {
        fixtures
            .iter()
            .map(|fixture| match fixture {
                Fixture::BatchNorm => self.build_batch_norm_and_dump_weights(),
                Fixture::Conv => self.build_single_layer_and_dump_weights(),
                Fixture::Mnist => self.build_classifier_and_summarize(),
            })
            .collect()
    }

    fn build(&mut self, info: &ModelInfo) -> Result<Model> {
        Ok(Model::build(info, &mut self.scope, &mut self.rng)?)
    }

    fn emit(&mut self, model: &Model, dump: Option<(&str, &BuiltLayer)>) -> Result<()> {
        let summary = Summary::new(model).with_line_length(self.settings.summary.line_length);
        match self.format {
            OutputFormat::Text => {
                write!(self.out, "{summary}").context("failed to write model summary")?;
                if let Some((label, layer)) = dump {
                    write_weights(&mut self.out, label, layer.get_weights(), &self.settings.print)
                        .context("failed to write weight dump")?;
                }
            }
            OutputFormat::Json => {
                let report = FixtureReport {
                    summary,
                    weights: dump.map(|(_, layer)| WeightSection {
                        layer: &layer.name,
                        tensors: WeightDump::collect(layer.get_weights()),
                    }),
                };
                serde_json::to_writer_pretty(&mut self.out, &report)
                    .context("failed to serialize fixture report")?;
                writeln!(self.out).context("failed to write fixture report")?;
            }
        }
        self.out.flush().context("failed to flush fixture output")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> FixtureSettings {
        FixtureSettings {
            seed: Some(seed),
            ..FixtureSettings::default()
        }
    }

    #[test]
    fn classifier_literal_has_ten_layers() {
        let info = mnist_classifier();
        let classes: Vec<_> = info.layers.iter().map(|l| l.kind.class_name()).collect();
        assert_eq!(
            classes,
            [
                "Conv2D",
                "ReLU",
                "MaxPooling2D",
                "Conv2D",
                "ReLU",
                "MaxPooling2D",
                "Dense",
                "ReLU",
                "Dense",
                "Softmax"
            ]
        );
    }

    #[test]
    fn classifier_summary_totals() {
        let mut generator = FixtureGenerator::new(Vec::new(), seeded(0));
        let model = generator.build_classifier_and_summarize().unwrap();
        assert_eq!(model.param_count(), 128_906);
        let text = String::from_utf8(generator.into_inner()).unwrap();
        assert!(text.contains("dense_1 (Dense)              (None, 7, 7, 10)          10250     "));
        assert!(text.contains("Total params: 128,906"));
    }

    #[test]
    fn batch_norm_dump_lists_four_vectors() {
        let mut generator = FixtureGenerator::new(Vec::new(), seeded(0));
        generator.build_batch_norm_and_dump_weights().unwrap();
        let text = String::from_utf8(generator.into_inner()).unwrap();
        assert!(text.contains("BATCH NORM WEIGHTS 0 SHAPED (3,)\n[1. 1. 1.]\n"));
        assert!(text.contains("BATCH NORM WEIGHTS 1 SHAPED (3,)\n[0. 0. 0.]\n"));
        assert!(text.contains("BATCH NORM WEIGHTS 2 SHAPED (3,)\n[0. 0. 0.]\n"));
        assert!(text.contains("BATCH NORM WEIGHTS 3 SHAPED (3,)\n[1. 1. 1.]\n"));
        assert!(text.contains("Non-trainable params: 6"));
    }

    #[test]
    fn json_format_reports_weights() {
        let mut generator =
            FixtureGenerator::new(Vec::new(), seeded(5)).with_format(OutputFormat::Json);
        generator.build_single_layer_and_dump_weights().unwrap();
        let text = String::from_utf8(generator.into_inner()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(report["summary"]["total_params"], 836);
        assert_eq!(report["weights"]["layer"], "conv2d");
        assert_eq!(report["weights"]["tensors"][0]["shape"], serde_json::json!([5, 5, 3, 11]));
        assert_eq!(report["weights"]["tensors"][1]["values"].as_array().unwrap().len(), 11);
    }

    #[test]
    fn custom_dump_requires_existing_layer() {
        let mut generator = FixtureGenerator::new(Vec::new(), seeded(0));
        let err = generator
            .build_custom_and_summarize(&conv_fixture(), Some("nope"))
            .unwrap_err();
        assert!(err.to_string().contains("no layer named `nope`"));
    }
}
