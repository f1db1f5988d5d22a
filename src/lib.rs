//! Reference fixture generation for convolutional layer tests.
//!
//! Models are described as ordered [`LayerInfo`] stacks, materialized into a
//! [`Model`] with inferred shapes and initialized weights, and reported as
//! Keras-style summaries plus NumPy-style weight dumps.

pub mod config;
pub mod dump;
pub mod error;
pub mod fixtures;
pub mod init;
pub mod layers;
pub mod model;
pub mod shape;
pub mod summary;

pub use config::FixtureSettings;
pub use error::ModelError;
pub use fixtures::{Fixture, FixtureGenerator, OutputFormat, mnist_classifier};
pub use init::{Initializer, WeightTensor};
pub use layers::LayerKind;
pub use model::{BuiltLayer, LayerInfo, Model, ModelInfo, NameScope};
pub use shape::{Padding, Shape};
pub use summary::Summary;

use anyhow::Result;
use log::LevelFilter;

/// Initialize `env_logger` with `default_filter` unless `RUST_LOG` says otherwise.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}
