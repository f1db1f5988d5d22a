use std::{fs, io, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use layer_fixtures::{Fixture, FixtureGenerator, FixtureSettings, ModelInfo, OutputFormat, init_logging};
use log::{LevelFilter, info};

/// Print reference model summaries and initial layer weights for layer tests.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct FixtureArgs {
    /// Fixtures to generate, in order (default: batch-norm conv mnist).
    #[arg(value_enum)]
    fixtures: Vec<Fixture>,

    /// Model descriptor JSON to summarize instead of the built-in fixtures.
    #[arg(long, conflicts_with = "fixtures")]
    model: Option<PathBuf>,

    /// Name of a layer in --model whose initial weights are dumped.
    #[arg(long, requires = "model")]
    dump_layer: Option<String>,

    /// Optional settings JSON (seed, print options, summary width).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the weight initialization seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Output format written to stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn main() -> Result<()> {
    init_logging(LevelFilter::Warn)?;
    let args = FixtureArgs::parse();

    let mut settings = match args.config.as_ref() {
        Some(path) => FixtureSettings::load_from_path(path)?,
        None => FixtureSettings::default(),
    };
    if let Some(seed) = args.seed {
        settings.seed = Some(seed);
    }

    let stdout = io::stdout().lock();
    let mut generator = FixtureGenerator::new(stdout, settings).with_format(args.format);

    if let Some(path) = args.model.as_ref() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read model file {}", path.display()))?;
        let info: ModelInfo = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse model JSON at {}", path.display()))?;
        generator.build_custom_and_summarize(&info, args.dump_layer.as_deref())?;
        return Ok(());
    }

    let fixtures = if args.fixtures.is_empty() {
        Fixture::ALL.to_vec()
    } else {
        args.fixtures
    };
    let models = generator.run(&fixtures)?;
    info!("Generated {} fixture(s) with seed {}", models.len(), generator.seed());
    Ok(())
}
