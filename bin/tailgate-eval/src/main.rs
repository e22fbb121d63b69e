//! Offline tail sampling evaluator.
//!
//! Buffers a JSON file of traces, evaluates every trace against the configured sampling policies, and reports one
//! outcome per trace as a JSON line on standard output.

#![deny(missing_docs)]

use std::{
    fs::File,
    io::{self, BufWriter, Write as _},
};

use anyhow::Context as _;
use clap::Parser as _;
use tailgate_config::{ConfigurationLoader, GenericConfiguration};
use tailgate_sampling::SamplingConfiguration;
use tracing::{error, info};

mod config;
use self::config::Cli;

mod eval;
use self::eval::Evaluator;

mod logging;
use self::logging::{initialize_logging, LoggingConfiguration};

fn main() {
    let cli = Cli::parse();

    let configuration = match load_configuration(&cli) {
        Ok(configuration) => configuration,
        Err(e) => fatal_and_exit(format!("failed to load configuration: {:?}", e)),
    };

    if let Err(e) = LoggingConfiguration::from_configuration(&configuration).and_then(initialize_logging) {
        fatal_and_exit(format!("failed to initialize logging: {:?}", e));
    }

    match run(&cli, &configuration) {
        Ok(()) => info!("Evaluation complete."),
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1);
        }
    }
}

fn fatal_and_exit(message: String) -> ! {
    eprintln!("FATAL: {}", message);
    std::process::exit(1);
}

fn load_configuration(cli: &Cli) -> anyhow::Result<GenericConfiguration> {
    let mut loader = ConfigurationLoader::default();
    if let Some(path) = &cli.config_file {
        loader = loader
            .from_yaml(path)
            .with_context(|| format!("Failed to load configuration file '{}'.", path.display()))?;
    }

    Ok(loader.from_environment("TAILGATE")?.into_generic())
}

fn run(cli: &Cli, configuration: &GenericConfiguration) -> anyhow::Result<()> {
    let sampling_config =
        SamplingConfiguration::from_configuration(configuration).context("Failed to load sampling configuration.")?;
    let policies = sampling_config
        .build_policies()
        .context("Failed to build sampling policies.")?;
    if policies.is_empty() {
        anyhow::bail!("No sampling policies configured. Set `tail_sampling.policies` in the configuration file.");
    }

    info!(
        policies = policies.len(),
        inversion_disabled = sampling_config.inversion_mode().is_inversion_disabled(),
        "Starting evaluation."
    );

    let evaluator = Evaluator::new(sampling_config.combinator(), policies);
    evaluator.ingest_file(&cli.traces_file)?;
    let (outcomes, kept) = evaluator.evaluate_all();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for outcome in &outcomes {
        serde_json::to_writer(&mut out, outcome).context("Failed to write trace outcome.")?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    if let Some(path) = &cli.output_file {
        let file = File::create(path).with_context(|| format!("Failed to create output file '{}'.", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &kept).context("Failed to write kept traces.")?;
        writer.flush()?;
    }

    let sampled = outcomes.iter().filter(|o| o.sampled_by.is_some()).count();
    info!(traces = outcomes.len(), sampled, "Evaluated all buffered traces.");
    Ok(())
}
