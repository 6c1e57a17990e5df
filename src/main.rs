use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use frontkit::{Config, PipelineName, logging};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    /// Pipeline to run.
    #[clap(value_enum, index = 1, default_value_t = PipelineName::Dev)]
    pipeline: PipelineName,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init() {
        eprintln!("couldn't initialize logging: {e}");
    }

    match run(args.pipeline) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(pipeline: PipelineName) -> anyhow::Result<()> {
    let config = Config::from_cwd().context("couldn't load configuration")?;
    frontkit::run(pipeline, &config).with_context(|| format!("pipeline '{pipeline}' failed"))?;
    Ok(())
}
