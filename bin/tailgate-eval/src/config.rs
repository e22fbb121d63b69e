use std::path::PathBuf;

use clap::Parser;

#[derive(Clone, Debug, Parser)]
#[command(about)]
pub struct Cli {
    /// Path to the configuration file, in YAML format.
    ///
    /// Settings can be overridden with `TAILGATE_`-prefixed environment variables, such as
    /// `TAILGATE_TAIL_SAMPLING_DISABLE_INVERT_DECISIONS=false`.
    #[arg(short = 'c', long = "config")]
    pub config_file: Option<PathBuf>,

    /// Path to the traces to evaluate, in JSON format.
    pub traces_file: PathBuf,

    /// Path to write the kept traces to, in JSON format.
    ///
    /// Kept traces carry a `tailsampling.policy` scope attribute naming the first policy that sampled them.
    #[arg(short = 'o', long = "output")]
    pub output_file: Option<PathBuf>,
}
