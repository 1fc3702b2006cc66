use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CommandLineOptions {
    /// Path to the yaml parameter file; built-in defaults apply when
    /// absent.
    #[clap(long)]
    pub params: Option<PathBuf>,
    #[clap(short, parse(from_occurrences))]
    pub verbosity: usize,
    /// World size when running all ranks as threads of this process:
    /// one coordinator plus `num_ranks - 1` workers.
    #[cfg(not(feature = "mpi"))]
    #[clap(long, default_value_t = 5)]
    pub num_ranks: usize,
}
