use clap::Parser;
use log::LevelFilter;
use simplelog::ColorChoice;
use simplelog::ConfigBuilder;
use simplelog::LevelPadding;
use simplelog::TermLogger;
use simplelog::TerminalMode;

use riffle::command_line_options::CommandLineOptions;
use riffle::prelude::*;

fn main() {
    let opts = CommandLineOptions::parse();
    let params = match load_parameters(&opts) {
        Ok(params) => params,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };
    run(opts, params);
}

fn load_parameters(opts: &CommandLineOptions) -> Result<SimulationParameters, SetupError> {
    match &opts.params {
        Some(path) => SimulationParameters::from_file(path),
        None => Ok(SimulationParameters::default()),
    }
}

/// Only the coordinator talks to the terminal; in the threaded transport
/// that logger covers every rank of the process.
fn setup_logging(is_main: bool, verbosity: usize) {
    if !is_main {
        return;
    }
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let config = ConfigBuilder::default()
        .set_level_padding(LevelPadding::Right)
        .set_thread_level(LevelFilter::Off)
        .build();
    TermLogger::init(level, config, TerminalMode::Mixed, ColorChoice::Auto).unwrap();
}

#[cfg(feature = "mpi")]
fn run(opts: CommandLineOptions, params: SimulationParameters) {
    use riffle::communication::MPI_UNIVERSE;

    let comms = Comms::world();
    setup_logging(comms.rank.is_main(), opts.verbosity);
    run_rank(comms, params);
    MPI_UNIVERSE.drop();
}

#[cfg(not(feature = "mpi"))]
fn run(opts: CommandLineOptions, params: SimulationParameters) {
    use std::thread;

    setup_logging(true, opts.verbosity);
    let num_ranks = opts.num_ranks.max(2);
    let mut all_comms = Comms::local(num_ranks);
    let coordinator_comms = all_comms.remove(0);
    let handles: Vec<_> = all_comms
        .into_iter()
        .map(|comms| {
            let params = params.clone();
            thread::spawn(move || run_rank(comms, params))
        })
        .collect();
    run_rank(coordinator_comms, params);
    for handle in handles {
        handle.join().unwrap();
    }
}

fn run_rank(comms: Comms, params: SimulationParameters) {
    if let Err(err) = params.validate(comms.size) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
    if comms.rank.is_main() {
        let mut coordinator = match Coordinator::new(comms, params) {
            Ok(coordinator) => coordinator,
            Err(err) => {
                eprintln!("{}", err);
                std::process::exit(1);
            }
        };
        coordinator.run(&mut NullDisplay::default(), &mut IdleControls::default());
    } else {
        Worker::new(comms, &params).run();
    }
}
