use anyhow::{bail, Context, Result};
use clap::{crate_name, crate_version, Arg, Command};
use env_logger::Builder;
use linresp::io::{
    print_excitations, print_response_functions, print_transition_moments, read_config,
    read_model, write_excitations, write_footer, write_header, write_solutions, Configuration,
};
use linresp::response::{
    response_functions, transition_moments, Excitation, LogObserver, ResponseEngine,
    ResponseSolution, ResponseSolver, SolverOptions, TargetMap,
};
use linresp::utils::Timer;
use linresp::DenseModel;
use log::{info, warn, LevelFilter};
use ndarray::prelude::*;
use std::io::Write;
use std::path::Path;

fn main() -> Result<()> {
    // Input.
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about("paired linear response solver for response functions and excitation energies")
        .arg(
            Arg::new("model-file")
                .help("Sets the model file (.toml or .json) to use, overrides the model of the config file")
                .index(1),
        )
        .get_matches();
    let config: Configuration = read_config()?;

    // Logging.
    // The log level is set.
    let log_level: LevelFilter = match config.verbose {
        2 => LevelFilter::Trace,
        1 => LevelFilter::Debug,
        0 => LevelFilter::Info,
        -1 => LevelFilter::Warn,
        -2 => LevelFilter::Error,
        _ => LevelFilter::Info,
    };
    // and the logger is build.
    Builder::new()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .filter(None, log_level)
        .init();

    // The program header is written to the command line.
    write_header();
    // and the total wall-time timer is started.
    let timer: Timer = Timer::start();

    let model_file: String = matches
        .get_one::<String>("model-file")
        .cloned()
        .or_else(|| config.model.clone())
        .context("No model file given, neither on the command line nor in the config file")?;
    let mut model: DenseModel = read_model(Path::new(&model_file))?;
    info!(
        "{: <25} {} ({} single excitations)",
        "Model:",
        model_file,
        model.excitations().len()
    );
    info!("{: <25} {}", "Available operators:", model.operators().join(", "));

    let options: SolverOptions =
        SolverOptions::from(&config.response).with_observer(Box::new(LogObserver));
    let ops: Vec<&str> = config.response.ops();
    let freqs: &[f64] = &config.response.freqs;
    let roots: usize = config.response.roots;
    let v1: Vec<Array1<f64>> = model.rhs(&ops)?;
    let mut solver = ResponseSolver::new(&mut model, options);

    // Computations.
    // ................................................................
    let (solutions, excitations): (TargetMap<Array1<f64>>, Vec<Excitation>) =
        match config.jobtype.as_str() {
            "lr" => {
                let solution: ResponseSolution = solver.lr_solve(&ops, freqs, roots)?;
                if !solution.converged {
                    warn!(
                        "Linear response equations not converged after {} iterations",
                        solution.iterations
                    );
                }
                (solution.solutions, solution.excitations)
            }
            "pp" => (TargetMap::new(), solver.pp_solve(roots)?),
            "direct_lr" => (solver.direct_lr_solver(&ops, freqs)?, Vec::new()),
            "direct_pp" => (TargetMap::new(), solver.direct_ev_solver(roots)?),
            jtype => bail!("Jobtype: {} is not available.", jtype),
        };
    // ................................................................

    if !solutions.is_empty() {
        print_response_functions(&response_functions(&ops, &v1, &solutions));
    }
    if !excitations.is_empty() {
        print_excitations(&excitations);
        print_transition_moments(&transition_moments(&ops, &v1, &excitations));
    }
    if let Some(out) = &config.out {
        let out: &Path = Path::new(out);
        if !solutions.is_empty() {
            write_solutions(out, &solutions)?;
        }
        if !excitations.is_empty() {
            write_excitations(out, &excitations)?;
        }
    }

    // Finished.
    // The total wall-time is printed together with the end statement.
    write_footer(timer);
    Ok(())
}
