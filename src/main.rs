#![allow(dead_code)]

use crate::driver::{Driver, Options};
use crate::io::{read_fcidump, write_footer, write_header, Configuration};
use crate::methods::Method;
use crate::utils::Timer;
use anyhow::{bail, Result};
use clap::{App, Arg};
use env_logger::Builder;
use log::{info, LevelFilter};
use std::io::Write;

mod defaults;
mod driver;
mod eom_guess;
mod hamiltonian;
mod io;
mod methods;
mod operators;
mod solvers;
mod system;
mod utils;

#[macro_use]
extern crate clap;

fn main() -> Result<()> {
    // Input.
    let matches = App::new(crate_name!())
        .version(crate_version!())
        .about("coupled-cluster and equation-of-motion calculations")
        .arg(
            Arg::new("FCIDUMP-File")
                .about("Sets the integral file to use")
                .required(true)
                .index(1),
        )
        .get_matches();
    // The file containing the integrals is the only mandatory file to
    // start a calculation; everything else comes from the configuration.
    let integral_file = matches.value_of("FCIDUMP-File").unwrap();
    let config: Configuration = Configuration::new();

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

    let method: Method = config.method()?;
    let options: Options = config.driver_options()?;
    let (system, hamiltonian) = read_fcidump(integral_file)?;

    info!(
        "{:>22} {:>4} occupied, {:>4} virtual spin orbitals",
        "correlated space:",
        system.dims.no(),
        system.dims.nv()
    );
    info!(
        "{:>22} {:>18.10} Hartree",
        "reference energy:", system.reference_energy
    );

    // Computations.
    // ................................................................
    match config.jobtype.as_str() {
        "energy" => {
            if method.uses_pspace() {
                bail!(
                    "{} needs explicit excitation lists and is only available through the library interface",
                    method
                );
            }
            let mut driver = Driver::new(system, hamiltonian, options);

            // Ground state.
            let summary = driver.run_cc(method)?;
            if !summary.converged {
                bail!(
                    "{} did not converge within {} iterations",
                    method,
                    summary.iterations
                );
            }
            info!("{:^80}", "");
            info!(
                "{:>22} {:>18.10} Hartree",
                "correlation energy:",
                driver.correlation_energy()
            );
            info!(
                "{:>22} {:>18.10} Hartree",
                "total energy:",
                driver.total_energy()
            );

            // Excited states.
            let nroots = config.excited.nroots;
            if nroots > 0 || config.excited.left {
                driver.run_hbar()?;
            }
            if nroots > 0 {
                let eom_method = match method.order() {
                    2 => Method::EomCcsd,
                    _ => Method::EomCcsdt1P,
                };
                let guesses = driver.run_guess(nroots)?;
                for root in 0..guesses.len() {
                    driver.run_eomcc(eom_method, root)?;
                }
                info!("{:^80}", "");
                info!(
                    "{:>6} {:>18} {:>18} {:>12}",
                    "root", "excitation", "total energy", "ref. weight"
                );
                for root in 0..guesses.len() {
                    let state = driver.right_state(root).unwrap();
                    info!(
                        "{:>6} {:>18.10} {:>18.10} {:>12.6}",
                        root + 1,
                        state.omega,
                        driver.total_energy() + state.omega,
                        driver.reference_weight(root).unwrap()
                    );
                }
            }

            // Left-hand companions.
            if config.excited.left {
                let left_method = match method.order() {
                    2 => Method::LeftCcsd,
                    _ => Method::LeftCcsdt1P,
                };
                driver.run_leftcc(left_method, None)?;
                for root in 0..nroots {
                    driver.run_leftcc(left_method, Some(root))?;
                }
            }
        }
        jtype => {
            println!("Jobtype: {} is not available.", jtype);
            println!("Choose one of the available types: energy");
        }
    }
    // ................................................................

    // Finished.
    // The total wall-time is printed together with the end statement.
    write_footer(timer);
    Ok(())
}
