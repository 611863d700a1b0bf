use crate::defaults::*;
use crate::driver::{DavidsonSolver, Options};
use crate::methods::Method;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_jobtype() -> String {
    String::from("energy")
}
fn default_verbose() -> i8 {
    0
}
fn default_method() -> String {
    String::from(METHOD)
}
fn default_maximum_iterations() -> usize {
    MAX_ITER
}
fn default_amplitude_convergence() -> f64 {
    AMP_CONV
}
fn default_energy_convergence() -> f64 {
    ENERGY_CONV
}
fn default_energy_shift() -> f64 {
    ENERGY_SHIFT
}
fn default_diis_size() -> i64 {
    DIIS_SIZE
}
fn default_diis_min_space() -> usize {
    DIIS_MIN_SPACE
}
fn default_nroots() -> usize {
    NROOTS
}
fn default_left() -> bool {
    false
}
fn default_davidson_solver() -> String {
    String::from(DAVIDSON_SOLVER)
}
fn default_davidson_max_subspace_size() -> usize {
    DAVIDSON_MAX_SUBSPACE
}
fn default_cc_config() -> CcConfig {
    let cc_config: CcConfig = toml::from_str("").unwrap();
    cc_config
}
fn default_excited_state_config() -> ExcitedStatesConfig {
    let excited_config: ExcitedStatesConfig = toml::from_str("").unwrap();
    excited_config
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Configuration {
    #[serde(default = "default_jobtype")]
    pub jobtype: String,
    #[serde(default = "default_verbose")]
    pub verbose: i8,
    #[serde(default = "default_cc_config")]
    pub cc: CcConfig,
    #[serde(default = "default_excited_state_config")]
    pub excited: ExcitedStatesConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CcConfig {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_maximum_iterations")]
    pub maximum_iterations: usize,
    #[serde(default = "default_amplitude_convergence")]
    pub amplitude_convergence: f64,
    #[serde(default = "default_energy_convergence")]
    pub energy_convergence: f64,
    #[serde(default = "default_energy_shift")]
    pub energy_shift: f64,
    #[serde(default = "default_diis_size")]
    pub diis_size: i64,
    #[serde(default = "default_diis_min_space")]
    pub diis_min_space: usize,
    /// Omitted: derive the spin-flip shortcut from the orbital counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhf_symmetry: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExcitedStatesConfig {
    #[serde(default = "default_nroots")]
    pub nroots: usize,
    #[serde(default = "default_left")]
    pub left: bool,
    #[serde(default = "default_davidson_solver")]
    pub davidson_solver: String,
    #[serde(default = "default_davidson_max_subspace_size")]
    pub davidson_max_subspace_size: usize,
}

impl Configuration {
    /// Read the configuration file from the working directory. If it does
    /// not exist the default settings are used and written out so the run
    /// is reproducible.
    pub fn new() -> Self {
        let config_file_path: &Path = Path::new(CONFIG_FILE_NAME);
        let mut config_string: String = if config_file_path.exists() {
            fs::read_to_string(config_file_path).expect("Unable to read config file")
        } else {
            String::from("")
        };
        let config: Self = toml::from_str(&config_string).unwrap();
        if !config_file_path.exists() {
            config_string = toml::to_string(&config).unwrap();
            fs::write(config_file_path, config_string).expect("Unable to write config file");
        }
        config
    }

    pub fn method(&self) -> Result<Method> {
        self.cc
            .method
            .parse()
            .map_err(|e| anyhow!("{}", e))
    }

    pub fn driver_options(&self) -> Result<Options> {
        let davidson_solver: DavidsonSolver = self
            .excited
            .davidson_solver
            .parse()
            .map_err(|e| anyhow!("{}", e))?;
        Ok(Options {
            maximum_iterations: self.cc.maximum_iterations,
            amplitude_convergence: self.cc.amplitude_convergence,
            energy_convergence: self.cc.energy_convergence,
            energy_shift: self.cc.energy_shift,
            diis_size: self.cc.diis_size,
            diis_min_space: self.cc.diis_min_space,
            davidson_max_subspace_size: self.excited.davidson_max_subspace_size,
            davidson_solver,
            rhf_symmetry: self.cc.rhf_symmetry,
        })
    }
}
