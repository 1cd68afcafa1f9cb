//
// mender - genetic repair of assembly programs
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Module: run configuration.
//

use error::Error;
use operators::CrossoverKind;
use rand;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use toml;

fn default_target_fitness() -> f64 { 10.0 }
fn default_max_generations() -> usize { 10 }
fn default_population_size() -> usize { 40 }
fn default_tournament_size() -> usize { 3 }
fn default_max_section_size() -> usize { 1 }
fn default_crossover_rate() -> f64 { 0.1 }
fn default_crossover_operator() -> CrossoverKind { CrossoverKind::Normal }
fn default_good_mult() -> f64 { 1.0 }
fn default_bad_mult() -> f64 { 5.0 }
fn default_compiler() -> String { "gcc".to_string() }
fn default_test_timeout() -> u64 { 2000 }
fn default_point_neighborhood() -> usize { 4 }
fn default_output_dir() -> String { ".".to_string() }
fn default_random_seed() -> u64 { rand::random::<u64>() }

/// Operator-provided run settings, loaded from a TOML file.
///
/// Everything except the input paths and the two oracle scripts has a
/// default.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Baseline assembly source to repair.
    pub asm: String,
    /// Execution trace of the passing test run, if available.
    #[serde(default)]
    pub good_path: Option<String>,
    /// Execution trace of the failing test run, if available.
    #[serde(default)]
    pub bad_path: Option<String>,

    /// Oracle script characterizing desired behavior.
    pub test_good: String,
    /// Oracle script characterizing the defect.
    pub test_bad: String,
    /// Working directory for the oracle scripts.
    #[serde(default)]
    pub test_dir: Option<String>,
    /// Persisted fitness cache, reused across runs.
    #[serde(default)]
    pub fitness_cache_path: Option<String>,
    /// Where checkpoints and the final winner are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default = "default_target_fitness")]
    pub target_fitness: f64,
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Tournament selection instead of stochastic universal sampling.
    #[serde(default)]
    pub use_tournament: bool,
    #[serde(default = "default_max_section_size")]
    pub max_section_size: usize,
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    #[serde(default = "default_crossover_operator")]
    pub crossover_operator: CrossoverKind,
    #[serde(default = "default_good_mult")]
    pub good_mult: f64,
    #[serde(default = "default_bad_mult")]
    pub bad_mult: f64,

    #[serde(default = "default_compiler")]
    pub compiler: String,
    #[serde(default)]
    pub compiler_flags: Option<Vec<String>>,
    /// Wall-clock limit per oracle run, in milliseconds.
    #[serde(default = "default_test_timeout")]
    pub test_timeout: u64,
    /// Exemplar radius for homologous crossover.
    #[serde(default = "default_point_neighborhood")]
    pub point_neighborhood: usize,

    #[serde(default = "default_random_seed")]
    pub random_seed: u64
}

impl Config {
    /// Loads the configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }
}
