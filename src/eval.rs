//
// mender - genetic repair of assembly programs
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Module: fitness evaluation.
//

use asm::{representation_hash, Compiled, Fitness, Individual};
use config::Config;
use error::Error;
use rayon::prelude::*;
use serde_json;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile;
use wait_timeout::ChildExt;

///
/// Compiles and scores individuals against the two test oracles.
///
/// Shared by all worker threads of a run; the fitness cache and the
/// evaluation counter are the only mutable state.
///
pub struct Evaluator {
    compiler: String,
    compiler_flags: Vec<String>,
    test_good: PathBuf,
    good_mult: f64,
    test_bad: PathBuf,
    bad_mult: f64,
    test_timeout: Duration,
    /// Working directory for the oracle scripts, if any.
    test_dir: Option<PathBuf>,
    /// Fitness per representation hash; append-only during a run.
    cache: Mutex<HashMap<u32, Fitness>>,
    /// Total number of evaluator calls, cache hits included.
    fitness_count: AtomicUsize
}

impl Evaluator {
    pub fn new(
        compiler: String,
        compiler_flags: Vec<String>,
        test_good: PathBuf,
        good_mult: f64,
        test_bad: PathBuf,
        bad_mult: f64,
        test_timeout_ms: u64,
        test_dir: Option<PathBuf>
    ) -> Evaluator {
        Evaluator{
            compiler,
            compiler_flags,
            test_good,
            good_mult,
            test_bad,
            bad_mult,
            test_timeout: Duration::from_millis(test_timeout_ms),
            test_dir,
            cache: Mutex::new(HashMap::new()),
            fitness_count: AtomicUsize::new(0)
        }
    }

    pub fn from_config(config: &Config) -> Evaluator {
        Evaluator::new(
            config.compiler.clone(),
            config.compiler_flags.clone().unwrap_or_else(|| vec![]),
            PathBuf::from(&config.test_good),
            config.good_mult,
            PathBuf::from(&config.test_bad),
            config.bad_mult,
            config.test_timeout,
            config.test_dir.as_ref().map(PathBuf::from)
        )
    }

    /// Number of evaluations performed so far.
    pub fn fitness_count(&self) -> usize {
        self.fitness_count.load(Ordering::SeqCst)
    }

    ///
    /// Scores an individual: compile, run both oracles, sum the
    /// weighted line counts of their output files. A failed compile
    /// scores 0 without running the oracles. Never fails; every error
    /// on the way simply contributes 0.
    ///
    /// Equal representations are scored once per run; later calls are
    /// served from the cache and marked `Compiled::Cached` so no
    /// recompilation happens.
    ///
    pub fn evaluate(&self, individual: &mut Individual) {
        individual.trials = self.fitness_count.fetch_add(1, Ordering::SeqCst) + 1;

        let hash = representation_hash(&individual.representation);
        if let Some(&fitness) = self.cache.lock().unwrap().get(&hash) {
            individual.fitness = Some(fitness);
            individual.compile = Compiled::Cached;
            return;
        }

        let fitness = match self.compile(individual) {
            Some(binary) => {
                let fitness = self.run_oracle(&self.test_good, &binary) * self.good_mult
                    + self.run_oracle(&self.test_bad, &binary) * self.bad_mult;
                individual.compile = Compiled::Binary(binary);
                fitness
            },
            None => {
                individual.compile = Compiled::None;
                0.0
            }
        };

        individual.fitness = Some(fitness);
        self.cache.lock().unwrap().insert(hash, fitness);
    }

    /// Evaluates a population in parallel using `RAYON_NUM_THREADS`
    /// CPU cores.
    pub fn evaluate_all(&self, population: &mut [Individual]) {
        population.par_iter_mut().for_each(|individual| self.evaluate(individual));
    }

    ///
    /// Writes the representation to a temp source file and invokes
    /// `<compiler> [flags…] -o <binary> <source>`. The source file is
    /// always deleted; a binary left behind by a failed compile is
    /// deleted too.
    ///
    fn compile(&self, individual: &Individual) -> Option<PathBuf> {
        let source = tempfile::Builder::new()
            .prefix("variant")
            .suffix(".s")
            .tempfile()
            .ok()?;
        fs::write(source.path(), individual.to_source()).ok()?;

        let binary = tempfile::Builder::new()
            .prefix("variant")
            .suffix(".bin")
            .tempfile()
            .ok()?
            .into_temp_path();

        let status = Command::new(&self.compiler)
            .args(&self.compiler_flags)
            .arg("-o")
            .arg(&*binary)
            .arg(source.path())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => {
                let binary = binary.keep().ok()?;
                mark_executable(&binary);
                Some(binary)
            },
            _ => None  // dropping `binary` deletes the failed artifact
        }
    }

    ///
    /// Runs `<script> <binary> <out_file>` under the wall-clock
    /// timeout and returns the line count of the output file. Timeout,
    /// spawn failure and non-zero exit all score 0; a timed-out
    /// subprocess is killed.
    ///
    fn run_oracle(&self, script: &Path, binary: &Path) -> f64 {
        let out_file = match tempfile::Builder::new().prefix("oracle").suffix(".out").tempfile() {
            Ok(f) => f,
            Err(_) => return 0.0
        };

        let mut command = Command::new(script);
        command.arg(binary)
            .arg(out_file.path())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(ref dir) = self.test_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(_) => return 0.0
        };

        match child.wait_timeout(self.test_timeout) {
            Ok(Some(status)) if status.success() => {
                fs::read_to_string(out_file.path())
                    .map(|contents| contents.lines().count() as f64)
                    .unwrap_or(0.0)
            },
            Ok(Some(_)) => 0.0,
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                0.0
            }
        }
    }

    ///
    /// Loads persisted cache entries, returning how many were added.
    /// Existing in-memory entries win over persisted ones.
    ///
    pub fn load_cache<P: AsRef<Path>>(&self, path: P) -> Result<usize, Error> {
        let contents = fs::read_to_string(path)?;
        let persisted: HashMap<String, Fitness> = serde_json::from_str(&contents)?;
        let mut cache = self.cache.lock().unwrap();
        let mut added = 0;
        for (key, fitness) in persisted {
            if let Ok(hash) = key.parse::<u32>() {
                if !cache.contains_key(&hash) {
                    cache.insert(hash, fitness);
                    added += 1;
                }
            }
        }
        Ok(added)
    }

    /// Persists the cache as a string-keyed JSON map.
    pub fn save_cache<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let cache = self.cache.lock().unwrap();
        let persisted: HashMap<String, Fitness> =
            cache.iter().map(|(hash, &fitness)| (hash.to_string(), fitness)).collect();
        fs::write(path, serde_json::to_string_pretty(&persisted)?)?;
        Ok(())
    }
}

#[cfg(unix)]
fn mark_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o755));
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) {}
