//
// mender - genetic repair of assembly programs
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Tool: repair. Evolve a defective assembly program against a pair
//   of test oracles and write out the fittest variant.
//

extern crate env_logger;
#[macro_use]
extern crate log;
extern crate mender;
extern crate rand;
extern crate rand_xorshift;

use mender::asm::{Individual, WeightKey};
use mender::config::Config;
use mender::eval::Evaluator;
use mender::evolve;
use mender::trace;
use rand::prelude::*;
use rand_xorshift::XorShiftRng;
use std::path::Path;

/// Turns the configured execution traces into per-instruction weights:
/// edits concentrate where the failing run went, copy sources come
/// from what only the passing run touched.
fn apply_trace_weights(baseline: &mut Individual, config: &Config) {
    let program_len = baseline.representation.len();

    let bad_trace = config.bad_path.as_ref().map(|path| {
        trace::read_trace(path).expect(&format!("Could not read trace {}.", path))
    });
    let good_trace = config.good_path.as_ref().map(|path| {
        trace::read_trace(path).expect(&format!("Could not read trace {}.", path))
    });

    if let Some(ref bad) = bad_trace {
        baseline.apply_path(WeightKey::Bad, &trace::smoothed_weights(bad, program_len));
    }
    if let Some(ref good) = good_trace {
        let difference = match bad_trace {
            Some(ref bad) => trace::difference(good, bad),
            None => good.clone()
        };
        baseline.apply_path(
            WeightKey::Good,
            &trace::smoothed_weights(&difference, program_len)
        );
    }
}

fn main() {
    env_logger::init();

    let config_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: repair <config.toml>");
            std::process::exit(1);
        }
    };

    let config = Config::from_file(&config_path)
        .expect(&format!("Could not load {}.", config_path));

    let mut baseline = Individual::read(&config.asm)
        .expect(&format!("Could not read {}.", config.asm));
    apply_trace_weights(&mut baseline, &config);

    let evaluator = Evaluator::from_config(&config);
    if let Some(ref cache_path) = config.fitness_cache_path {
        if Path::new(cache_path).exists() {
            match evaluator.load_cache(cache_path) {
                Ok(entries) => info!("reusing {} cached fitness entries", entries),
                Err(e) => warn!("could not load fitness cache {}: {}", cache_path, e)
            }
        }
    }

    let mut rng = XorShiftRng::seed_from_u64(config.random_seed);

    let baselines = vec![baseline];
    let best = evolve::run(&baselines, &config, &evaluator, &mut rng);

    if let Some(ref cache_path) = config.fitness_cache_path {
        if let Err(e) = evaluator.save_cache(cache_path) {
            warn!("could not save fitness cache {}: {}", cache_path, e);
        }
    }

    let best_asm = Path::new(&config.output_dir).join("best.s");
    best.write(&best_asm)
        .expect(&format!("Could not write to {}.", best_asm.display()));

    println!(
        "\nbest fitness: {:.2} after {} evaluations; variant saved as {}",
        best.fitness.unwrap_or(0.0),
        evaluator.fitness_count(),
        best_asm.display()
    );
}
