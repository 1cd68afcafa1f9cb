//
// mender - genetic repair of assembly programs
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Module: evolutionary loop.
//

use asm::{Fitness, Individual};
use config::Config;
use error::Error;
use eval::Evaluator;
use operators;
use rand::prelude::*;
use rand_xorshift::XorShiftRng;
use serde_json;
use std::fs;
use std::path::Path;
use utils;

fn fitness_of(individual: &Individual) -> Fitness {
    individual.fitness.unwrap_or(0.0)
}

/// The fittest member of a non-empty population.
pub fn best_of(population: &[Individual]) -> &Individual {
    let mut best = &population[0];
    for individual in population {
        if fitness_of(individual) > fitness_of(best) {
            best = individual;
        }
    }
    best
}

fn mean_fitness(population: &[Individual]) -> f64 {
    if population.is_empty() {
        return 0.0;
    }
    population.iter().map(fitness_of).sum::<f64>() / population.len() as f64
}

///
/// Tournament selection: each of the `n` survivors is the fittest of
/// `tournament_size` individuals sampled with replacement.
///
pub fn tournament(
    population: &[Individual],
    n: usize,
    tournament_size: usize,
    rng: &mut XorShiftRng
) -> Vec<Individual> {
    if population.is_empty() {
        return vec![];
    }

    (0..n).map(|_| {
        let mut best = &population[utils::place(population, rng)];
        for _ in 1..tournament_size {
            let contender = &population[utils::place(population, rng)];
            if fitness_of(contender) > fitness_of(best) {
                best = contender;
            }
        }
        (*best).clone()
    }).collect()
}

///
/// Stochastic universal sampling: one ruler with `n` equally spaced
/// marks walks the cumulative-fitness axis of the population sorted by
/// descending fitness, which keeps selection variance lower than
/// independent roulette spins. A population with no fitness mass is
/// sampled uniformly.
///
pub fn stochastic_universal_sampling(
    population: &[Individual],
    n: usize,
    rng: &mut XorShiftRng
) -> Vec<Individual> {
    if population.is_empty() || n == 0 {
        return vec![];
    }

    let mut sorted: Vec<&Individual> = population.iter().collect();
    sorted.sort_by(|a, b| fitness_of(b).partial_cmp(&fitness_of(a)).unwrap());

    let total: f64 = sorted.iter().map(|individual| fitness_of(individual)).sum();
    if total <= 0.0 {
        return (0..n)
            .map(|_| population[utils::place(population, rng)].clone())
            .collect();
    }

    let step = total / n as f64;
    let start = rng.gen::<f64>() * step;

    let mut survivors = Vec::with_capacity(n);
    let mut cumulative = 0.0;
    let mut index = 0;
    for mark_num in 0..n {
        let mark = start + mark_num as f64 * step;
        while index + 1 < sorted.len() && cumulative + fitness_of(sorted[index]) <= mark {
            cumulative += fitness_of(sorted[index]);
            index += 1;
        }
        survivors.push((*sorted[index]).clone());
    }
    survivors
}

/// Selects `n` survivors using the configured selection scheme.
pub fn select(
    population: &[Individual],
    n: usize,
    config: &Config,
    rng: &mut XorShiftRng
) -> Vec<Individual> {
    if config.use_tournament {
        tournament(population, n, config.tournament_size, rng)
    } else {
        stochastic_universal_sampling(population, n, rng)
    }
}

/// The baselines themselves plus mutated copies up to the population
/// size.
pub fn initial_population(
    baselines: &[Individual],
    population_size: usize,
    max_section_size: usize,
    rng: &mut XorShiftRng
) -> Vec<Individual> {
    let mut population: Vec<Individual> = baselines.to_vec();
    while population.len() < population_size {
        let parent = &baselines[utils::place(baselines, rng)];
        population.push(operators::mutate(parent, max_section_size, rng));
    }
    population
}

/// Writes an individual as self-describing JSON.
pub fn persist<P: AsRef<Path>>(individual: &Individual, path: P) -> Result<(), Error> {
    fs::write(path, serde_json::to_string_pretty(individual)?)?;
    Ok(())
}

/// Reloads a persisted individual.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Individual, Error> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

fn checkpoint(individual: &Individual, generation: usize, output_dir: &str) {
    let name = format!(
        "variant.gen.{}.best.{}.json",
        generation,
        fitness_of(individual)
    );
    let path = Path::new(output_dir).join(name);
    if let Err(e) = persist(individual, &path) {
        warn!("could not write checkpoint {}: {}", path.display(), e);
    }
}

///
/// Runs the evolution: breed, evaluate in parallel, select, until the
/// target fitness is reached or the generation budget is exhausted.
/// Returns the best individual observed; it is also persisted to
/// `<output_dir>/best.json`.
///
pub fn run(
    baselines: &[Individual],
    config: &Config,
    evaluator: &Evaluator,
    rng: &mut XorShiftRng
) -> Individual {
    let mut population = initial_population(
        baselines,
        config.population_size,
        config.max_section_size,
        rng
    );
    evaluator.evaluate_all(&mut population);
    let mut best = best_of(&population).clone();

    for generation in 0..config.max_generations {
        if fitness_of(&best) >= config.target_fitness {
            break;
        }

        let num_crossover =
            (config.crossover_rate * config.population_size as f64).round() as usize;
        let num_mutants =
            ((1.0 - config.crossover_rate) * config.population_size as f64).round() as usize;

        let mut children = Vec::with_capacity(num_crossover + num_mutants);
        for _ in 0..num_crossover {
            let parents = select(&population, 2, config, rng);
            children.push(operators::crossover(
                config.crossover_operator,
                &parents[0],
                &parents[1],
                config.point_neighborhood,
                rng
            ));
        }
        for survivor in select(&population, num_mutants, config, rng) {
            children.push(operators::mutate(&survivor, config.max_section_size, rng));
        }

        evaluator.evaluate_all(&mut children);

        let mut combined = children;
        combined.extend(population.into_iter());

        let generation_best = best_of(&combined).clone();
        if fitness_of(&generation_best) > fitness_of(&best) {
            best = generation_best.clone();
        }

        population = select(&combined, config.population_size, config, rng);

        println!(
            "generation {}: mean fitness {:.2}, best fitness {:.2}, best trials {}",
            generation,
            mean_fitness(&population),
            fitness_of(&generation_best),
            generation_best.trials
        );
        checkpoint(&generation_best, generation, &config.output_dir);
    }

    let best_path = Path::new(&config.output_dir).join("best.json");
    if let Err(e) = persist(&best, &best_path) {
        warn!("could not persist the best individual: {}", e);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use asm::{Instruction, Line};
    use tempfile;

    fn rng() -> XorShiftRng {
        XorShiftRng::seed_from_u64(11)
    }

    fn scored(line: &str, fitness: f64) -> Individual {
        let mut ind = Individual::new(vec![Instruction::new(Line::Raw(line.to_string()))]);
        ind.fitness = Some(fitness);
        ind
    }

    #[test]
    fn tournament_returns_the_requested_count() {
        let population = vec![scored("a", 1.0), scored("b", 2.0), scored("c", 3.0)];
        let survivors = tournament(&population, 7, 3, &mut rng());
        assert_eq!(survivors.len(), 7);
        for survivor in &survivors {
            assert!(population.iter().any(
                |p| p.representation == survivor.representation
            ));
        }
    }

    #[test]
    fn sus_returns_exactly_n_survivors() {
        let population = vec![
            scored("a", 4.0), scored("b", 3.0), scored("c", 2.0), scored("d", 1.0)
        ];
        assert_eq!(stochastic_universal_sampling(&population, 4, &mut rng()).len(), 4);
        assert_eq!(stochastic_universal_sampling(&population, 9, &mut rng()).len(), 9);
    }

    #[test]
    fn sus_gives_everything_to_the_only_fit_individual() {
        let population = vec![scored("winner", 10.0), scored("x", 0.0), scored("y", 0.0)];
        let survivors = stochastic_universal_sampling(&population, 3, &mut rng());
        for survivor in &survivors {
            assert_eq!(survivor.representation, population[0].representation);
        }
    }

    #[test]
    fn sus_handles_a_population_without_fitness_mass() {
        let population = vec![scored("a", 0.0), scored("b", 0.0)];
        let survivors = stochastic_universal_sampling(&population, 5, &mut rng());
        assert_eq!(survivors.len(), 5);
    }

    #[test]
    fn initial_population_keeps_the_baselines() {
        let baselines = vec![scored("base", 0.0)];
        let population = initial_population(&baselines, 6, 1, &mut rng());
        assert_eq!(population.len(), 6);
        assert_eq!(population[0].representation, baselines[0].representation);
        // the mutated copies carry a lineage entry
        for mutant in &population[1..] {
            assert_eq!(mutant.operations.len(), 1);
        }
    }

    #[test]
    fn best_of_finds_the_maximum() {
        let population = vec![scored("a", 1.0), scored("b", 9.0), scored("c", 3.0)];
        assert_eq!(best_of(&population).representation, population[1].representation);
    }

    #[test]
    fn individuals_round_trip_through_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut ind = scored("movl", 7.5);
        ind.trials = 42;
        let path = dir.path().join("ind.json");
        persist(&ind, &path).unwrap();
        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.representation, ind.representation);
        assert_eq!(reloaded.fitness, Some(7.5));
        assert_eq!(reloaded.trials, 42);
    }
}
