//
// mender - genetic repair of assembly programs
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Module: genetic operators.
//

use asm::{Compiled, Individual, Instruction, Op, WeightKey};
use rand::prelude::*;
use rand_xorshift::XorShiftRng;
use serde::{Deserialize, Serialize};
use utils;

/// How `section_length` sizes the edited section.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SectionMode {
    /// Always a single line.
    Single,
    /// Exactly this many lines (clamped to what is available).
    Exact(usize),
    /// 1 + a random length bounded by `max_section_size`.
    Random
}

/// Crossover variant used by the evolutionary loop.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossoverKind {
    Normal,
    Sticky,
    Homologous
}

/// Number of consecutive instructions an operator edits, never more
/// than `available`.
pub fn section_length(mode: SectionMode, available: usize, max_section_size: usize, rng: &mut XorShiftRng) -> usize {
    if available == 0 {
        return 0;
    }
    match mode {
        SectionMode::Single => 1,
        SectionMode::Exact(k) => std::cmp::min(k, available),
        SectionMode::Random => {
            let bound = std::cmp::min(max_section_size, available);
            if bound == 0 { 1 } else { 1 + rng.gen_range(0, bound) }
        }
    }
}

/// First `n` elements of `seq`; all of it when `n` overshoots.
fn head(seq: &[Instruction], n: usize) -> &[Instruction] {
    &seq[..std::cmp::min(n, seq.len())]
}

/// Elements of `seq` from `n` on; empty when `n` overshoots.
fn tail(seq: &[Instruction], n: usize) -> &[Instruction] {
    if n >= seq.len() { &[] } else { &seq[n..] }
}

fn mutation_child(parent: &Individual, representation: Vec<Instruction>, op: Op) -> Individual {
    let mut operations = Vec::with_capacity(parent.operations.len() + 1);
    operations.push(op);
    operations.extend(parent.operations.iter().cloned());
    Individual{
        representation,
        compile: Compiled::None,
        fitness: None,
        trials: parent.trials,
        operations
    }
}

fn crossover_child(mother: &Individual, father: &Individual, representation: Vec<Instruction>) -> Individual {
    Individual{
        representation,
        compile: Compiled::None,
        fitness: None,
        trials: std::cmp::max(mother.trials, father.trials),
        operations: vec![Op::Crossover(mother.operations.clone(), father.operations.clone())]
    }
}

/// Removes a weighted-chosen section.
pub fn delete(parent: &Individual, mode: SectionMode, max_section_size: usize, rng: &mut XorShiftRng) -> Individual {
    let rep = &parent.representation;
    if rep.is_empty() {
        return mutation_child(parent, vec![], Op::Delete);
    }

    let start = utils::weighted_place(rep, WeightKey::Bad, rng);
    let length = section_length(mode, rep.len() - start, max_section_size, rng);

    let mut child = Vec::with_capacity(rep.len() - length);
    child.extend_from_slice(&rep[..start]);
    child.extend_from_slice(&rep[start + length ..]);
    mutation_child(parent, child, Op::Delete)
}

///
/// Copies a section from a good-weighted source position and inserts
/// it after a bad-weighted destination position. The source section is
/// intentionally not removed.
///
pub fn append(parent: &Individual, mode: SectionMode, max_section_size: usize, rng: &mut XorShiftRng) -> Individual {
    let rep = &parent.representation;
    if rep.is_empty() {
        return mutation_child(parent, vec![], Op::Append);
    }

    let src = utils::weighted_place(rep, WeightKey::Good, rng);
    let dst = utils::weighted_place(rep, WeightKey::Bad, rng);
    let length = section_length(mode, rep.len() - src, max_section_size, rng);

    let mut child = Vec::with_capacity(rep.len() + length);
    child.extend_from_slice(&rep[..dst + 1]);
    child.extend_from_slice(&rep[src .. src + length]);
    child.extend_from_slice(&rep[dst + 1 ..]);
    mutation_child(parent, child, Op::Append)
}

///
/// Exchanges two weighted-chosen sections; the gap between them is
/// preserved. Equal picks leave the representation unchanged.
///
pub fn swap(parent: &Individual, mode: SectionMode, max_section_size: usize, rng: &mut XorShiftRng) -> Individual {
    let rep = &parent.representation;
    if rep.is_empty() {
        return mutation_child(parent, vec![], Op::Swap);
    }

    let p1 = utils::weighted_place(rep, WeightKey::Bad, rng);
    let p2 = utils::weighted_place(rep, WeightKey::Bad, rng);
    if p1 == p2 {
        return mutation_child(parent, rep.clone(), Op::Swap);
    }

    let left = std::cmp::min(p1, p2);
    let right = std::cmp::max(p1, p2);
    let left_length = section_length(mode, right - left, max_section_size, rng);
    let right_length = section_length(mode, rep.len() - right, max_section_size, rng);

    let mut child = Vec::with_capacity(rep.len());
    child.extend_from_slice(&rep[..left]);
    child.extend_from_slice(&rep[right .. right + right_length]);
    child.extend_from_slice(&rep[left + left_length .. right]);
    child.extend_from_slice(&rep[left .. left + left_length]);
    child.extend_from_slice(&rep[right + right_length ..]);
    mutation_child(parent, child, Op::Swap)
}

/// Applies one of delete/append/swap, chosen uniformly at random.
pub fn mutate(parent: &Individual, max_section_size: usize, rng: &mut XorShiftRng) -> Individual {
    match rng.gen_range(0, 3) {
        0 => delete(parent, SectionMode::Random, max_section_size, rng),
        1 => append(parent, SectionMode::Random, max_section_size, rng),
        _ => swap(parent, SectionMode::Random, max_section_size, rng)
    }
}

///
/// Single-midpoint crossover: both parents are split at the same
/// weighted position of the mother, and the secondary splits inside
/// each half are shared between the parents.
///
pub fn crossover_sticky(mother: &Individual, father: &Individual, rng: &mut XorShiftRng) -> Individual {
    if mother.representation.is_empty() {
        return crossover_child(mother, father, father.representation.clone());
    }
    if father.representation.is_empty() {
        return crossover_child(mother, father, mother.representation.clone());
    }

    let midpoint = utils::weighted_place(&mother.representation, WeightKey::Bad, rng);
    let (mother_l, mother_r) = mother.representation.split_at(midpoint);
    let (father_l, father_r) = father.representation
        .split_at(std::cmp::min(midpoint, father.representation.len()));

    let m_l = utils::weighted_place(mother_l, WeightKey::Bad, rng);
    let m_r = utils::weighted_place(mother_r, WeightKey::Bad, rng);

    let mut rep = Vec::with_capacity(mother.representation.len());
    rep.extend_from_slice(head(mother_l, m_l));
    rep.extend_from_slice(tail(father_l, m_l));
    rep.extend_from_slice(head(father_r, m_r));
    rep.extend_from_slice(tail(mother_r, m_r));
    crossover_child(mother, father, rep)
}

///
/// Two-point crossover with midpoints and secondary splits picked
/// independently in mother and father.
///
pub fn crossover_normal(mother: &Individual, father: &Individual, rng: &mut XorShiftRng) -> Individual {
    if mother.representation.is_empty() {
        return crossover_child(mother, father, father.representation.clone());
    }
    if father.representation.is_empty() {
        return crossover_child(mother, father, mother.representation.clone());
    }

    let m_m = utils::weighted_place(&mother.representation, WeightKey::Bad, rng);
    let m_f = utils::weighted_place(&father.representation, WeightKey::Bad, rng);
    let (mother_l, mother_r) = mother.representation.split_at(m_m);
    let (father_l, father_r) = father.representation.split_at(m_f);

    let m_ml = utils::weighted_place(mother_l, WeightKey::Bad, rng);
    let m_mr = utils::weighted_place(mother_r, WeightKey::Bad, rng);
    let m_fl = utils::weighted_place(father_l, WeightKey::Bad, rng);
    let m_fr = utils::weighted_place(father_r, WeightKey::Bad, rng);

    let mut rep = Vec::with_capacity(mother.representation.len());
    rep.extend_from_slice(head(mother_l, m_ml));
    rep.extend_from_slice(tail(father_l, m_fl));
    rep.extend_from_slice(head(father_r, m_fr));
    rep.extend_from_slice(tail(mother_r, m_mr));
    crossover_child(mother, father, rep)
}

///
/// Similarity-biased crossover. Cut points in the father are not
/// random: exemplar windows are taken around the mother's secondary
/// splits and the father is cut where `homologous_place` finds the
/// closest-matching windows. The right exemplar is windowed from the
/// mother's left half, matching the behavior of the reference
/// implementation.
///
pub fn crossover_homologous(
    mother: &Individual,
    father: &Individual,
    neighborhood: usize,
    rng: &mut XorShiftRng
) -> Individual {
    if mother.representation.is_empty() {
        return crossover_child(mother, father, father.representation.clone());
    }
    if father.representation.is_empty() {
        return crossover_child(mother, father, mother.representation.clone());
    }

    let m_m = utils::weighted_place(&mother.representation, WeightKey::Bad, rng);
    let (mother_l, mother_r) = mother.representation.split_at(m_m);
    let m_ml = utils::weighted_place(mother_l, WeightKey::Bad, rng);
    let m_mr = utils::weighted_place(mother_r, WeightKey::Bad, rng);

    let exemplar_l = utils::points_around(mother_l, m_ml, neighborhood);
    let exemplar_r = utils::points_around(mother_l, m_mr, neighborhood);

    // The matched position only locates the junction; the father
    // contributes the remainder window, which reaches back half an
    // exemplar before the junction so a second match can be found.
    let junction = utils::homologous_place(&father.representation, exemplar_l, rng);
    let reach_back = exemplar_r.len().saturating_sub(1) / 2;
    let remainder = tail(&father.representation, junction.saturating_sub(reach_back));
    let m_fr = if remainder.is_empty() {
        0
    } else {
        utils::homologous_place(remainder, exemplar_r, rng)
    };

    let mut rep = Vec::with_capacity(mother.representation.len());
    rep.extend_from_slice(head(mother_l, m_ml));
    rep.extend_from_slice(head(remainder, m_fr));
    rep.extend_from_slice(tail(mother_r, m_mr));
    crossover_child(mother, father, rep)
}

/// Dispatches to the configured crossover variant.
pub fn crossover(
    kind: CrossoverKind,
    mother: &Individual,
    father: &Individual,
    neighborhood: usize,
    rng: &mut XorShiftRng
) -> Individual {
    match kind {
        CrossoverKind::Normal => crossover_normal(mother, father, rng),
        CrossoverKind::Sticky => crossover_sticky(mother, father, rng),
        CrossoverKind::Homologous => crossover_homologous(mother, father, neighborhood, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asm::Line;

    fn rng(seed: u64) -> XorShiftRng {
        XorShiftRng::seed_from_u64(seed)
    }

    fn raw(s: &str) -> Instruction {
        Instruction::new(Line::Raw(s.to_string()))
    }

    /// Individual whose i-th instruction carries the i-th weights.
    fn individual(lines: &[&str], good: &[f64], bad: &[f64]) -> Individual {
        let rep = lines.iter().enumerate().map(|(i, s)| {
            let mut instr = raw(s);
            if i < good.len() { instr.good_weight = Some(good[i]); }
            if i < bad.len() { instr.bad_weight = Some(bad[i]); }
            instr
        }).collect();
        Individual::new(rep)
    }

    fn lines_of(ind: &Individual) -> Vec<String> {
        ind.representation.iter().map(|i| i.line.render()).collect()
    }

    /// Every child instruction must come from one of the parents.
    fn assert_alphabet_preserved(child: &Individual, parents: &[&Individual]) {
        for instr in &child.representation {
            assert!(
                parents.iter().any(
                    |p| p.representation.iter().any(|pi| pi.line == instr.line)
                ),
                "instruction {:?} not present in any parent", instr.line
            );
        }
    }

    #[test]
    fn delete_removes_the_weighted_line() {
        let parent = individual(&["a", "b", "c", "d"], &[], &[0.0, 0.0, 1.0, 0.0]);
        let child = delete(&parent, SectionMode::Single, 1, &mut rng(1));
        assert_eq!(lines_of(&child), ["a", "b", "d"]);
        assert_eq!(child.operations[0], Op::Delete);
        assert_eq!(child.fitness, None);
        assert_eq!(child.compile, Compiled::None);
    }

    #[test]
    fn delete_section_is_clamped_to_the_end() {
        let parent = individual(&["a", "b", "c", "d"], &[], &[0.0, 0.0, 1.0, 0.0]);
        let child = delete(&parent, SectionMode::Exact(10), 1, &mut rng(1));
        assert_eq!(lines_of(&child), ["a", "b"]);
    }

    #[test]
    fn append_duplicates_the_good_line_after_the_bad_one() {
        let parent = individual(&["a", "b", "c"], &[1.0, 0.0, 0.0], &[0.0, 0.0, 1.0]);
        let child = append(&parent, SectionMode::Single, 1, &mut rng(1));
        assert_eq!(lines_of(&child), ["a", "b", "c", "a"]);
        assert_eq!(child.operations[0], Op::Append);
        assert_eq!(parent.representation.len(), 3);
    }

    #[test]
    fn append_with_coincident_positions_grows_by_one() {
        let parent = individual(&["a", "b", "c"], &[0.0, 1.0, 0.0], &[0.0, 1.0, 0.0]);
        let child = append(&parent, SectionMode::Single, 1, &mut rng(1));
        assert_eq!(lines_of(&child), ["a", "b", "b", "c"]);
    }

    #[test]
    fn swap_with_equal_picks_is_the_identity() {
        let parent = individual(&["a", "b", "c"], &[], &[0.0, 1.0, 0.0]);
        let child = swap(&parent, SectionMode::Single, 1, &mut rng(1));
        assert_eq!(lines_of(&child), lines_of(&parent));
        assert_eq!(child.operations[0], Op::Swap);
    }

    #[test]
    fn swap_preserves_length_and_alphabet() {
        for seed in 0..10 {
            let parent = individual(&["a", "b", "c", "d", "e"], &[], &[]);
            let child = swap(&parent, SectionMode::Random, 2, &mut rng(seed));
            assert_eq!(child.representation.len(), parent.representation.len());
            assert_alphabet_preserved(&child, &[&parent]);
        }
    }

    #[test]
    fn mutate_resets_evaluation_state() {
        for seed in 0..10 {
            let mut parent = individual(&["a", "b", "c", "d"], &[], &[]);
            parent.fitness = Some(5.0);
            parent.trials = 9;
            let child = mutate(&parent, 1, &mut rng(seed));
            assert_eq!(child.fitness, None);
            assert_eq!(child.compile, Compiled::None);
            assert_eq!(child.trials, 9);
            assert_eq!(child.operations.len(), 1);
            assert_alphabet_preserved(&child, &[&parent]);
        }
    }

    #[test]
    fn sticky_crossover_with_empty_parent_returns_the_other() {
        let mother = individual(&[], &[], &[]);
        let father = individual(&["x", "y"], &[], &[]);
        let child = crossover_sticky(&mother, &father, &mut rng(1));
        assert_eq!(lines_of(&child), ["x", "y"]);
        let child = crossover_sticky(&father, &mother, &mut rng(1));
        assert_eq!(lines_of(&child), ["x", "y"]);
    }

    #[test]
    fn sticky_crossover_at_position_zero_returns_the_mother() {
        let mother = individual(&["a", "b", "c"], &[], &[1.0, 0.0, 0.0]);
        let father = individual(&["x", "y", "z"], &[], &[1.0, 0.0, 0.0]);
        let child = crossover_sticky(&mother, &father, &mut rng(1));
        assert_eq!(lines_of(&child), ["a", "b", "c"]);
    }

    #[test]
    fn normal_crossover_draws_only_from_the_parents() {
        for seed in 0..10 {
            let mother = individual(&["a", "b", "c", "d"], &[], &[]);
            let father = individual(&["w", "x", "y", "z"], &[], &[]);
            let child = crossover_normal(&mother, &father, &mut rng(seed));
            assert_alphabet_preserved(&child, &[&mother, &father]);
            assert_eq!(child.fitness, None);
            assert_eq!(child.compile, Compiled::None);
        }
    }

    #[test]
    fn crossover_records_both_lineages_and_takes_max_trials() {
        let mut mother = individual(&["a", "b"], &[], &[]);
        let mut father = individual(&["x", "y"], &[], &[]);
        mother.trials = 3;
        mother.operations = vec![Op::Delete];
        father.trials = 5;
        father.operations = vec![Op::Swap];
        let child = crossover_normal(&mother, &father, &mut rng(1));
        assert_eq!(child.trials, 5);
        assert_eq!(
            child.operations,
            vec![Op::Crossover(vec![Op::Delete], vec![Op::Swap])]
        );
    }

    #[test]
    fn homologous_crossover_draws_only_from_the_parents() {
        for seed in 0..10 {
            let mother = individual(&["a", "b", "c", "d", "e", "f"], &[], &[]);
            let father = individual(&["a", "b", "q", "d", "e", "f"], &[], &[]);
            let child = crossover_homologous(&mother, &father, 4, &mut rng(seed));
            assert_alphabet_preserved(&child, &[&mother, &father]);
        }
    }

    #[test]
    fn homologous_crossover_with_empty_parent_returns_the_other() {
        let mother = individual(&["a"], &[], &[]);
        let empty = individual(&[], &[], &[]);
        let child = crossover_homologous(&mother, &empty, 4, &mut rng(1));
        assert_eq!(lines_of(&child), ["a"]);
    }

    #[test]
    fn section_length_modes() {
        let mut rng = rng(1);
        assert_eq!(section_length(SectionMode::Single, 10, 5, &mut rng), 1);
        assert_eq!(section_length(SectionMode::Exact(3), 10, 5, &mut rng), 3);
        assert_eq!(section_length(SectionMode::Exact(30), 10, 5, &mut rng), 10);
        assert_eq!(section_length(SectionMode::Random, 10, 1, &mut rng), 1);
        for _ in 0..20 {
            let l = section_length(SectionMode::Random, 10, 4, &mut rng);
            assert!(l >= 1 && l <= 4);
        }
        assert_eq!(section_length(SectionMode::Single, 0, 5, &mut rng), 0);
    }
}
