//
// mender - genetic repair of assembly programs
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Module: sequence utilities.
//

use asm::{Instruction, Line, WeightKey};
use rand::prelude::*;
use rand_xorshift::XorShiftRng;

///
/// Levenshtein distance between two sequences under a custom
/// substitution cost; insertions and deletions cost 1.
///
/// Memoized by a rolling 2-D dynamic programming table built per call,
/// keyed purely by element values.
///
fn edit_distance_by<T, F: Fn(&T, &T) -> usize>(s1: &[T], s2: &[T], cost: F) -> usize {
    let n = s2.len();
    let mut prev: Vec<usize> = (0..n + 1).collect();
    let mut curr: Vec<usize> = vec![0; n + 1];

    for (i, a) in s1.iter().enumerate() {
        curr[0] = i + 1;
        for (j, b) in s2.iter().enumerate() {
            let substitute = prev[j] + cost(a, b);
            let insert = curr[j] + 1;
            let delete = prev[j + 1] + 1;
            curr[j + 1] = std::cmp::min(substitute, std::cmp::min(insert, delete));
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Character-level edit distance between two strings.
pub fn str_edit_distance(s1: &str, s2: &str) -> usize {
    let c1: Vec<char> = s1.chars().collect();
    let c2: Vec<char> = s2.chars().collect();
    edit_distance_by(&c1, &c2, |a, b| if a == b { 0 } else { 1 })
}

///
/// Edit distance between two instruction sequences.
///
/// Two raw lines are compared by their character-level edit distance;
/// any other pair of lines costs 0 when equal, 1 otherwise. Weights are
/// annotations, not content, and do not participate.
///
pub fn edit_distance(s1: &[Instruction], s2: &[Instruction]) -> usize {
    edit_distance_by(s1, s2, |a, b| {
        match (&a.line, &b.line) {
            (&Line::Raw(ref x), &Line::Raw(ref y)) => str_edit_distance(x, y),
            (x, y) => if x == y { 0 } else { 1 }
        }
    })
}

/// Returns a uniformly random position in `seq` (0 when empty).
pub fn place<T>(seq: &[T], rng: &mut XorShiftRng) -> usize {
    if seq.is_empty() { return 0; }
    rng.gen_range(0, seq.len())
}

///
/// Returns a random position in `seq`, index `i` being chosen with
/// probability proportional to `ceil` of its `key` weight. Falls back
/// to a uniform choice when all weights are zero.
///
pub fn weighted_place(seq: &[Instruction], key: WeightKey, rng: &mut XorShiftRng) -> usize {
    if seq.is_empty() { return 0; }

    let mut cumulative: Vec<u64> = Vec::with_capacity(seq.len() + 1);
    cumulative.push(0);
    let mut total: u64 = 0;
    for instr in seq {
        let w = instr.weight(key);
        total += if w > 0.0 { w.ceil() as u64 } else { 0 };
        cumulative.push(total);
    }

    if total == 0 {
        return place(seq, rng);
    }

    let f = rng.gen_range(0, total);
    let mut loc = match cumulative.binary_search(&f) {
        Ok(x) => x,
        Err(x) => x - 1
    };
    // skip past zero-mass entries sharing the same cumulative value
    while cumulative[loc + 1] == cumulative[loc] {
        loc += 1;
    }
    loc
}

/// The instruction at `weighted_place`.
pub fn weighted_pick<'a>(seq: &'a [Instruction], key: WeightKey, rng: &mut XorShiftRng) -> &'a Instruction {
    &seq[weighted_place(seq, key, rng)]
}

///
/// Returns the odd-length subsequence of `seq` symmetric around
/// `center`, of radius at most `radius`, clamped to stay inside `seq`.
/// Empty when `center` is out of range.
///
pub fn points_around<T>(seq: &[T], center: usize, radius: usize) -> &[T] {
    if center >= seq.len() {
        return &[];
    }
    let r = std::cmp::min(radius, std::cmp::min(center, seq.len() - center - 1));
    &seq[center - r .. center + r + 1]
}

///
/// Returns a position in `haystack` whose surrounding window most
/// resembles `exemplar`.
///
/// Slides a window of the exemplar's length over the haystack, keeping
/// every index whose distance equals the running minimum at the moment
/// it was observed; a distance-0 window returns immediately. Ties at
/// the current best are kept so late improvements do not flush earlier
/// equally-good candidates. Falls back to `place` when no window fits.
///
pub fn homologous_place(haystack: &[Instruction], exemplar: &[Instruction], rng: &mut XorShiftRng) -> usize {
    let r = exemplar.len().saturating_sub(1) / 2;
    if haystack.len() < 2 * r + 1 {
        return place(haystack, rng);
    }

    let mut best = std::usize::MAX;
    let mut candidates: Vec<usize> = vec![];

    for center in r .. haystack.len() - r {
        let window = &haystack[center - r .. center + r + 1];
        let distance = edit_distance(window, exemplar);
        if distance == 0 {
            return center;
        }
        if distance <= best {
            best = distance;
            candidates.push(center);
        }
    }

    if candidates.is_empty() {
        place(haystack, rng)
    } else {
        candidates[rng.gen_range(0, candidates.len())]
    }
}
