//
// mender - genetic repair of assembly programs
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Module: execution trace preprocessing.
//

use error::Error;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// 1-D Gaussian kernel used to smear each sampled instruction index
/// onto its neighbors.
const KERNEL: [(isize, f64); 7] = [
    (-3, 0.006),
    (-2, 0.061),
    (-1, 0.242),
    ( 0, 0.383),
    ( 1, 0.242),
    ( 2, 0.061),
    ( 3, 0.006)
];

///
/// Reads an execution trace: one decimal instruction index per line.
/// Blank lines are skipped.
///
pub fn read_trace<P: AsRef<Path>>(path: P) -> Result<Vec<usize>, Error> {
    let contents = fs::read_to_string(path)?;
    let mut indices = vec![];
    for (num, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match trimmed.parse::<usize>() {
            Ok(index) => indices.push(index),
            Err(e) => return Err(Error::Trace{ line: num + 1, reason: e.to_string() })
        }
    }
    Ok(indices)
}

/// Occurrence count per instruction index, sized to cover both the
/// program and the largest sampled index.
fn histogram(indices: &[usize], program_len: usize) -> Vec<f64> {
    let size = std::cmp::max(
        program_len,
        indices.iter().cloned().max().map(|m| m + 1).unwrap_or(0)
    );
    let mut hist = vec![0.0; size];
    for &index in indices {
        hist[index] += 1.0;
    }
    hist
}

///
/// Turns a trace into a weight map: histogram, Gaussian smoothing,
/// then `log(1 + v)` compression of each value.
///
pub fn smoothed_weights(indices: &[usize], program_len: usize) -> Vec<f64> {
    let hist = histogram(indices, program_len);
    let mut smoothed = vec![0.0; hist.len()];
    for i in 0..hist.len() {
        for &(offset, weight) in KERNEL.iter() {
            let j = i as isize - offset;
            if j >= 0 && (j as usize) < hist.len() {
                smoothed[i] += weight * hist[j as usize];
            }
        }
    }
    smoothed.iter().map(|v| v.ln_1p()).collect()
}

/// The difference path: the good trace with every index present in the
/// bad trace removed.
pub fn difference(good: &[usize], bad: &[usize]) -> Vec<usize> {
    let bad_indices: HashSet<usize> = bad.iter().cloned().collect();
    good.iter().cloned().filter(|i| !bad_indices.contains(i)).collect()
}
