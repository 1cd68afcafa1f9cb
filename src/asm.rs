//
// mender - genetic repair of assembly programs
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Module: assembly individual model.
//

use crc32fast;
use error::Error;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Fitness of an individual; higher values are better.
pub type Fitness = f64;

/// One source line of an assembly program.
///
/// Lines of the form `\t<field1>\t<field2>` (the assembler's
/// mnemonic/operand layout) are kept structured; everything else
/// (labels, directives, comments) is kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Line {
    Raw(String),
    Tabbed(String, String)
}

impl Line {
    /// Parses a single source line; the inverse of `render`.
    pub fn parse(line: &str) -> Line {
        if line.starts_with('\t') {
            let rest = &line[1..];
            if let Some(pos) = rest.find('\t') {
                return Line::Tabbed(rest[..pos].to_string(), rest[pos + 1..].to_string());
            }
        }
        Line::Raw(line.to_string())
    }

    /// Renders the line exactly as it appeared in the source file.
    pub fn render(&self) -> String {
        match *self {
            Line::Raw(ref s) => s.clone(),
            Line::Tabbed(ref mnemonic, ref operands) => format!("\t{}\t{}", mnemonic, operands)
        }
    }
}

/// Selects which of the two per-instruction weights an operation reads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WeightKey {
    /// Likelihood mass for being copied from (append source).
    Good,
    /// Likelihood mass for being edited at (delete/append/swap/crossover).
    Bad
}

/// An atom of an assembly program, annotated with trace-derived weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub line: Line,
    pub good_weight: Option<f64>,
    pub bad_weight: Option<f64>
}

impl Instruction {
    pub fn new(line: Line) -> Instruction {
        Instruction{ line, good_weight: None, bad_weight: None }
    }

    /// Returns the requested weight; a missing weight behaves as 0.
    pub fn weight(&self, key: WeightKey) -> f64 {
        let w = match key {
            WeightKey::Good => self.good_weight,
            WeightKey::Bad => self.bad_weight
        };
        w.unwrap_or(0.0)
    }
}

/// One event in an individual's lineage trace.
///
/// Carried through reproduction for audit; never influences selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Op {
    Delete,
    Append,
    Swap,
    Crossover(Vec<Op>, Vec<Op>)
}

/// Compilation state of an individual.
#[derive(Clone, Debug, PartialEq)]
pub enum Compiled {
    /// Not yet compiled, or the compile failed.
    None,
    /// Compiled successfully; the path of the binary.
    Binary(std::path::PathBuf),
    /// Fitness was served from the cache; no binary exists.
    Cached
}

impl Default for Compiled {
    fn default() -> Compiled { Compiled::None }
}

/// One candidate assembly program with its bookkeeping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Individual {
    /// The ordered instruction sequence; ordering is semantically
    /// meaningful and duplicates are allowed.
    pub representation: Vec<Instruction>,
    #[serde(skip)]
    pub compile: Compiled,
    pub fitness: Option<Fitness>,
    /// Value of the global evaluation counter when this individual was
    /// scored; a provenance number, not a fitness contribution.
    pub trials: usize,
    pub operations: Vec<Op>
}

impl Individual {
    pub fn new(representation: Vec<Instruction>) -> Individual {
        Individual{
            representation,
            compile: Compiled::None,
            fitness: None,
            trials: 0,
            operations: vec![]
        }
    }

    /// Reads an assembly source file into an individual.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Individual, Error> {
        let contents = fs::read_to_string(path)?;
        Ok(Individual::new(
            contents.lines().map(|l| Instruction::new(Line::parse(l))).collect()
        ))
    }

    /// Renders the representation back into assembly source.
    ///
    /// Unmodified lines round-trip byte-identically; the output always
    /// ends with a newline.
    pub fn to_source(&self) -> String {
        let mut output = String::new();
        for instr in &self.representation {
            output += &instr.line.render();
            output.push('\n');
        }
        output
    }

    /// Writes the representation as assembly source.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        fs::write(path, self.to_source())?;
        Ok(())
    }

    ///
    /// Applies a trace-derived weight map to the representation.
    ///
    /// `map[i]` becomes the `key` weight of instruction `i`; indices
    /// beyond the representation are silently ignored.
    ///
    pub fn apply_path(&mut self, key: WeightKey, map: &[f64]) {
        for (instr, &w) in self.representation.iter_mut().zip(map.iter()) {
            match key {
                WeightKey::Good => instr.good_weight = Some(w),
                WeightKey::Bad => instr.bad_weight = Some(w)
            }
        }
    }
}

///
/// Structural hash of a representation; the fitness cache key.
///
/// Depends solely on line content (not on lineage or weights) and is
/// stable across processes, so a persisted cache stays valid.
///
pub fn representation_hash(representation: &[Instruction]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for instr in representation {
        match instr.line {
            Line::Raw(ref s) => {
                hasher.update(b"r\0");
                hasher.update(s.as_bytes());
            },
            Line::Tabbed(ref mnemonic, ref operands) => {
                hasher.update(b"t\0");
                hasher.update(mnemonic.as_bytes());
                hasher.update(b"\t");
                hasher.update(operands.as_bytes());
            }
        }
        hasher.update(b"\n");
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(s: &str) -> Instruction {
        Instruction::new(Line::Raw(s.to_string()))
    }

    #[test]
    fn tabbed_lines_parse_into_pairs() {
        assert_eq!(
            Line::parse("\tmovl\t%eax, %ebx"),
            Line::Tabbed("movl".to_string(), "%eax, %ebx".to_string())
        );
        assert_eq!(Line::parse("main:"), Line::Raw("main:".to_string()));
        // a single leading tab without a second field stays verbatim
        assert_eq!(Line::parse("\tret"), Line::Raw("\tret".to_string()));
    }

    #[test]
    fn source_round_trip_is_byte_identical() {
        let source = "\t.text\n\
                      main:\n\
                      \tmovl\t$1, %eax\n\
                      # a comment\n\
                      \tret\t\n";
        let ind = Individual::new(
            source.lines().map(|l| Instruction::new(Line::parse(l))).collect()
        );
        assert_eq!(ind.to_source(), source);
    }

    #[test]
    fn apply_path_ignores_out_of_range_indices() {
        let mut ind = Individual::new(vec![raw("a"), raw("b")]);
        ind.apply_path(WeightKey::Bad, &[0.5, 1.5, 9.0, 9.0]);
        assert_eq!(ind.representation[0].bad_weight, Some(0.5));
        assert_eq!(ind.representation[1].bad_weight, Some(1.5));
        assert_eq!(ind.representation[0].good_weight, None);
    }

    #[test]
    fn hash_depends_on_lines_only() {
        let a = vec![raw("x"), raw("y")];
        let mut b = a.clone();
        b[0].bad_weight = Some(7.0);
        assert_eq!(representation_hash(&a), representation_hash(&b));

        let c = vec![raw("y"), raw("x")];
        assert_ne!(representation_hash(&a), representation_hash(&c));
    }

    #[test]
    fn hash_distinguishes_raw_from_tabbed() {
        let raw_form = vec![raw("\ta\tb")];
        let tabbed = vec![Instruction::new(Line::Tabbed("a".to_string(), "b".to_string()))];
        assert_ne!(representation_hash(&raw_form), representation_hash(&tabbed));
    }
}
