//
// mender - genetic repair of assembly programs
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Library: evolutionary repair of assembly source.
//

extern crate crc32fast;
#[macro_use]
extern crate log;
extern crate rand;
extern crate rand_xorshift;
extern crate rayon;
extern crate serde;
extern crate serde_json;
extern crate tempfile;
extern crate thiserror;
extern crate toml;
extern crate wait_timeout;

pub mod asm;
pub mod config;
pub mod error;
pub mod eval;
pub mod evolve;
pub mod operators;
pub mod trace;
pub mod utils;
