//
// mender - genetic repair of assembly programs
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Module: error type.
//

use serde_json;
use thiserror::Error;
use toml;

/// Errors of the fallible surfaces: configuration, source/trace I/O
/// and persistence. Evaluation itself never fails; bad individuals
/// simply score 0.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("could not parse trace line {line}: {reason}")]
    Trace { line: usize, reason: String },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error)
}
