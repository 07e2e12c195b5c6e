// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::build::join_errors;
use crate::errors::BuildError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a graph document and turning it into an executor.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported configuration format '{extension}' (expected yaml, yml, json or toml)")]
    UnsupportedFormat { extension: String },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid executor option '{option}': {reason}")]
    InvalidOption { option: &'static str, reason: String },

    #[error("graph build failed: {}", join_errors(.errors))]
    Build { errors: Vec<BuildError> },
}

impl From<Vec<BuildError>> for ConfigError {
    fn from(errors: Vec<BuildError>) -> Self {
        ConfigError::Build { errors }
    }
}
