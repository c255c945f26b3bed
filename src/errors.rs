use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::equation::EquationError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse JSON configuration in {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unknown plant '{0}'")]
    UnknownPlant(String),
    #[error("Plant '{plant}' has no '{role}' path configured")]
    MissingRole { plant: String, role: String },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Expected artifact for role '{role}' is absent at {path}")]
    MissingArtifact { role: String, path: PathBuf },
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Frame operation failed: {0}")]
    Frame(#[from] polars::prelude::PolarsError),
    #[error("Clear-sky curve for {date} has no positive samples")]
    DegenerateClearSky { date: String },
    #[error("Artifact '{role}' is empty over the requested range")]
    EmptyArtifact { role: String },
    #[error("Timestamp grids of '{left}' and '{right}' do not align for day {date}")]
    GridMismatch {
        left: String,
        right: String,
        date: String,
    },
    #[error("Unavailability equation rejected: {0}")]
    Equation(#[from] EquationError),
    #[error("Invalid timestamp {0}")]
    InvalidTimestamp(i64),
}
