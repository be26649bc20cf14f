//! Error taxonomy for the transform engine.
//!
//! - [`ConfigError`]: the request itself is wrong (unsupported method, missing
//!   parameter, unknown column). The stage is skipped and the table is untouched.
//! - [`StageError::Computation`]: the request is valid but the numbers do not
//!   allow it (zero variance, no observed values, singular system). The stage
//!   is rolled back and the pipeline moves on.
//!
//! "Nothing to do" is not an error; stages report it as
//! [`crate::stage::Notice`].
//!
//! Collaborators outside the engine (loader, CLI, tracking) use `anyhow`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::{classify::ColumnKind, stage::StageName};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Unsupported {stage} method '{name}'. Supported: {supported}")]
    UnsupportedMethod {
        stage: StageName,
        name: String,
        supported: String,
    },
    #[error("{stage} strategy '{strategy}' requires a fill value")]
    MissingFillValue {
        stage: StageName,
        strategy: String,
    },
    #[error("Invalid {parameter}: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },
    #[error("Column '{0}' not found")]
    UnknownColumn(String),
    #[error("Column '{0}' appears more than once")]
    DuplicateColumn(String),
    #[error("Column '{column}' has {found} row(s) but {expected} were expected")]
    RaggedColumns {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Column '{column}' is {kind} but {operation} needs {expected} columns")]
    KindMismatch {
        operation: &'static str,
        column: String,
        kind: ColumnKind,
        expected: &'static str,
    },
    #[error("Generated column '{0}' already exists")]
    NameCollision(String),
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("At least one column must be selected")]
    EmptySelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationFailure {
    ZeroVariance,
    NoObservedValues,
    SingularSystem,
}

impl fmt::Display for ComputationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ComputationFailure::ZeroVariance => "column has zero variance",
            ComputationFailure::NoObservedValues => "column has no observed values",
            ComputationFailure::SingularSystem => "regression system is singular",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{stage} failed on column '{column}': {failure}")]
    Computation {
        stage: StageName,
        column: String,
        failure: ComputationFailure,
    },
}

impl StageError {
    pub fn computation(stage: StageName, column: &str, failure: ComputationFailure) -> Self {
        StageError::Computation {
            stage,
            column: column.to_string(),
            failure,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, StageError::Config(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Cannot {action} while the pipeline is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}
