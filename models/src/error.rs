use std::error::Error as StdError;
use std::fmt;

use ann::{GraphError, ShapeError};

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    Shape(ShapeError),
    Graph(GraphError),
    EmptyDataset,
    InvalidBatchSize,
    /// Inputs and labels disagree on the number of samples.
    MismatchedRows { inputs: usize, labels: usize },
    NoValidationSet,
    /// A batch produced a NaN or infinite loss. No parameters were updated.
    NonFiniteLoss,
    InvalidConfig(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shape(error) => error.fmt(f),
            Self::Graph(error) => error.fmt(f),
            Self::EmptyDataset => write!(f, "dataset contains no samples"),
            Self::InvalidBatchSize => write!(f, "batch size must be at least 1"),
            Self::MismatchedRows { inputs, labels } => {
                write!(f, "{inputs} input rows but {labels} label rows")
            }
            Self::NoValidationSet => write!(f, "dataset has no validation split"),
            Self::NonFiniteLoss => write!(f, "training diverged to a non-finite loss"),
            Self::InvalidConfig(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Shape(error) => Some(error),
            Self::Graph(error) => Some(error),
            _ => None,
        }
    }
}

impl From<ShapeError> for Error {
    fn from(error: ShapeError) -> Self {
        Self::Shape(error)
    }
}

impl From<GraphError> for Error {
    fn from(error: GraphError) -> Self {
        match error {
            GraphError::Shape(error) => Self::Shape(error),
            error => Self::Graph(error),
        }
    }
}
