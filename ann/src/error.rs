use std::error::Error;
use std::fmt;

use crate::linear_algebra::Shape;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShapeError {
    /// The number of values does not fill the requested shape.
    Size { shape: Shape, values: usize },
    /// Two operands of `op` have incompatible shapes.
    Mismatch {
        op: &'static str,
        left: Shape,
        right: Shape,
    },
    NotScalar(Shape),
    OutOfBounds { rows: usize, start: usize, end: usize },
    Empty(&'static str),
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size { shape, values } => write!(
                f,
                "{values} values cannot fill a {}x{} tensor",
                shape[0], shape[1]
            ),
            Self::Mismatch { op, left, right } => write!(
                f,
                "incompatible shapes for {op}: {}x{} and {}x{}",
                left[0], left[1], right[0], right[1]
            ),
            Self::NotScalar(shape) => {
                write!(f, "expected a 1x1 tensor, found {}x{}", shape[0], shape[1])
            }
            Self::OutOfBounds { rows, start, end } => {
                write!(f, "row range {start}..{end} is outside a tensor of {rows} rows")
            }
            Self::Empty(what) => write!(f, "{what} requires a non-empty tensor"),
        }
    }
}

impl Error for ShapeError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphError {
    Shape(ShapeError),
    /// The node handle does not belong to this graph.
    UnknownNode(usize),
    /// Gradients were requested for a node that is not a parameter leaf.
    NotAParameter(usize),
    GradientCount { parameters: usize, gradients: usize },
    /// A forward pass received a different number of parameter nodes than it declares.
    ParameterCount { expected: usize, found: usize },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shape(error) => error.fmt(f),
            Self::UnknownNode(index) => write!(f, "node {index} is not part of this graph"),
            Self::NotAParameter(index) => write!(f, "node {index} is not a parameter"),
            Self::GradientCount {
                parameters,
                gradients,
            } => write!(
                f,
                "received {gradients} gradients for {parameters} parameters"
            ),
            Self::ParameterCount { expected, found } => {
                write!(f, "expected {expected} parameter nodes, found {found}")
            }
        }
    }
}

impl Error for GraphError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Shape(error) => Some(error),
            _ => None,
        }
    }
}

impl From<ShapeError> for GraphError {
    fn from(error: ShapeError) -> Self {
        Self::Shape(error)
    }
}
