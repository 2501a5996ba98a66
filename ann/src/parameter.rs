use serde::{Deserialize, Serialize};

use crate::context::NumericContext;
use crate::error::ShapeError;
use crate::linear_algebra::{Shape, Tensor, Value};

/// A named, trainable tensor whose shape never changes after construction.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Parameter {
    name: String,
    value: Tensor,
}

impl Parameter {
    pub fn zeros(name: impl Into<String>, rows: usize, cols: usize) -> Self {
        Self::from_tensor(name, Tensor::zeros(rows, cols))
    }

    /// Glorot-uniform initialization: `[-limit, limit]` with `limit = sqrt(6 / (rows + cols))`.
    pub fn random(
        context: &mut NumericContext,
        name: impl Into<String>,
        rows: usize,
        cols: usize,
    ) -> Self {
        let limit = (6.0 / (rows + cols).max(1) as Value).sqrt();
        Self::from_tensor(name, context.uniform(rows, cols, limit))
    }

    pub fn from_tensor(name: impl Into<String>, value: Tensor) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Tensor {
        &self.value
    }

    pub fn shape(&self) -> Shape {
        self.value.shape()
    }

    /// `self += multiplier * direction`.
    pub fn update(&mut self, multiplier: Value, direction: &Tensor) -> Result<(), ShapeError> {
        self.value.scaled_add(multiplier, direction)
    }
}
