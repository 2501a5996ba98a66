use crate::error::ShapeError;
use crate::linear_algebra::{Tensor, Value};

pub fn linear_forward(inputs: &Tensor, weights: &Tensor) -> Result<Tensor, ShapeError> {
    inputs.matmul(weights)
}

pub fn linear_weight_gradients(
    inputs: &Tensor,
    output_gradients: &Tensor,
) -> Result<Tensor, ShapeError> {
    inputs.transpose().matmul(output_gradients)
}

pub fn linear_input_gradients(
    weights: &Tensor,
    output_gradients: &Tensor,
) -> Result<Tensor, ShapeError> {
    output_gradients.matmul(&weights.transpose())
}

/// Adds the single bias row to every row of `inputs`.
pub fn bias_forward(inputs: &Tensor, biases: &Tensor) -> Result<Tensor, ShapeError> {
    if biases.rows() != 1 || biases.cols() != inputs.cols() {
        return Err(ShapeError::Mismatch {
            op: "add_bias",
            left: inputs.shape(),
            right: biases.shape(),
        });
    }

    let mut outputs = inputs.clone();
    for row in outputs.iter_mut() {
        row.iter_mut()
            .zip(biases.values())
            .for_each(|(x, &b)| *x += b);
    }
    Ok(outputs)
}

pub fn bias_backward(output_gradients: &Tensor) -> Tensor {
    output_gradients.sum_rows()
}

/// Scores each input row against the single weight row, producing one column.
pub fn dot_product_forward(inputs: &Tensor, weights: &Tensor) -> Result<Tensor, ShapeError> {
    if weights.rows() != 1 {
        return Err(ShapeError::Mismatch {
            op: "dot_product",
            left: inputs.shape(),
            right: weights.shape(),
        });
    }

    inputs.matmul(&weights.transpose())
}

pub fn dot_product_weight_gradients(
    inputs: &Tensor,
    output_gradients: &Tensor,
) -> Result<Tensor, ShapeError> {
    output_gradients.transpose().matmul(inputs)
}

pub fn dot_product_input_gradients(
    weights: &Tensor,
    output_gradients: &Tensor,
) -> Result<Tensor, ShapeError> {
    output_gradients.matmul(weights)
}

pub fn activation_forward(inputs: &Tensor, activation: impl Fn(Value) -> Value) -> Tensor {
    inputs.map(activation)
}

pub fn activation_backward(
    inputs: &Tensor,
    output_gradients: &Tensor,
    activation_prime: impl Fn(Value) -> Value,
) -> Result<Tensor, ShapeError> {
    output_gradients.zip_map(inputs, "activation_backward", |g, x| {
        g * activation_prime(x)
    })
}
