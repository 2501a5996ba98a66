use crate::error::ShapeError;
use crate::linear_algebra::{Tensor, Value};

/// Half the squared error, averaged over every element.
pub fn square_loss(outputs: &Tensor, labels: &Tensor) -> Result<Value, ShapeError> {
    let error = outputs.try_sub(labels)?;
    if error.is_empty() {
        return Err(ShapeError::Empty("square_loss"));
    }

    let sum = error.values().iter().map(|e| e * e).sum::<Value>();
    Ok(sum / 2.0 / error.len() as Value)
}

/// Derivative of [`square_loss`] with respect to `outputs`.
pub fn square_loss_prime(outputs: &Tensor, labels: &Tensor) -> Result<Tensor, ShapeError> {
    let error = outputs.try_sub(labels)?;
    let len = error.len().max(1) as Value;
    Ok(error / len)
}

/// Row-wise log-softmax, shifted by the row maximum.
pub fn log_softmax(logits: &Tensor) -> Tensor {
    let mut result = logits.clone();
    for row in result.iter_mut() {
        let max = row.iter().copied().fold(Value::NEG_INFINITY, Value::max);
        let log_sum = row.iter().map(|x| (x - max).exp()).sum::<Value>().ln();
        row.iter_mut().for_each(|x| *x = *x - max - log_sum);
    }
    result
}

pub fn softmax(logits: &Tensor) -> Tensor {
    log_softmax(logits).map(Value::exp)
}

/// Cross-entropy between `softmax(logits)` and the label rows, averaged over rows.
pub fn softmax_loss(logits: &Tensor, labels: &Tensor) -> Result<Value, ShapeError> {
    logits.expect_shape("softmax_loss", labels.shape())?;
    if logits.is_empty() {
        return Err(ShapeError::Empty("softmax_loss"));
    }

    let log_probabilities = log_softmax(logits);
    let cross_entropy = labels.try_mul(&log_probabilities)?.sum();

    Ok(-cross_entropy / logits.rows() as Value)
}

/// Derivative of [`softmax_loss`] with respect to `logits`.
///
/// Assumes each label row sums to one, as one-hot rows do.
pub fn softmax_loss_prime(logits: &Tensor, labels: &Tensor) -> Result<Tensor, ShapeError> {
    let rows = logits.rows().max(1) as Value;
    Ok(softmax(logits).try_sub(labels)? / rows)
}
