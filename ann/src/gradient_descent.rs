use serde::{Deserialize, Serialize};

use crate::error::{GraphError, ShapeError};
use crate::linear_algebra::{Tensor, Value};
use crate::parameter::Parameter;

pub trait GradientDescent {
    /// Moves each parameter along its gradient. `gradients[i]` belongs to `parameters[i]`.
    fn descend(
        &mut self,
        parameters: &mut [&mut Parameter],
        gradients: &[Tensor],
    ) -> Result<(), GraphError>;
}

/// `parameter -= rate * gradient`, with a fixed rate.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct SimpleGradientDescent {
    pub rate: Value,
}

impl SimpleGradientDescent {
    pub fn new(rate: Value) -> Self {
        Self { rate }
    }
}

impl GradientDescent for SimpleGradientDescent {
    fn descend(
        &mut self,
        parameters: &mut [&mut Parameter],
        gradients: &[Tensor],
    ) -> Result<(), GraphError> {
        if parameters.len() != gradients.len() {
            return Err(GraphError::GradientCount {
                parameters: parameters.len(),
                gradients: gradients.len(),
            });
        }

        // All shapes are checked before any parameter moves.
        for (parameter, gradient) in parameters.iter().zip(gradients) {
            if parameter.shape() != gradient.shape() {
                return Err(ShapeError::Mismatch {
                    op: "descend",
                    left: parameter.shape(),
                    right: gradient.shape(),
                }
                .into());
            }
        }

        for (parameter, gradient) in parameters.iter_mut().zip(gradients) {
            parameter.update(-self.rate, gradient)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_find_minimum() {
        // Derivative of x^2 - 2x + 1
        fn f_prime(x: f32) -> f32 {
            2.0 * x - 2.0
        }

        let mut w = Parameter::zeros("w", 1, 1);
        let mut simple = SimpleGradientDescent::new(0.01);

        for _ in 0..1000 {
            let gradient = w.value().map(f_prime);
            simple.descend(&mut [&mut w], &[gradient]).unwrap();
        }

        // Minimum is at 1.0.
        assert!((w.value().values()[0] - 1.0).abs() < 0.0001);
    }

    #[test]
    fn counts_must_match() {
        let mut a = Parameter::zeros("a", 1, 2);
        let mut b = Parameter::zeros("b", 1, 2);

        let result =
            SimpleGradientDescent::new(0.1).descend(&mut [&mut a, &mut b], &[Tensor::zeros(1, 2)]);

        assert_eq!(
            result,
            Err(GraphError::GradientCount {
                parameters: 2,
                gradients: 1
            })
        );
    }

    #[test]
    fn no_partial_updates() {
        let mut a = Parameter::zeros("a", 1, 2);
        let mut b = Parameter::zeros("b", 2, 2);

        let gradients = [Tensor::filled(1, 2, 1.0), Tensor::filled(1, 2, 1.0)];
        let result = SimpleGradientDescent::new(0.1).descend(&mut [&mut a, &mut b], &gradients);

        assert!(result.is_err());
        assert_eq!(a.value(), &Tensor::zeros(1, 2));
    }
}
