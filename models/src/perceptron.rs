use ann::linear_algebra::Tensor;
use ann::{Graph, NumericContext, Parameter};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, info, warn};

use crate::dataset::Dataset;
use crate::error::Error;
use crate::training::{EpochSummary, Outcome, TrainingReport};

/// A linear binary classifier over `1×dim` points, labels +1 and -1.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PerceptronModel {
    weights: Parameter,
}

impl PerceptronModel {
    pub fn new(context: &mut NumericContext, dim: usize) -> Self {
        Self::from_weights(Parameter::random(context, "weights", 1, dim))
    }

    pub fn from_weights(weights: Parameter) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &Parameter {
        &self.weights
    }

    /// The score of a single point: its dot product with the weights.
    pub fn run(&self, x: &Tensor) -> Result<f32, Error> {
        let mut graph = Graph::new();
        let weights = graph.parameter(&self.weights);
        let x = graph.input(x);
        let score = graph.dot_product(x, weights)?;

        Ok(graph.value(score)?.as_scalar()?)
    }

    /// +1 when the score is at least zero, otherwise -1.
    pub fn get_prediction(&self, x: &Tensor) -> Result<f32, Error> {
        Ok(if self.run(x)? >= 0.0 { 1.0 } else { -1.0 })
    }

    /// Passes over the data one point at a time, adding `label * x` to the
    /// weights on every mistake, until a pass makes none.
    ///
    /// Without `max_epochs` this only terminates on linearly separable data.
    pub fn train_model<S>(
        &mut self,
        dataset: &S,
        max_epochs: Option<usize>,
    ) -> Result<TrainingReport, Error>
    where
        S: Dataset + ?Sized,
    {
        if max_epochs == Some(0) {
            return Err(Error::InvalidConfig("max_epochs must be at least 1".to_owned()));
        }

        let mut epoch = 0;

        loop {
            epoch += 1;
            let _span = debug_span!("epoch", epoch).entered();

            let mut mistakes = 0;
            let mut samples = 0;

            for batch in dataset.iterate_once(1)? {
                let label = batch.labels.as_scalar()?;
                if self.get_prediction(&batch.inputs)? != label {
                    self.weights.update(label, &batch.inputs)?;
                    mistakes += 1;
                }
                samples += 1;
            }

            if samples == 0 {
                return Err(Error::EmptyDataset);
            }

            debug!(mistakes, "Epoch complete.");

            let last = EpochSummary {
                epoch,
                average_loss: mistakes as f32 / samples as f32,
                batches: samples,
                samples,
            };

            let outcome = if mistakes == 0 {
                info!(epoch, "Perceptron converged.");
                Outcome::Converged
            } else if max_epochs == Some(epoch) {
                warn!(epoch, mistakes, "Epoch limit reached before converging.");
                Outcome::EpochLimit
            } else {
                continue;
            };

            return Ok(TrainingReport {
                epochs: epoch,
                outcome,
                last,
                metric: mistakes as f32,
            });
        }
    }
}
