use ann::linear_algebra::Tensor;
use ann::{NumericContext, SimpleGradientDescent};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::dataset::{Classifier, Dataset, ValidationAccuracy};
use crate::error::Error;
use crate::network::{Objective, TwoLayerNetwork};
use crate::synthetic::{CLASSES, PIXELS};
use crate::training::{train_until, Progress, TrainingReport};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct DigitConfig {
    pub input: usize,
    pub hidden: usize,
    pub classes: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    /// Training stops once validation accuracy after an epoch reaches this.
    pub accuracy_threshold: f32,
    pub max_epochs: Option<usize>,
}

impl Default for DigitConfig {
    fn default() -> Self {
        Self {
            input: PIXELS,
            hidden: 200,
            classes: CLASSES,
            batch_size: 100,
            learning_rate: 0.1,
            accuracy_threshold: 0.975,
            max_epochs: None,
        }
    }
}

impl DigitConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.input == 0 || self.hidden == 0 || self.classes == 0 {
            return Err(Error::InvalidConfig(
                "layer widths must be at least 1".to_owned(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidBatchSize);
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be positive: {}",
                self.learning_rate
            )));
        }
        if !self.accuracy_threshold.is_finite() {
            return Err(Error::InvalidConfig(
                "accuracy threshold must be finite".to_owned(),
            ));
        }
        if self.max_epochs == Some(0) {
            return Err(Error::InvalidConfig("max_epochs must be at least 1".to_owned()));
        }
        Ok(())
    }
}

/// Classifies flattened images into one of `classes` digits.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DigitClassificationModel {
    config: DigitConfig,
    network: TwoLayerNetwork,
}

impl DigitClassificationModel {
    pub fn new(context: &mut NumericContext) -> Self {
        let config = DigitConfig::default();
        Self {
            network: Self::build_network(context, &config),
            config,
        }
    }

    pub fn with_config(context: &mut NumericContext, config: DigitConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            network: Self::build_network(context, &config),
            config,
        })
    }

    fn build_network(context: &mut NumericContext, config: &DigitConfig) -> TwoLayerNetwork {
        TwoLayerNetwork::new(
            context,
            config.input,
            config.hidden,
            config.classes,
            Objective::SoftmaxLoss,
        )
    }

    pub fn config(&self) -> &DigitConfig {
        &self.config
    }

    pub fn network(&self) -> &TwoLayerNetwork {
        &self.network
    }

    /// Unnormalized class scores, one row per image.
    pub fn run(&self, x: &Tensor) -> Result<Tensor, Error> {
        self.network.predict(x)
    }

    /// The most likely digit for each image.
    pub fn classify(&self, x: &Tensor) -> Result<Vec<usize>, Error> {
        Ok(self.run(x)?.argmax())
    }

    /// Softmax cross-entropy against one-hot label rows.
    pub fn get_loss(&self, x: &Tensor, y: &Tensor) -> Result<f32, Error> {
        self.network.evaluate(x, y)
    }

    /// Trains until the dataset's validation accuracy, checked after every
    /// full epoch, reaches the configured threshold.
    #[instrument(level = "debug", skip_all, fields(samples = dataset.len()))]
    pub fn train_model<S>(&mut self, dataset: &S) -> Result<TrainingReport, Error>
    where
        S: Dataset + ValidationAccuracy + ?Sized,
    {
        let mut descent = SimpleGradientDescent::new(self.config.learning_rate);
        let threshold = self.config.accuracy_threshold;

        train_until(
            &mut self.network,
            dataset,
            &mut descent,
            self.config.batch_size,
            self.config.max_epochs,
            |network, summary| {
                let accuracy = dataset.validation_accuracy(network)?;
                info!(epoch = summary.epoch, accuracy, "Validated.");

                Ok(Progress {
                    metric: accuracy,
                    converged: accuracy >= threshold,
                })
            },
        )
    }
}

impl Classifier for DigitClassificationModel {
    fn logits(&self, inputs: &Tensor) -> Result<Tensor, Error> {
        self.run(inputs)
    }
}
