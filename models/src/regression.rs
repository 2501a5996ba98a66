use ann::linear_algebra::Tensor;
use ann::{NumericContext, SimpleGradientDescent};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::dataset::Dataset;
use crate::error::Error;
use crate::network::{Objective, TwoLayerNetwork};
use crate::training::{train_until, Progress, TrainingReport};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct RegressionConfig {
    pub hidden: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    /// Training stops once the epoch's average loss drops below this.
    pub loss_threshold: f32,
    pub max_epochs: Option<usize>,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            hidden: 50,
            batch_size: 10,
            learning_rate: 0.001,
            loss_threshold: 0.02,
            max_epochs: None,
        }
    }
}

impl RegressionConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.hidden == 0 {
            return Err(Error::InvalidConfig("hidden must be at least 1".to_owned()));
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
        if !self.loss_threshold.is_finite() {
            return Err(Error::InvalidConfig("loss threshold must be finite".to_owned()));
        }
        if self.max_epochs == Some(0) {
            return Err(Error::InvalidConfig("max_epochs must be at least 1".to_owned()));
        }
        Ok(())
    }
}

/// Fits a scalar function of `input_dim` inputs with a two-layer ReLU network.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RegressionModel {
    config: RegressionConfig,
    network: TwoLayerNetwork,
}

impl RegressionModel {
    pub fn new(context: &mut NumericContext, input_dim: usize) -> Self {
        let config = RegressionConfig::default();
        Self {
            network: Self::build_network(context, input_dim, &config),
            config,
        }
    }

    pub fn with_config(
        context: &mut NumericContext,
        input_dim: usize,
        config: RegressionConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            network: Self::build_network(context, input_dim, &config),
            config,
        })
    }

    fn build_network(
        context: &mut NumericContext,
        input_dim: usize,
        config: &RegressionConfig,
    ) -> TwoLayerNetwork {
        TwoLayerNetwork::new(context, input_dim, config.hidden, 1, Objective::SquareLoss)
    }

    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    pub fn network(&self) -> &TwoLayerNetwork {
        &self.network
    }

    /// One prediction row per input row.
    pub fn run(&self, x: &Tensor) -> Result<Tensor, Error> {
        self.network.predict(x)
    }

    pub fn get_loss(&self, x: &Tensor, y: &Tensor) -> Result<f32, Error> {
        self.network.evaluate(x, y)
    }

    #[instrument(level = "debug", skip_all, fields(samples = dataset.len()))]
    pub fn train_model<S>(&mut self, dataset: &S) -> Result<TrainingReport, Error>
    where
        S: Dataset + ?Sized,
    {
        let mut descent = SimpleGradientDescent::new(self.config.learning_rate);
        let threshold = self.config.loss_threshold;

        train_until(
            &mut self.network,
            dataset,
            &mut descent,
            self.config.batch_size,
            self.config.max_epochs,
            |_, summary| {
                Ok(Progress {
                    metric: summary.average_loss,
                    converged: summary.average_loss < threshold,
                })
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::InMemoryDataset;
    use crate::synthetic::sine;
    use crate::training::Outcome;

    fn identity(points: usize) -> InMemoryDataset {
        let x = (0..points)
            .map(|i| -1.0 + 2.0 * i as f32 / (points - 1) as f32)
            .collect::<Vec<_>>();
        InMemoryDataset::new(
            Tensor::from_vec(points, 1, x.clone()).unwrap(),
            Tensor::from_vec(points, 1, x).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn defaults() {
        let config = RegressionConfig::default();
        assert_eq!(config.hidden, 50);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.learning_rate, 0.001);
        assert_eq!(config.loss_threshold, 0.02);
        assert_eq!(config.max_epochs, None);

        let partial: RegressionConfig = serde_json::from_str(r#"{"hidden": 8}"#).unwrap();
        assert_eq!(partial.hidden, 8);
        assert_eq!(partial.batch_size, 10);
    }

    #[test]
    fn invalid_configs() {
        let mut context = NumericContext::seeded(0);
        for config in [
            RegressionConfig {
                hidden: 0,
                ..Default::default()
            },
            RegressionConfig {
                batch_size: 0,
                ..Default::default()
            },
            RegressionConfig {
                learning_rate: -0.1,
                ..Default::default()
            },
            RegressionConfig {
                max_epochs: Some(0),
                ..Default::default()
            },
        ] {
            assert!(RegressionModel::with_config(&mut context, 1, config).is_err());
        }
    }

    #[test]
    fn run_shapes_and_idempotence() {
        let mut context = NumericContext::seeded(1);
        let model = RegressionModel::new(&mut context, 1);
        let data = sine(30).unwrap();

        let prediction = model.run(data.inputs()).unwrap();
        assert_eq!(prediction.shape(), [30, 1]);
        assert_eq!(prediction, model.run(data.inputs()).unwrap());
        assert!(model.get_loss(data.inputs(), data.labels()).unwrap() > 0.0);
    }

    #[test]
    fn loose_threshold_stops_after_one_epoch() {
        let mut context = NumericContext::seeded(2);
        let config = RegressionConfig {
            loss_threshold: 10.0,
            ..Default::default()
        };
        let mut model = RegressionModel::with_config(&mut context, 1, config).unwrap();

        let report = model.train_model(&sine(200).unwrap()).unwrap();
        assert_eq!(report.epochs, 1);
        assert_eq!(report.outcome, Outcome::Converged);
        assert_eq!(report.last.batches, 20);
    }

    #[test]
    fn unreachable_threshold_hits_cap() {
        let mut context = NumericContext::seeded(2);
        let config = RegressionConfig {
            loss_threshold: 0.0,
            max_epochs: Some(3),
            ..Default::default()
        };
        let mut model = RegressionModel::with_config(&mut context, 1, config).unwrap();

        let report = model.train_model(&identity(20)).unwrap();
        assert_eq!(report.epochs, 3);
        assert_eq!(report.outcome, Outcome::EpochLimit);
    }

    #[test]
    fn learns_identity() {
        let mut context = NumericContext::seeded(3);
        let config = RegressionConfig {
            learning_rate: 0.05,
            max_epochs: Some(5000),
            ..Default::default()
        };
        let mut model = RegressionModel::with_config(&mut context, 1, config).unwrap();
        let data = identity(20);

        let report = model.train_model(&data).unwrap();

        assert_eq!(report.outcome, Outcome::Converged);
        assert!(report.metric < 0.02);
        assert!(model.get_loss(data.inputs(), data.labels()).unwrap() < 0.05);
    }

    #[test]
    fn sine_reaches_default_threshold() {
        let mut context = NumericContext::seeded(1);
        let config = RegressionConfig {
            max_epochs: Some(20000),
            ..Default::default()
        };
        let mut model = RegressionModel::with_config(&mut context, 1, config).unwrap();
        assert_eq!(model.config().loss_threshold, 0.02);
        assert_eq!(model.network().objective(), Objective::SquareLoss);

        let data = sine(200).unwrap();
        let initial = model.get_loss(data.inputs(), data.labels()).unwrap();

        let report = model.train_model(&data).unwrap();

        assert_eq!(report.outcome, Outcome::Converged);
        assert!(report.epochs > 1);
        assert!(report.metric < 0.02);
        assert_eq!(report.metric, report.last.average_loss);
        assert!(report.last.average_loss < initial);
        assert!(model.get_loss(data.inputs(), data.labels()).unwrap() < initial / 2.0);
    }
}
