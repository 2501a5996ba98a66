pub use self::dataset::{Batch, Batches, Classifier, Dataset, InMemoryDataset, ValidationAccuracy};
pub use self::digits::{DigitClassificationModel, DigitConfig};
pub use self::error::Error;
pub use self::network::{Objective, Trainable, TwoLayerNetwork};
pub use self::perceptron::PerceptronModel;
pub use self::regression::{RegressionConfig, RegressionModel};
pub use self::training::{step, train_until, EpochSummary, Outcome, Progress, TrainingReport};

pub mod synthetic;

mod dataset;
mod digits;
mod error;
mod network;
mod perceptron;
mod regression;
mod training;
