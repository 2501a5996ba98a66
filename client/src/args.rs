use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args as ArgsTrait, Parser, Subcommand};

use models::{DigitConfig, RegressionConfig};

/// Epoch caps applied when `epochs` is not given. `epochs=none` lifts them.
const PERCEPTRON_EPOCHS: usize = 1000;
const REGRESSION_EPOCHS: usize = 20000;
const DIGIT_EPOCHS: usize = 100;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Trains a perceptron on linearly separable points.
    Perceptron(PerceptronArgs),
    /// Fits a two-layer network to y = sin(x).
    Regression(RegressionArgs),
    /// Trains a digit classifier on noisy prototype images.
    Digits(DigitArgs),
}

#[derive(ArgsTrait, Clone, Debug)]
pub struct Common {
    /// Seed for parameter initialization and data generation. Random if omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// A file to write the trained model to, in JSON format.
    #[arg(short, long)]
    pub save: Option<PathBuf>,
}

#[derive(ArgsTrait, Clone, Debug)]
pub struct PerceptronArgs {
    #[command(flatten)]
    pub common: Common,

    /// Data options.
    ///
    /// Parameters:
    ///   dim=int    - The number of features per point, including the constant bias feature.
    ///   points=int - The number of points.
    #[arg(long, default_value = "dim=3,points=100", verbatim_doc_comment)]
    pub data: PerceptronData,

    /// Training options.
    ///
    /// Parameters:
    ///   epochs=int - The maximum number of passes over the data, or "none".
    #[arg(long, default_value = "epochs=1000", verbatim_doc_comment)]
    pub train: PerceptronTraining,
}

#[derive(ArgsTrait, Clone, Debug)]
pub struct RegressionArgs {
    #[command(flatten)]
    pub common: Common,

    /// Data options.
    ///
    /// Parameters:
    ///   points=int - The number of evenly spaced samples over [-2π, 2π].
    #[arg(long, default_value = "points=200", verbatim_doc_comment)]
    pub data: RegressionData,

    /// Training options.
    ///
    /// Parameters:
    ///   hidden=int        - The width of the hidden layer.
    ///   batch=int         - The number of samples per update.
    ///   rate=decimal      - The learning rate.
    ///   threshold=decimal - Stop once the average epoch loss falls below this.
    ///   epochs=int        - The maximum number of epochs, or "none".
    #[arg(long, default_value = "epochs=20000", verbatim_doc_comment)]
    pub train: RegressionTraining,
}

#[derive(ArgsTrait, Clone, Debug)]
pub struct DigitArgs {
    #[command(flatten)]
    pub common: Common,

    /// Data options.
    ///
    /// Parameters:
    ///   train=int       - Training images per digit.
    ///   validation=int  - Held-out images per digit.
    ///   noise=decimal   - Standard deviation of the pixel noise.
    #[arg(
        long,
        default_value = "train=100,validation=20,noise=0.1",
        verbatim_doc_comment
    )]
    pub data: DigitData,

    /// Training options.
    ///
    /// Parameters:
    ///   hidden=int        - The width of the hidden layer.
    ///   batch=int         - The number of images per update.
    ///   rate=decimal      - The learning rate.
    ///   threshold=decimal - Stop once validation accuracy reaches this. (0.0 - 1.0)
    ///   epochs=int        - The maximum number of epochs, or "none".
    #[arg(long, default_value = "epochs=100", verbatim_doc_comment)]
    pub train: DigitTraining,
}

#[derive(Clone, Debug)]
pub struct PerceptronData {
    pub dim: usize,
    pub points: usize,
}

impl FromStr for PerceptronData {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = parse_map(s)?;

        let dim = parse_field(&fields, "dim")?.unwrap_or(3);
        if dim == 0 {
            return Err("dim must be at least 1".to_owned());
        }
        let points = parse_field(&fields, "points")?.unwrap_or(100);

        Ok(Self { dim, points })
    }
}

#[derive(Clone, Debug)]
pub struct PerceptronTraining {
    pub max_epochs: Option<usize>,
}

impl FromStr for PerceptronTraining {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = parse_map(s)?;

        Ok(Self {
            max_epochs: parse_epochs(&fields, PERCEPTRON_EPOCHS)?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct RegressionData {
    pub points: usize,
}

impl FromStr for RegressionData {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = parse_map(s)?;

        Ok(Self {
            points: parse_field(&fields, "points")?.unwrap_or(200),
        })
    }
}

#[derive(Clone, Debug)]
pub struct RegressionTraining(pub RegressionConfig);

impl FromStr for RegressionTraining {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = parse_map(s)?;
        let defaults = RegressionConfig::default();

        let config = RegressionConfig {
            hidden: parse_field(&fields, "hidden")?.unwrap_or(defaults.hidden),
            batch_size: parse_field(&fields, "batch")?.unwrap_or(defaults.batch_size),
            learning_rate: parse_field(&fields, "rate")?.unwrap_or(defaults.learning_rate),
            loss_threshold: parse_field(&fields, "threshold")?.unwrap_or(defaults.loss_threshold),
            max_epochs: parse_epochs(&fields, REGRESSION_EPOCHS)?,
        };
        config.validate().map_err(|error| error.to_string())?;

        Ok(Self(config))
    }
}

#[derive(Clone, Debug)]
pub struct DigitData {
    pub train: usize,
    pub validation: usize,
    pub noise: f32,
}

impl FromStr for DigitData {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = parse_map(s)?;

        let train = parse_field(&fields, "train")?.unwrap_or(100);
        let validation = parse_field(&fields, "validation")?.unwrap_or(20);
        if validation == 0 {
            return Err("validation must be at least 1".to_owned());
        }
        let noise = parse_field(&fields, "noise")?.unwrap_or(0.1);

        Ok(Self {
            train,
            validation,
            noise,
        })
    }
}

#[derive(Clone, Debug)]
pub struct DigitTraining(pub DigitConfig);

impl FromStr for DigitTraining {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = parse_map(s)?;
        let defaults = DigitConfig::default();

        let config = DigitConfig {
            hidden: parse_field(&fields, "hidden")?.unwrap_or(defaults.hidden),
            batch_size: parse_field(&fields, "batch")?.unwrap_or(defaults.batch_size),
            learning_rate: parse_field(&fields, "rate")?.unwrap_or(defaults.learning_rate),
            accuracy_threshold: parse_field(&fields, "threshold")?
                .unwrap_or(defaults.accuracy_threshold),
            max_epochs: parse_epochs(&fields, DIGIT_EPOCHS)?,
            ..defaults
        };
        config.validate().map_err(|error| error.to_string())?;

        Ok(Self(config))
    }
}

fn parse_field<T: FromStr>(fields: &HashMap<&str, &str>, key: &str) -> Result<Option<T>, String> {
    fields
        .get(key)
        .map(|&f| {
            f.parse::<T>()
                .map_err(|_| format!("invalid value for {key}: {f}"))
        })
        .transpose()
}

fn parse_epochs(fields: &HashMap<&str, &str>, default: usize) -> Result<Option<usize>, String> {
    match fields.get("epochs") {
        Some(&"none") => Ok(None),
        None => Ok(Some(default)),
        Some(_) => parse_field(fields, "epochs"),
    }
}

fn parse_map(string: &str) -> Result<HashMap<&str, &str>, String> {
    string
        .split(',')
        .map(|field| field.trim())
        .filter(|field| !field.is_empty())
        .map(|field| field.split('=').map(|part| part.trim()))
        .map(|mut field_part| {
            let key = field_part
                .next()
                .ok_or_else(|| "no key for field".to_owned())?;
            let value = field_part
                .next()
                .ok_or_else(|| format!("no value for key: {key}"))?;
            Ok((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_options_override_defaults() {
        let RegressionTraining(config) = "rate=0.05, batch=20,epochs=none".parse().unwrap();

        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.hidden, 50);
        assert_eq!(config.max_epochs, None);

        let DigitTraining(config) = "threshold=0.9,epochs=7".parse().unwrap();
        assert_eq!(config.accuracy_threshold, 0.9);
        assert_eq!(config.max_epochs, Some(7));
        assert_eq!(config.input, 784);
    }

    #[test]
    fn missing_epochs_keeps_the_cap() {
        let RegressionTraining(config) = "rate=0.01".parse().unwrap();
        assert_eq!(config.max_epochs, Some(REGRESSION_EPOCHS));

        let DigitTraining(config) = "".parse().unwrap();
        assert_eq!(config.max_epochs, Some(DIGIT_EPOCHS));

        let training = "".parse::<PerceptronTraining>().unwrap();
        assert_eq!(training.max_epochs, Some(PERCEPTRON_EPOCHS));

        let training = "epochs=none".parse::<PerceptronTraining>().unwrap();
        assert_eq!(training.max_epochs, None);
    }

    #[test]
    fn bad_options() {
        assert!("rate".parse::<RegressionTraining>().is_err());
        assert!("rate=fast".parse::<RegressionTraining>().is_err());
        assert!("epochs=0".parse::<DigitTraining>().is_err());
        assert!("batch=0".parse::<DigitTraining>().is_err());
        assert!("dim=0".parse::<PerceptronData>().is_err());
    }

    #[test]
    fn empty_string_uses_defaults() {
        let data = "".parse::<PerceptronData>().unwrap();
        assert_eq!((data.dim, data.points), (3, 100));
    }
}
