use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};

use serde::Serialize;
use tracing::info;

use ann::NumericContext;
use models::synthetic::{linearly_separable, prototype_digits, sine};
use models::{DigitClassificationModel, PerceptronModel, RegressionModel, TrainingReport};

use crate::args::{Common, DigitArgs, PerceptronArgs, RegressionArgs};

type Result<T> = std::result::Result<T, Box<dyn Error>>;

pub fn run_perceptron(args: PerceptronArgs) -> Result<()> {
    let mut context = create_context(&args.common);

    let data = linearly_separable(&mut context, args.data.dim, args.data.points)?;
    let mut model = PerceptronModel::new(&mut context, args.data.dim);

    let report = model.train_model(&data, args.train.max_epochs)?;
    log_report(&report);

    save(&args.common, &model)
}

pub fn run_regression(args: RegressionArgs) -> Result<()> {
    let mut context = create_context(&args.common);

    let data = sine(args.data.points)?;
    let mut model = RegressionModel::with_config(&mut context, 1, args.train.0)?;
    info!(config = ?model.config(), "Training regression model.");

    let report = model.train_model(&data)?;
    log_report(&report);

    save(&args.common, &model)
}

pub fn run_digits(args: DigitArgs) -> Result<()> {
    let mut context = create_context(&args.common);

    let data = prototype_digits(
        &mut context,
        args.data.train,
        args.data.validation,
        args.data.noise,
    )?;
    let mut model = DigitClassificationModel::with_config(&mut context, args.train.0)?;
    info!(config = ?model.config(), "Training digit classifier.");

    let report = model.train_model(&data)?;
    log_report(&report);

    save(&args.common, &model)
}

fn create_context(common: &Common) -> NumericContext {
    let context = match common.seed {
        Some(seed) => NumericContext::seeded(seed),
        None => NumericContext::from_entropy(),
    };
    info!(seed = ?context.seed(), "Created numeric context.");
    context
}

fn log_report(report: &TrainingReport) {
    info!(
        epochs = report.epochs,
        outcome = ?report.outcome,
        metric = report.metric,
        average_loss = report.last.average_loss,
        "Training finished."
    );
}

fn save<T: Serialize>(common: &Common, model: &T) -> Result<()> {
    if let Some(path) = &common.save {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, model)?;
        writer.flush()?;

        info!(path = %path.display(), "Saved model.");
    }
    Ok(())
}
