use ann::{GradientDescent, Graph, NodeId};
use serde::{Deserialize, Serialize};
use tracing::{debug_span, info, warn};

use crate::dataset::{Batch, Dataset};
use crate::error::Error;
use crate::network::Trainable;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct EpochSummary {
    /// 1-based.
    pub epoch: usize,
    /// Mean loss over the epoch, weighting each batch by its size.
    pub average_loss: f32,
    pub batches: usize,
    pub samples: usize,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Converged,
    EpochLimit,
}

/// What a stopping predicate reports after each epoch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    /// The quantity the predicate judged, e.g. loss or validation accuracy.
    pub metric: f32,
    pub converged: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct TrainingReport {
    pub epochs: usize,
    pub outcome: Outcome,
    pub last: EpochSummary,
    /// The last metric reported by the stopping predicate.
    pub metric: f32,
}

/// One forward pass, backward pass, and parameter update. Returns the loss
/// measured before the update.
pub fn step<M, D>(model: &mut M, descent: &mut D, batch: &Batch) -> Result<f32, Error>
where
    M: Trainable + ?Sized,
    D: GradientDescent + ?Sized,
{
    let (loss, gradients) = {
        let parameters = model.parameters();
        let mut graph = Graph::new();

        let nodes = parameters
            .iter()
            .map(|&p| graph.parameter(p))
            .collect::<Vec<NodeId>>();
        let inputs = graph.input(&batch.inputs);
        let labels = graph.input(&batch.labels);

        let prediction = model.forward(&mut graph, &nodes, inputs)?;
        let loss = model.loss(&mut graph, prediction, labels)?;

        (graph.value(loss)?.as_scalar()?, graph.gradients(loss, &nodes)?)
    };

    if !loss.is_finite() {
        return Err(Error::NonFiniteLoss);
    }

    descent.descend(&mut model.parameters_mut(), &gradients)?;

    Ok(loss)
}

/// Trains in full epochs until `predicate` reports convergence or
/// `max_epochs` have run. The predicate is only consulted between epochs.
pub fn train_until<M, S, D, P>(
    model: &mut M,
    dataset: &S,
    descent: &mut D,
    batch_size: usize,
    max_epochs: Option<usize>,
    mut predicate: P,
) -> Result<TrainingReport, Error>
where
    M: Trainable + ?Sized,
    S: Dataset + ?Sized,
    D: GradientDescent + ?Sized,
    P: FnMut(&M, &EpochSummary) -> Result<Progress, Error>,
{
    if max_epochs == Some(0) {
        return Err(Error::InvalidConfig("max_epochs must be at least 1".to_owned()));
    }

    let mut epoch = 0;

    loop {
        epoch += 1;

        let summary = run_epoch(model, dataset, descent, batch_size, epoch)?;
        info!(
            epoch,
            average_loss = summary.average_loss,
            batches = summary.batches,
            samples = summary.samples,
            "Epoch complete."
        );

        let progress = predicate(model, &summary)?;

        let outcome = if progress.converged {
            info!(epoch, metric = progress.metric, "Converged.");
            Outcome::Converged
        } else if max_epochs == Some(epoch) {
            warn!(epoch, metric = progress.metric, "Epoch limit reached before converging.");
            Outcome::EpochLimit
        } else {
            continue;
        };

        return Ok(TrainingReport {
            epochs: epoch,
            outcome,
            last: summary,
            metric: progress.metric,
        });
    }
}

fn run_epoch<M, S, D>(
    model: &mut M,
    dataset: &S,
    descent: &mut D,
    batch_size: usize,
    epoch: usize,
) -> Result<EpochSummary, Error>
where
    M: Trainable + ?Sized,
    S: Dataset + ?Sized,
    D: GradientDescent + ?Sized,
{
    let _span = debug_span!("epoch", epoch).entered();

    let mut total_loss = 0.0;
    let mut batches = 0;
    let mut samples = 0;

    for batch in dataset.iterate_once(batch_size)? {
        let loss = step(model, descent, &batch)?;
        total_loss += loss * batch.len() as f32;
        batches += 1;
        samples += batch.len();
    }

    if samples == 0 {
        return Err(Error::EmptyDataset);
    }

    Ok(EpochSummary {
        epoch,
        average_loss: total_loss / samples as f32,
        batches,
        samples,
    })
}
