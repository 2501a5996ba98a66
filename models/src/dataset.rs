use ann::linear_algebra::Tensor;

use crate::error::Error;

/// One group of samples: `inputs` is `n×features`, `labels` is `n×outputs`.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub inputs: Tensor,
    pub labels: Tensor,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.inputs.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait Dataset {
    /// The number of training samples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every training sample exactly once, in a fixed order, `batch_size` rows
    /// at a time. The last batch holds the remainder.
    fn iterate_once(&self, batch_size: usize) -> Result<Batches<'_>, Error>;
}

/// Anything that can score a batch of inputs, one logit row per sample.
pub trait Classifier {
    fn logits(&self, inputs: &Tensor) -> Result<Tensor, Error>;
}

pub trait ValidationAccuracy {
    /// The fraction of held-out samples whose highest logit matches the label's
    /// hot column.
    fn validation_accuracy(&self, classifier: &dyn Classifier) -> Result<f32, Error>;
}

/// Iterator over consecutive row blocks of a pair of tensors.
pub struct Batches<'a> {
    inputs: &'a Tensor,
    labels: &'a Tensor,
    batch_size: usize,
    next: usize,
}

impl<'a> Batches<'a> {
    pub fn new(inputs: &'a Tensor, labels: &'a Tensor, batch_size: usize) -> Result<Self, Error> {
        if batch_size == 0 {
            return Err(Error::InvalidBatchSize);
        }
        check_rows(inputs, labels)?;

        Ok(Self {
            inputs,
            labels,
            batch_size,
            next: 0,
        })
    }
}

impl<'a> Iterator for Batches<'a> {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next;
        if start >= self.inputs.rows() {
            return None;
        }
        let end = (start + self.batch_size).min(self.inputs.rows());
        self.next = end;

        Some(Batch {
            inputs: self.inputs.row_range(start, end).ok()?,
            labels: self.labels.row_range(start, end).ok()?,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.inputs.rows().saturating_sub(self.next);
        let batches = (remaining + self.batch_size - 1) / self.batch_size;
        (batches, Some(batches))
    }
}

impl<'a> ExactSizeIterator for Batches<'a> {}

/// A dataset held entirely in memory, with an optional held-out split.
#[derive(Clone, Debug)]
pub struct InMemoryDataset {
    inputs: Tensor,
    labels: Tensor,
    validation: Option<(Tensor, Tensor)>,
}

impl InMemoryDataset {
    pub fn new(inputs: Tensor, labels: Tensor) -> Result<Self, Error> {
        check_rows(&inputs, &labels)?;

        Ok(Self {
            inputs,
            labels,
            validation: None,
        })
    }

    pub fn with_validation(mut self, inputs: Tensor, labels: Tensor) -> Result<Self, Error> {
        check_rows(&inputs, &labels)?;
        if inputs.cols() != self.inputs.cols() {
            return Err(ann::ShapeError::Mismatch {
                op: "validation inputs",
                left: self.inputs.shape(),
                right: inputs.shape(),
            }
            .into());
        }
        if labels.cols() != self.labels.cols() {
            return Err(ann::ShapeError::Mismatch {
                op: "validation labels",
                left: self.labels.shape(),
                right: labels.shape(),
            }
            .into());
        }

        self.validation = Some((inputs, labels));
        Ok(self)
    }

    pub fn inputs(&self) -> &Tensor {
        &self.inputs
    }

    pub fn labels(&self) -> &Tensor {
        &self.labels
    }

    pub fn validation(&self) -> Option<(&Tensor, &Tensor)> {
        self.validation.as_ref().map(|(x, y)| (x, y))
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.inputs.rows()
    }

    fn iterate_once(&self, batch_size: usize) -> Result<Batches<'_>, Error> {
        Batches::new(&self.inputs, &self.labels, batch_size)
    }
}

impl ValidationAccuracy for InMemoryDataset {
    fn validation_accuracy(&self, classifier: &dyn Classifier) -> Result<f32, Error> {
        let (inputs, labels) = self.validation().ok_or(Error::NoValidationSet)?;

        let logits = classifier.logits(inputs)?;
        logits.expect_shape("validation_accuracy", labels.shape())?;

        let correct = logits
            .argmax()
            .into_iter()
            .zip(labels.argmax())
            .filter(|(predicted, actual)| predicted == actual)
            .count();

        Ok(correct as f32 / labels.rows() as f32)
    }
}

fn check_rows(inputs: &Tensor, labels: &Tensor) -> Result<(), Error> {
    if inputs.rows() != labels.rows() {
        return Err(Error::MismatchedRows {
            inputs: inputs.rows(),
            labels: labels.rows(),
        });
    }
    if inputs.is_empty() || labels.is_empty() {
        return Err(Error::EmptyDataset);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(rows: usize) -> InMemoryDataset {
        let inputs = (0..rows).map(|i| [i as f32, -(i as f32)]).collect::<Vec<_>>();
        let labels = (0..rows).map(|i| [i as f32]).collect::<Vec<_>>();
        InMemoryDataset::new(
            Tensor::from_rows(&inputs).unwrap(),
            Tensor::from_rows(&labels).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn batches_cover_every_row_once() {
        let data = dataset(7);
        let batches = data.iterate_once(3).unwrap().collect::<Vec<_>>();

        assert_eq!(batches.len(), 3);
        assert_eq!(
            batches.iter().map(Batch::len).collect::<Vec<_>>(),
            [3, 3, 1]
        );

        let seen = batches
            .iter()
            .flat_map(|b| b.labels.values().to_vec())
            .collect::<Vec<_>>();
        assert_eq!(seen, [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(batches[2].inputs, Tensor::row(vec![6.0, -6.0]));
    }

    #[test]
    fn each_call_restarts() {
        let data = dataset(4);
        assert_eq!(data.iterate_once(2).unwrap().len(), 2);
        assert_eq!(data.iterate_once(2).unwrap().count(), 2);
        assert_eq!(data.iterate_once(10).unwrap().count(), 1);
    }

    #[test]
    fn invalid_construction() {
        assert_eq!(
            dataset(3).iterate_once(0).err(),
            Some(Error::InvalidBatchSize)
        );
        assert_eq!(
            InMemoryDataset::new(Tensor::zeros(3, 2), Tensor::zeros(2, 1)).err(),
            Some(Error::MismatchedRows {
                inputs: 3,
                labels: 2
            })
        );
        assert_eq!(
            InMemoryDataset::new(Tensor::zeros(0, 2), Tensor::zeros(0, 1)).err(),
            Some(Error::EmptyDataset)
        );
    }

    struct Fixed(Tensor);

    impl Classifier for Fixed {
        fn logits(&self, _: &Tensor) -> Result<Tensor, Error> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn validation_accuracy_counts_argmax_matches() {
        let labels = Tensor::from_rows(&[[1.0, 0.0], [0.0, 1.0], [0.0, 1.0], [1.0, 0.0]]).unwrap();
        let logits = Tensor::from_rows(&[[2.0, 1.0], [0.0, 3.0], [5.0, 1.0], [0.5, 0.0]]).unwrap();

        let data = dataset(2);
        assert_eq!(
            data.validation_accuracy(&Fixed(logits.clone())),
            Err(Error::NoValidationSet)
        );

        let data = InMemoryDataset::new(Tensor::zeros(2, 3), Tensor::zeros(2, 2))
            .unwrap()
            .with_validation(Tensor::zeros(4, 3), labels)
            .unwrap();
        assert_eq!(data.validation_accuracy(&Fixed(logits)), Ok(0.75));
    }
}
