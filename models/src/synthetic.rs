//! Generated datasets for exercising the models without external data files.

use std::f32::consts::PI;

use ann::linear_algebra::Tensor;
use ann::NumericContext;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::dataset::InMemoryDataset;
use crate::error::Error;

pub const PIXELS: usize = 784;
pub const CLASSES: usize = 10;

/// The minimum distance between any generated point and the hidden hyperplane.
const SEPARATION_MARGIN: f32 = 0.05;

/// `points` samples in `[-1, 1]^(dim - 1)` followed by a constant bias feature
/// of 1, labelled +1 or -1 by a hidden random hyperplane.
pub fn linearly_separable(
    context: &mut NumericContext,
    dim: usize,
    points: usize,
) -> Result<InMemoryDataset, Error> {
    if dim == 0 || points == 0 {
        return Err(Error::InvalidConfig(
            "separable data needs at least one dimension and one point".to_owned(),
        ));
    }

    let mut hyperplane = context.uniform(1, dim, 1.0);
    hyperplane.values_mut()[dim - 1] *= 0.5;
    let norm = hyperplane.values().iter().map(|w| w * w).sum::<f32>().sqrt();

    let mut inputs = Vec::with_capacity(points * dim);
    let mut labels = Vec::with_capacity(points);

    while labels.len() < points {
        let mut point = (0..dim - 1)
            .map(|_| context.rng().gen_range(-1.0..=1.0))
            .collect::<Vec<f32>>();
        point.push(1.0);

        let score = point
            .iter()
            .zip(hyperplane.values())
            .map(|(x, w)| x * w)
            .sum::<f32>();
        if score.abs() < SEPARATION_MARGIN * norm {
            continue;
        }

        inputs.extend(point);
        labels.push(if score >= 0.0 { 1.0 } else { -1.0 });
    }

    debug!(dim, points, "Generated linearly separable data.");

    InMemoryDataset::new(
        Tensor::from_vec(points, dim, inputs)?,
        Tensor::from_vec(points, 1, labels)?,
    )
}

/// `y = sin(x)` at `points` evenly spaced `x` over `[-2π, 2π]`.
pub fn sine(points: usize) -> Result<InMemoryDataset, Error> {
    if points == 0 {
        return Err(Error::EmptyDataset);
    }

    let step = match points {
        1 => 0.0,
        _ => 4.0 * PI / (points - 1) as f32,
    };
    let x = (0..points)
        .map(|i| -2.0 * PI + step * i as f32)
        .collect::<Vec<_>>();
    let y = x.iter().map(|x| x.sin()).collect::<Vec<_>>();

    InMemoryDataset::new(Tensor::from_vec(points, 1, x)?, Tensor::from_vec(points, 1, y)?)
}

/// Noisy 28×28 images around ten random binary prototypes, one per digit.
///
/// Rows cycle through the classes so every batch sees all of them. The
/// validation split is drawn from the same prototypes and is omitted when
/// `validation_per_class` is zero.
pub fn prototype_digits(
    context: &mut NumericContext,
    train_per_class: usize,
    validation_per_class: usize,
    noise: f32,
) -> Result<InMemoryDataset, Error> {
    if train_per_class == 0 {
        return Err(Error::EmptyDataset);
    }
    let noise = Normal::new(0.0, noise)
        .map_err(|error| Error::InvalidConfig(format!("noise: {error}")))?;

    let prototypes = (0..CLASSES)
        .map(|_| {
            (0..PIXELS)
                .map(|_| if context.rng().gen_bool(0.5) { 1.0 } else { 0.0 })
                .collect::<Vec<f32>>()
        })
        .collect::<Vec<_>>();

    let mut sample = |per_class: usize| -> Result<(Tensor, Tensor), Error> {
        let rows = per_class * CLASSES;
        let mut images = Vec::with_capacity(rows * PIXELS);
        let mut labels = vec![0.0; rows * CLASSES];

        for row in 0..rows {
            let class = row % CLASSES;
            images.extend(
                prototypes[class]
                    .iter()
                    .map(|p| (p + noise.sample(context.rng())).clamp(0.0, 1.0)),
            );
            labels[row * CLASSES + class] = 1.0;
        }

        Ok((
            Tensor::from_vec(rows, PIXELS, images)?,
            Tensor::from_vec(rows, CLASSES, labels)?,
        ))
    };

    let (inputs, labels) = sample(train_per_class)?;
    let dataset = InMemoryDataset::new(inputs, labels)?;

    debug!(
        train = train_per_class * CLASSES,
        validation = validation_per_class * CLASSES,
        "Generated prototype digits."
    );

    match validation_per_class {
        0 => Ok(dataset),
        n => {
            let (inputs, labels) = sample(n)?;
            dataset.with_validation(inputs, labels)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    #[test]
    fn separable_points_respect_margin() {
        let mut context = NumericContext::seeded(5);
        let data = linearly_separable(&mut context, 3, 200).unwrap();

        assert_eq!(data.len(), 200);
        assert_eq!(data.inputs().shape(), [200, 3]);
        assert!(data.inputs().iter().all(|row| row[2] == 1.0));
        assert!(data
            .labels()
            .values()
            .iter()
            .all(|&y| y == 1.0 || y == -1.0));
    }

    #[test]
    fn same_seed_same_data() {
        let a = linearly_separable(&mut NumericContext::seeded(9), 4, 50).unwrap();
        let b = linearly_separable(&mut NumericContext::seeded(9), 4, 50).unwrap();

        assert_eq!(a.inputs(), b.inputs());
        assert_eq!(a.labels(), b.labels());
    }

    #[test]
    fn sine_spans_two_periods() {
        let data = sine(200).unwrap();
        let x = data.inputs().values();
        let y = data.labels().values();

        assert_eq!(data.len(), 200);
        assert!((x[0] + 2.0 * PI).abs() < 1e-5);
        assert!((x[199] - 2.0 * PI).abs() < 1e-4);
        assert!(x.windows(2).all(|w| w[0] < w[1]));
        assert!(x.iter().zip(y).all(|(x, y)| (x.sin() - y).abs() < 1e-6));
        assert_eq!(sine(0).err(), Some(Error::EmptyDataset));
    }

    #[test]
    fn digits_are_one_hot_and_bounded() {
        let mut context = NumericContext::seeded(2);
        let data = prototype_digits(&mut context, 3, 2, 0.2).unwrap();

        assert_eq!(data.inputs().shape(), [30, PIXELS]);
        assert_eq!(data.labels().shape(), [30, CLASSES]);
        assert!(data.inputs().values().iter().all(|&p| (0.0..=1.0).contains(&p)));
        assert!(data.labels().iter().all(|row| row.iter().sum::<f32>() == 1.0));
        assert_eq!(data.labels().argmax()[..12], [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0, 1]);

        let (inputs, labels) = data.validation().unwrap();
        assert_eq!(inputs.rows(), 20);
        assert_eq!(labels.rows(), 20);
    }

    #[test]
    fn digits_without_validation() {
        let mut context = NumericContext::seeded(2);
        let data = prototype_digits(&mut context, 1, 0, 0.0).unwrap();
        assert!(data.validation().is_none());

        assert!(matches!(
            prototype_digits(&mut context, 1, 0, -1.0),
            Err(Error::InvalidConfig(_))
        ));
    }
}
