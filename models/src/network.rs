use ann::linear_algebra::Tensor;
use ann::{Graph, GraphError, NodeId, NumericContext, Parameter};
use serde::{Deserialize, Serialize};

use crate::dataset::Classifier;
use crate::error::Error;

/// A model the training controller can drive.
///
/// `parameters` and `parameters_mut` must list the same parameters in the same
/// order every time; `forward` receives their graph nodes in that order.
pub trait Trainable {
    fn parameters(&self) -> Vec<&Parameter>;

    fn parameters_mut(&mut self) -> Vec<&mut Parameter>;

    fn forward(
        &self,
        graph: &mut Graph<'_>,
        parameters: &[NodeId],
        inputs: NodeId,
    ) -> Result<NodeId, GraphError>;

    fn loss(
        &self,
        graph: &mut Graph<'_>,
        prediction: NodeId,
        labels: NodeId,
    ) -> Result<NodeId, GraphError>;
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum Objective {
    SquareLoss,
    SoftmaxLoss,
}

/// `relu(x @ w1 + b1) @ w2 + b2`
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TwoLayerNetwork {
    w1: Parameter,
    b1: Parameter,
    w2: Parameter,
    b2: Parameter,
    objective: Objective,
}

impl TwoLayerNetwork {
    pub fn new(
        context: &mut NumericContext,
        inputs: usize,
        hidden: usize,
        outputs: usize,
        objective: Objective,
    ) -> Self {
        Self {
            w1: Parameter::random(context, "w1", inputs, hidden),
            b1: Parameter::random(context, "b1", 1, hidden),
            w2: Parameter::random(context, "w2", hidden, outputs),
            b2: Parameter::random(context, "b2", 1, outputs),
            objective,
        }
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Runs a forward pass only.
    pub fn predict(&self, inputs: &Tensor) -> Result<Tensor, Error> {
        let mut graph = Graph::new();
        let parameters = self.parameter_nodes(&mut graph);
        let inputs = graph.input(inputs);
        let prediction = self.forward(&mut graph, &parameters, inputs)?;

        Ok(graph.value(prediction)?.clone())
    }

    /// The objective evaluated on `inputs` against `labels`.
    pub fn evaluate(&self, inputs: &Tensor, labels: &Tensor) -> Result<f32, Error> {
        let mut graph = Graph::new();
        let parameters = self.parameter_nodes(&mut graph);
        let inputs = graph.input(inputs);
        let labels = graph.input(labels);
        let prediction = self.forward(&mut graph, &parameters, inputs)?;
        let loss = self.loss(&mut graph, prediction, labels)?;

        Ok(graph.value(loss)?.as_scalar()?)
    }

    fn parameter_nodes<'p>(&'p self, graph: &mut Graph<'p>) -> Vec<NodeId> {
        self.parameters()
            .into_iter()
            .map(|p| graph.parameter(p))
            .collect()
    }
}

impl Trainable for TwoLayerNetwork {
    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.w1, &self.b1, &self.w2, &self.b2]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.w1, &mut self.b1, &mut self.w2, &mut self.b2]
    }

    fn forward(
        &self,
        graph: &mut Graph<'_>,
        parameters: &[NodeId],
        inputs: NodeId,
    ) -> Result<NodeId, GraphError> {
        let &[w1, b1, w2, b2] = parameters else {
            return Err(GraphError::ParameterCount {
                expected: 4,
                found: parameters.len(),
            });
        };

        let hidden = graph.linear(inputs, w1)?;
        let hidden = graph.add_bias(hidden, b1)?;
        let hidden = graph.relu(hidden)?;
        let output = graph.linear(hidden, w2)?;
        graph.add_bias(output, b2)
    }

    fn loss(
        &self,
        graph: &mut Graph<'_>,
        prediction: NodeId,
        labels: NodeId,
    ) -> Result<NodeId, GraphError> {
        match self.objective {
            Objective::SquareLoss => graph.square_loss(prediction, labels),
            Objective::SoftmaxLoss => graph.softmax_loss(prediction, labels),
        }
    }
}

impl Classifier for TwoLayerNetwork {
    fn logits(&self, inputs: &Tensor) -> Result<Tensor, Error> {
        self.predict(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_follow_topology() {
        let mut context = NumericContext::seeded(4);
        let network = TwoLayerNetwork::new(&mut context, 3, 7, 2, Objective::SoftmaxLoss);

        let shapes = network
            .parameters()
            .iter()
            .map(|p| p.shape())
            .collect::<Vec<_>>();
        assert_eq!(shapes, [[3, 7], [1, 7], [7, 2], [1, 2]]);

        let names = network
            .parameters()
            .iter()
            .map(|p| p.name().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, ["w1", "b1", "w2", "b2"]);

        assert_eq!(network.predict(&Tensor::zeros(5, 3)).unwrap().shape(), [5, 2]);
        assert!(network.predict(&Tensor::zeros(5, 4)).is_err());
    }

    #[test]
    fn forward_checks_parameter_count() {
        let mut context = NumericContext::seeded(4);
        let network = TwoLayerNetwork::new(&mut context, 1, 2, 1, Objective::SquareLoss);
        let x = Tensor::zeros(1, 1);

        let mut graph = Graph::new();
        let inputs = graph.input(&x);
        assert_eq!(
            network.forward(&mut graph, &[], inputs),
            Err(GraphError::ParameterCount {
                expected: 4,
                found: 0
            })
        );
    }

    #[test]
    fn predict_is_pure() {
        let mut context = NumericContext::seeded(8);
        let network = TwoLayerNetwork::new(&mut context, 2, 4, 1, Objective::SquareLoss);
        let x = context.uniform(6, 2, 1.0);

        let before = network.clone();
        assert_eq!(network.predict(&x).unwrap(), network.predict(&x).unwrap());
        assert_eq!(network, before);
    }

    #[test]
    fn serde_keeps_parameters() {
        let mut context = NumericContext::seeded(1);
        let network = TwoLayerNetwork::new(&mut context, 2, 3, 2, Objective::SoftmaxLoss);

        let json = serde_json::to_string(&network).unwrap();
        let restored: TwoLayerNetwork = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, network);
    }
}
