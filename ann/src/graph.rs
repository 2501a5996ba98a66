use std::borrow::Cow;

use tracing::instrument;

use crate::activation::{relu, relu_prime};
use crate::error::{GraphError, ShapeError};
use crate::layer::*;
use crate::linear_algebra::{Tensor, Value};
use crate::loss::*;
use crate::parameter::Parameter;

/// Handle to a node of the [`Graph`] that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug)]
enum Op {
    Parameter,
    Input,
    Linear { x: NodeId, w: NodeId },
    AddBias { x: NodeId, b: NodeId },
    Relu { x: NodeId },
    DotProduct { x: NodeId, w: NodeId },
    SquareLoss { a: NodeId, b: NodeId },
    SoftmaxLoss { logits: NodeId, labels: NodeId },
}

struct Node<'p> {
    op: Op,
    value: Cow<'p, Tensor>,
    requires_grad: bool,
}

/// A tape of computation nodes for a single forward and backward pass.
///
/// Values are computed eagerly as nodes are added, so every node only ever
/// refers to nodes before it and the tape is already in topological order.
/// Leaves borrow their tensors; only op results are owned.
#[derive(Default)]
pub struct Graph<'p> {
    nodes: Vec<Node<'p>>,
}

impl<'p> Graph<'p> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parameter(&mut self, parameter: &'p Parameter) -> NodeId {
        self.push(Op::Parameter, Cow::Borrowed(parameter.value()), true)
    }

    pub fn input(&mut self, tensor: &'p Tensor) -> NodeId {
        self.push(Op::Input, Cow::Borrowed(tensor), false)
    }

    /// `x @ w`, with `x: B×I` and `w: I×O`.
    pub fn linear(&mut self, x: NodeId, w: NodeId) -> Result<NodeId, GraphError> {
        let value = linear_forward(self.value(x)?, self.value(w)?)?;
        Ok(self.push_op(Op::Linear { x, w }, value, &[x, w]))
    }

    /// Adds the `1×F` bias `b` to every row of `x`.
    pub fn add_bias(&mut self, x: NodeId, b: NodeId) -> Result<NodeId, GraphError> {
        let value = bias_forward(self.value(x)?, self.value(b)?)?;
        Ok(self.push_op(Op::AddBias { x, b }, value, &[x, b]))
    }

    pub fn relu(&mut self, x: NodeId) -> Result<NodeId, GraphError> {
        let value = activation_forward(self.value(x)?, relu);
        Ok(self.push_op(Op::Relu { x }, value, &[x]))
    }

    /// Scores every row of `x: B×D` against the single row of `w: 1×D`, giving `B×1`.
    pub fn dot_product(&mut self, x: NodeId, w: NodeId) -> Result<NodeId, GraphError> {
        let value = dot_product_forward(self.value(x)?, self.value(w)?)?;
        Ok(self.push_op(Op::DotProduct { x, w }, value, &[x, w]))
    }

    /// Mean of `(a - b)^2 / 2` over all elements, as a 1×1 node.
    pub fn square_loss(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, GraphError> {
        let value = square_loss(self.value(a)?, self.value(b)?)?;
        Ok(self.push_op(Op::SquareLoss { a, b }, Tensor::scalar(value), &[a, b]))
    }

    /// Softmax cross-entropy of `logits` against probability rows `labels`,
    /// averaged over rows, as a 1×1 node.
    pub fn softmax_loss(&mut self, logits: NodeId, labels: NodeId) -> Result<NodeId, GraphError> {
        let value = softmax_loss(self.value(logits)?, self.value(labels)?)?;
        Ok(self.push_op(
            Op::SoftmaxLoss { logits, labels },
            Tensor::scalar(value),
            &[logits, labels],
        ))
    }

    pub fn value(&self, node: NodeId) -> Result<&Tensor, GraphError> {
        Ok(&self.node(node)?.value)
    }

    /// Reverse-mode gradients of the 1×1 `loss` with respect to each of
    /// `parameters`, in the same order. Parameters the loss does not depend
    /// on receive zeros.
    #[instrument(level = "trace", skip_all, fields(nodes = self.nodes.len()))]
    pub fn gradients(
        &self,
        loss: NodeId,
        parameters: &[NodeId],
    ) -> Result<Vec<Tensor>, GraphError> {
        self.value(loss)?.as_scalar()?;

        for &parameter in parameters {
            if !matches!(self.node(parameter)?.op, Op::Parameter) {
                return Err(GraphError::NotAParameter(parameter.0));
            }
        }

        let mut adjoints: Vec<Option<Tensor>> = vec![None; loss.0 + 1];
        adjoints[loss.0] = Some(Tensor::scalar(1.0));

        for index in (0..=loss.0).rev() {
            let Some(adjoint) = adjoints[index].take() else {
                continue;
            };

            for (parent, gradient) in self.backward(&self.nodes[index], &adjoint)? {
                accumulate(&mut adjoints[parent.0], gradient)?;
            }

            adjoints[index] = Some(adjoint);
        }

        Ok(parameters
            .iter()
            .map(|parameter| {
                adjoints
                    .get(parameter.0)
                    .and_then(Option::as_ref)
                    .cloned()
                    .unwrap_or_else(|| {
                        let [rows, cols] = self.nodes[parameter.0].value.shape();
                        Tensor::zeros(rows, cols)
                    })
            })
            .collect())
    }

    /// Gradients flowing from `node` into those of its parents that need them.
    fn backward(
        &self,
        node: &Node<'p>,
        adjoint: &Tensor,
    ) -> Result<Vec<(NodeId, Tensor)>, ShapeError> {
        let mut gradients = Vec::with_capacity(2);
        let wants = |id: NodeId| self.nodes[id.0].requires_grad;
        let value = |id: NodeId| self.tensor(id);

        match node.op {
            Op::Parameter | Op::Input => {}
            Op::Linear { x, w } => {
                if wants(x) {
                    gradients.push((x, linear_input_gradients(value(w), adjoint)?));
                }
                if wants(w) {
                    gradients.push((w, linear_weight_gradients(value(x), adjoint)?));
                }
            }
            Op::AddBias { x, b } => {
                if wants(x) {
                    gradients.push((x, adjoint.clone()));
                }
                if wants(b) {
                    gradients.push((b, bias_backward(adjoint)));
                }
            }
            Op::Relu { x } => {
                if wants(x) {
                    gradients.push((x, activation_backward(value(x), adjoint, relu_prime)?));
                }
            }
            Op::DotProduct { x, w } => {
                if wants(x) {
                    gradients.push((x, dot_product_input_gradients(value(w), adjoint)?));
                }
                if wants(w) {
                    gradients.push((w, dot_product_weight_gradients(value(x), adjoint)?));
                }
            }
            Op::SquareLoss { a, b } => {
                let scale = adjoint.as_scalar()?;
                let da = square_loss_prime(value(a), value(b))? * scale;
                if wants(b) {
                    gradients.push((b, -&da));
                }
                if wants(a) {
                    gradients.push((a, da));
                }
            }
            Op::SoftmaxLoss { logits, labels } => {
                let scale = adjoint.as_scalar()?;
                if wants(logits) {
                    let d = softmax_loss_prime(value(logits), value(labels))? * scale;
                    gradients.push((logits, d));
                }
                if wants(labels) {
                    let rows = value(logits).rows().max(1) as Value;
                    let d = log_softmax(value(logits)) * (-scale / rows);
                    gradients.push((labels, d));
                }
            }
        }

        Ok(gradients)
    }

    fn tensor(&self, id: NodeId) -> &Tensor {
        &self.nodes[id.0].value
    }

    fn node(&self, id: NodeId) -> Result<&Node<'p>, GraphError> {
        self.nodes.get(id.0).ok_or(GraphError::UnknownNode(id.0))
    }

    fn push(&mut self, op: Op, value: Cow<'p, Tensor>, requires_grad: bool) -> NodeId {
        self.nodes.push(Node {
            op,
            value,
            requires_grad,
        });
        NodeId(self.nodes.len() - 1)
    }

    fn push_op(&mut self, op: Op, value: Tensor, parents: &[NodeId]) -> NodeId {
        let requires_grad = parents.iter().any(|p| self.nodes[p.0].requires_grad);
        self.push(op, Cow::Owned(value), requires_grad)
    }
}

fn accumulate(slot: &mut Option<Tensor>, gradient: Tensor) -> Result<(), ShapeError> {
    match slot {
        Some(existing) => existing.scaled_add(1.0, &gradient),
        None => {
            *slot = Some(gradient);
            Ok(())
        }
    }
}
