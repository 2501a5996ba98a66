pub use self::context::NumericContext;
pub use self::error::{GraphError, ShapeError};
pub use self::gradient_descent::{GradientDescent, SimpleGradientDescent};
pub use self::graph::{Graph, NodeId};
pub use self::parameter::Parameter;

pub mod activation;
pub mod layer;
pub mod linear_algebra;
pub mod loss;

mod context;
mod error;
mod gradient_descent;
mod graph;
mod parameter;
