use crate::linear_algebra::Value;

pub fn relu(x: Value) -> Value {
    x.max(0.0)
}

pub fn relu_prime(x: Value) -> Value {
    match x > 0.0 {
        true => 1.0,
        false => 0.0,
    }
}
