use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use super::{Value, ValueType};
use crate::error::ShapeError;

/// `[rows, columns]`
pub type Shape = [usize; 2];

/// An owned, row-major, two-dimensional array of values.
///
/// The shape is fixed at construction. Operations that depend on the shape of
/// another operand are checked and report a [`ShapeError`] instead of panicking.
#[derive(Clone, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "RawTensor")]
pub struct Tensor {
    values: Vec<Value>,
    shape: Shape,
}

#[derive(Deserialize)]
struct RawTensor {
    values: Vec<Value>,
    shape: Shape,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = ShapeError;

    fn try_from(raw: RawTensor) -> Result<Self, Self::Error> {
        Tensor::from_vec(raw.shape[0], raw.shape[1], raw.values)
    }
}

impl Tensor {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, Value::ZERO)
    }

    pub fn filled(rows: usize, cols: usize, value: Value) -> Self {
        Self {
            values: vec![value; rows * cols],
            shape: [rows, cols],
        }
    }

    pub fn scalar(value: Value) -> Self {
        Self::filled(1, 1, value)
    }

    /// A single-row tensor.
    pub fn row(values: Vec<Value>) -> Self {
        let cols = values.len();
        Self {
            values,
            shape: [1, cols],
        }
    }

    pub fn from_vec(rows: usize, cols: usize, values: Vec<Value>) -> Result<Self, ShapeError> {
        if values.len() != rows * cols {
            return Err(ShapeError::Size {
                shape: [rows, cols],
                values: values.len(),
            });
        }

        Ok(Self {
            values,
            shape: [rows, cols],
        })
    }

    pub fn from_rows<R: AsRef<[Value]>>(rows: &[R]) -> Result<Self, ShapeError> {
        let cols = rows.first().map_or(0, |row| row.as_ref().len());

        let mut values = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            values.extend_from_slice(row.as_ref());
        }

        Self::from_vec(rows.len(), cols, values)
    }

    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    pub fn cols(&self) -> usize {
        self.shape[1]
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [Value] {
        &mut self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = &[Value]> {
        let cols = self.cols();
        (0..self.rows()).map(move |r| &self.values[r * cols..(r + 1) * cols])
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut [Value]> {
        self.values.chunks_exact_mut(self.shape[1].max(1))
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Value> {
        if row < self.rows() && col < self.cols() {
            Some(self.values[row * self.cols() + col])
        } else {
            None
        }
    }

    /// Copies rows `start..end` into a new tensor.
    pub fn row_range(&self, start: usize, end: usize) -> Result<Self, ShapeError> {
        if start > end || end > self.rows() {
            return Err(ShapeError::OutOfBounds {
                rows: self.rows(),
                start,
                end,
            });
        }

        let cols = self.cols();
        Ok(Self {
            values: self.values[start * cols..end * cols].to_vec(),
            shape: [end - start, cols],
        })
    }

    /// The single value of a 1x1 tensor.
    pub fn as_scalar(&self) -> Result<Value, ShapeError> {
        match self.shape {
            [1, 1] => Ok(self.values[0]),
            shape => Err(ShapeError::NotScalar(shape)),
        }
    }

    pub fn map(&self, f: impl Fn(Value) -> Value) -> Self {
        Self {
            values: self.values.iter().map(|&x| f(x)).collect(),
            shape: self.shape,
        }
    }

    pub fn zip_map(
        &self,
        other: &Self,
        op: &'static str,
        f: impl Fn(Value, Value) -> Value,
    ) -> Result<Self, ShapeError> {
        self.expect_shape(op, other.shape)?;

        Ok(Self {
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(&a, &b)| f(a, b))
                .collect(),
            shape: self.shape,
        })
    }

    /// `self += multiplier * other`, leaving `self` untouched on a shape mismatch.
    pub fn scaled_add(&mut self, multiplier: Value, other: &Self) -> Result<(), ShapeError> {
        self.expect_shape("scaled_add", other.shape)?;

        self.values
            .iter_mut()
            .zip(&other.values)
            .for_each(|(x, &o)| *x += multiplier * o);

        Ok(())
    }

    pub fn matmul(&self, rhs: &Self) -> Result<Self, ShapeError> {
        let [rows, inner] = self.shape;
        let [rhs_rows, cols] = rhs.shape;

        if inner != rhs_rows {
            return Err(ShapeError::Mismatch {
                op: "matmul",
                left: self.shape,
                right: rhs.shape,
            });
        }

        let mut values = vec![Value::ZERO; rows * cols];
        for row in 0..rows {
            let lhs_row = &self.values[row * inner..(row + 1) * inner];
            let out_row = &mut values[row * cols..(row + 1) * cols];

            for (k, &a) in lhs_row.iter().enumerate() {
                let rhs_row = &rhs.values[k * cols..(k + 1) * cols];
                out_row
                    .iter_mut()
                    .zip(rhs_row)
                    .for_each(|(out, &b)| *out += a * b);
            }
        }

        Ok(Self {
            values,
            shape: [rows, cols],
        })
    }

    pub fn transpose(&self) -> Self {
        let [rows, cols] = self.shape;

        let mut values = vec![Value::ZERO; rows * cols];
        for row in 0..rows {
            for col in 0..cols {
                values[col * rows + row] = self.values[row * cols + col];
            }
        }

        Self {
            values,
            shape: [cols, rows],
        }
    }

    /// Column-wise sums as a single row.
    pub fn sum_rows(&self) -> Self {
        let mut sums = vec![Value::ZERO; self.cols()];
        for row in self.iter() {
            sums.iter_mut().zip(row).for_each(|(sum, &x)| *sum += x);
        }
        Self::row(sums)
    }

    pub fn sum(&self) -> Value {
        self.values.iter().sum()
    }

    /// Index of the largest value in each row. Ties resolve to the first index.
    pub fn argmax(&self) -> Vec<usize> {
        self.iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, Value::NEG_INFINITY), |best, (i, &x)| {
                        if x > best.1 {
                            (i, x)
                        } else {
                            best
                        }
                    })
                    .0
            })
            .collect()
    }

    pub fn expect_shape(&self, op: &'static str, shape: Shape) -> Result<(), ShapeError> {
        if self.shape == shape {
            Ok(())
        } else {
            Err(ShapeError::Mismatch {
                op,
                left: self.shape,
                right: shape,
            })
        }
    }
}

macro_rules! value_op_impl {
    ($op:ident, $op_method:ident, $op_assign:ident, $op_assign_method:ident) => {
        impl $op<Value> for Tensor {
            type Output = Tensor;

            fn $op_method(mut self, rhs: Value) -> Self::Output {
                self.$op_assign_method(rhs);
                self
            }
        }

        impl $op<Value> for &Tensor {
            type Output = Tensor;

            fn $op_method(self, rhs: Value) -> Self::Output {
                self.clone().$op_method(rhs)
            }
        }

        impl $op_assign<Value> for Tensor {
            fn $op_assign_method(&mut self, rhs: Value) {
                for x in self.values.iter_mut() {
                    (*x).$op_assign_method(rhs)
                }
            }
        }
    };
}

value_op_impl!(Add, add, AddAssign, add_assign);
value_op_impl!(Sub, sub, SubAssign, sub_assign);
value_op_impl!(Mul, mul, MulAssign, mul_assign);
value_op_impl!(Div, div, DivAssign, div_assign);

macro_rules! tensor_op_impl {
    ($method:ident, $name:literal, $op:tt) => {
        impl Tensor {
            #[doc = concat!("Element-wise `", stringify!($op), "` of two tensors of the same shape.")]
            pub fn $method(&self, rhs: &Tensor) -> Result<Tensor, ShapeError> {
                self.zip_map(rhs, $name, |a, b| a $op b)
            }
        }
    };
}

tensor_op_impl!(try_add, "add", +);
tensor_op_impl!(try_sub, "sub", -);
tensor_op_impl!(try_mul, "mul", *);

impl Neg for Tensor {
    type Output = Tensor;

    fn neg(self) -> Self::Output {
        self * -Value::ONE
    }
}

impl Neg for &Tensor {
    type Output = Tensor;

    fn neg(self) -> Self::Output {
        self * -Value::ONE
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [rows, cols] = self.shape;
        write!(f, "Tensor<{rows}x{cols}>")?;

        for (r, row) in self.iter().enumerate() {
            write!(f, "{}", if r == 0 { "[" } else { " " })?;
            for (c, x) in row.iter().enumerate() {
                write!(f, "{x:?}")?;
                if c + 1 < cols {
                    write!(f, " ")?;
                }
            }
            write!(f, "{}", if r + 1 < rows { "\n" } else { "]" })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_checks_size() {
        assert!(Tensor::from_vec(2, 3, vec![0.0; 6]).is_ok());
        assert_eq!(
            Tensor::from_vec(2, 3, vec![0.0; 5]),
            Err(ShapeError::Size {
                shape: [2, 3],
                values: 5
            })
        );
    }

    #[test]
    fn from_rows() {
        let t = Tensor::from_rows(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).unwrap();
        assert_eq!(t.shape(), [3, 2]);
        assert_eq!(t.get(2, 1), Some(6.0));
        assert_eq!(t.get(3, 0), None);

        let ragged: [&[f32]; 2] = [&[1.0, 2.0], &[3.0]];
        assert!(Tensor::from_rows(&ragged).is_err());
    }

    #[test]
    fn transpose() {
        let m = Tensor::from_rows(&[[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]]).unwrap();
        let n = Tensor::from_rows(&[[1.0, 5.0], [2.0, 6.0], [3.0, 7.0], [4.0, 8.0]]).unwrap();
        assert_eq!(m.transpose(), n);
        assert_eq!(n.transpose(), m);
    }

    #[test]
    fn multiply() {
        let m = Tensor::from_rows(&[[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]]).unwrap();
        let n = Tensor::from_rows(&[
            [1.0, 5.0, 9.0],
            [2.0, 6.0, 10.0],
            [3.0, 7.0, 11.0],
            [4.0, 8.0, 12.0],
        ])
        .unwrap();
        let o = Tensor::from_rows(&[[30.0, 70.0, 110.0], [70.0, 174.0, 278.0]]).unwrap();
        assert_eq!(m.matmul(&n).unwrap(), o);

        assert!(matches!(
            n.matmul(&n),
            Err(ShapeError::Mismatch { op: "matmul", .. })
        ));
    }

    #[test]
    fn scaled_add_leaves_tensor_on_mismatch() {
        let mut a = Tensor::from_rows(&[[1.0, 2.0]]).unwrap();
        let b = Tensor::from_rows(&[[10.0, 20.0]]).unwrap();

        a.scaled_add(-0.5, &b).unwrap();
        assert_eq!(a.values(), &[-4.0, -8.0]);

        assert!(a.scaled_add(1.0, &Tensor::zeros(2, 1)).is_err());
        assert_eq!(a.values(), &[-4.0, -8.0]);
    }

    #[test]
    fn scalar_extraction() {
        assert_eq!(Tensor::scalar(3.5).as_scalar(), Ok(3.5));
        assert_eq!(
            Tensor::zeros(1, 2).as_scalar(),
            Err(ShapeError::NotScalar([1, 2]))
        );
    }

    #[test]
    fn reductions() {
        let t = Tensor::from_rows(&[[1.0, -2.0, 3.0], [4.0, 5.0, -6.0]]).unwrap();
        assert_eq!(t.sum_rows().values(), &[5.0, 3.0, -3.0]);
        assert_eq!(t.sum(), 5.0);
        assert_eq!(t.argmax(), vec![2, 1]);
    }

    #[test]
    fn row_range() {
        let t = Tensor::from_rows(&[[1.0], [2.0], [3.0]]).unwrap();
        assert_eq!(t.row_range(1, 3).unwrap().values(), &[2.0, 3.0]);
        assert_eq!(t.row_range(3, 3).unwrap().shape(), [0, 1]);
        assert!(t.row_range(2, 4).is_err());
    }

    #[test]
    fn element_wise() {
        let a = Tensor::from_rows(&[[1.0, 2.0]]).unwrap();
        let b = Tensor::from_rows(&[[3.0, 5.0]]).unwrap();
        assert_eq!(a.try_add(&b).unwrap().values(), &[4.0, 7.0]);
        assert_eq!(a.try_sub(&b).unwrap().values(), &[-2.0, -3.0]);
        assert_eq!(a.try_mul(&b).unwrap().values(), &[3.0, 10.0]);
        assert_eq!((-&a).values(), &[-1.0, -2.0]);
        assert_eq!((a * 2.0 + 1.0).values(), &[3.0, 5.0]);
    }

    #[test]
    fn deserialize_validates_shape() {
        let good: Tensor = serde_json::from_str(r#"{"values":[1.0,2.0],"shape":[2,1]}"#).unwrap();
        assert_eq!(good.shape(), [2, 1]);

        let bad = serde_json::from_str::<Tensor>(r#"{"values":[1.0],"shape":[2,1]}"#);
        assert!(bad.is_err());
    }
}
