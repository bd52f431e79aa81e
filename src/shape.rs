//! Shape and degree calculus (spec §3, §4.B, §9 "Degree bookkeeping").
//!
//! Kept as a pair of small, pure, shape-shaped discriminated containers
//! rather than a hierarchy of traits: a scalar/vector/matrix expression
//! tree is easiest to reason about when dimensions and degrees are plain
//! data computed bottom-up, mirroring how `air.rs`'s `Locals`/`BlockResult`
//! structs carry fully-materialized results rather than lazily recomputed
//! ones.

use crate::error::TypeError;

/// `(rows, cols)` per spec §3: `(0,0)` scalar, `(n,0)` vector, `(n,m)` matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub rows: usize,
    pub cols: usize,
}

impl Dimensions {
    pub const SCALAR: Dimensions = Dimensions { rows: 0, cols: 0 };

    pub fn vector(n: usize) -> Self {
        Dimensions { rows: n, cols: 0 }
    }

    pub fn matrix(rows: usize, cols: usize) -> Self {
        debug_assert!(cols >= 1);
        Dimensions { rows, cols }
    }

    pub fn is_scalar(&self) -> bool {
        self.rows == 0 && self.cols == 0
    }

    pub fn is_vector(&self) -> bool {
        self.rows > 0 && self.cols == 0
    }

    pub fn is_matrix(&self) -> bool {
        self.cols >= 1
    }

    pub fn vector_len(&self) -> Option<usize> {
        self.is_vector().then_some(self.rows)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_scalar() {
            write!(f, "scalar")
        } else if self.is_vector() {
            write!(f, "vector({})", self.rows)
        } else {
            write!(f, "matrix({}x{})", self.rows, self.cols)
        }
    }
}

/// Shape-shaped polynomial-degree bound, mirroring [`Dimensions`]: a scalar
/// degree, a per-element vector of degrees, or a per-cell matrix of degrees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpressionDegree {
    Scalar(u64),
    Vector(Vec<u64>),
    Matrix(Vec<Vec<u64>>),
}

impl ExpressionDegree {
    pub fn dims(&self) -> Dimensions {
        match self {
            ExpressionDegree::Scalar(_) => Dimensions::SCALAR,
            ExpressionDegree::Vector(v) => Dimensions::vector(v.len()),
            ExpressionDegree::Matrix(m) => {
                let rows = m.len();
                let cols = m.first().map(|r| r.len()).unwrap_or(0);
                Dimensions::matrix(rows, cols)
            }
        }
    }

    pub fn max_degree(&self) -> u64 {
        match self {
            ExpressionDegree::Scalar(d) => *d,
            ExpressionDegree::Vector(v) => v.iter().copied().max().unwrap_or(0),
            ExpressionDegree::Matrix(m) => {
                m.iter().flat_map(|r| r.iter().copied()).max().unwrap_or(0)
            }
        }
    }

    fn broadcast_to(&self, dims: Dimensions) -> ExpressionDegree {
        match self {
            ExpressionDegree::Scalar(d) if !dims.is_scalar() => {
                if dims.is_vector() {
                    ExpressionDegree::Vector(vec![*d; dims.rows])
                } else {
                    ExpressionDegree::Matrix(vec![vec![*d; dims.cols]; dims.rows])
                }
            }
            other => other.clone(),
        }
    }

    fn elementwise(
        a: &ExpressionDegree,
        b: &ExpressionDegree,
        combine: impl Fn(u64, u64) -> u64,
    ) -> Result<ExpressionDegree, TypeError> {
        let dims = broadcast_dims(a.dims(), b.dims())?;
        let a = a.broadcast_to(dims);
        let b = b.broadcast_to(dims);
        Ok(match (a, b) {
            (ExpressionDegree::Scalar(x), ExpressionDegree::Scalar(y)) => {
                ExpressionDegree::Scalar(combine(x, y))
            }
            (ExpressionDegree::Vector(x), ExpressionDegree::Vector(y)) => {
                ExpressionDegree::Vector(x.iter().zip(y.iter()).map(|(&p, &q)| combine(p, q)).collect())
            }
            (ExpressionDegree::Matrix(x), ExpressionDegree::Matrix(y)) => ExpressionDegree::Matrix(
                x.iter()
                    .zip(y.iter())
                    .map(|(xr, yr)| xr.iter().zip(yr.iter()).map(|(&p, &q)| combine(p, q)).collect())
                    .collect(),
            ),
            _ => unreachable!("broadcast_to normalizes both sides to the same shape kind"),
        })
    }

    /// `add`/`sub`: element-wise max.
    pub fn add_sub(a: &ExpressionDegree, b: &ExpressionDegree) -> Result<ExpressionDegree, TypeError> {
        Self::elementwise(a, b, u64::max)
    }

    /// `mul`: element-wise sum.
    pub fn mul(a: &ExpressionDegree, b: &ExpressionDegree) -> Result<ExpressionDegree, TypeError> {
        Self::elementwise(a, b, |x, y| x + y)
    }

    /// `exp` with scalar constant `k`: element-wise multiply by `k`.
    pub fn exp(a: &ExpressionDegree, k: u64) -> ExpressionDegree {
        match a {
            ExpressionDegree::Scalar(d) => ExpressionDegree::Scalar(d * k),
            ExpressionDegree::Vector(v) => ExpressionDegree::Vector(v.iter().map(|d| d * k).collect()),
            ExpressionDegree::Matrix(m) => {
                ExpressionDegree::Matrix(m.iter().map(|r| r.iter().map(|d| d * k).collect()).collect())
            }
        }
    }

    /// `div`: conservatively treated as sum (documented over-approximation,
    /// spec §3/§9 "Open questions").
    pub fn div(a: &ExpressionDegree, b: &ExpressionDegree) -> Result<ExpressionDegree, TypeError> {
        Self::mul(a, b)
    }

    /// `neg`: identity.
    pub fn neg(a: &ExpressionDegree) -> ExpressionDegree {
        a.clone()
    }

    /// `inv`: identity (over-approximate, spec §3/§9).
    pub fn inv(a: &ExpressionDegree) -> ExpressionDegree {
        a.clone()
    }

    /// `prod`: linear-algebraic product degree.
    ///
    /// - vector·vector -> scalar dot: `max_i(d1[i] + d2[i])`
    /// - matrix·vector -> vector: row-wise dot against the vector
    /// - matrix·matrix -> matrix: cell-wise dot along the contracted axis
    pub fn prod(a: &ExpressionDegree, b: &ExpressionDegree) -> Result<ExpressionDegree, TypeError> {
        match (a, b) {
            (ExpressionDegree::Vector(x), ExpressionDegree::Vector(y)) => {
                if x.len() != y.len() {
                    return Err(TypeError::BadProdShape {
                        lhs: format!("vector({})", x.len()),
                        rhs: format!("vector({})", y.len()),
                    });
                }
                let d = x.iter().zip(y.iter()).map(|(&p, &q)| p + q).max().unwrap_or(0);
                Ok(ExpressionDegree::Scalar(d))
            }
            (ExpressionDegree::Matrix(m), ExpressionDegree::Vector(v)) => {
                let cols = m.first().map(|r| r.len()).unwrap_or(0);
                if cols != v.len() {
                    return Err(TypeError::BadProdShape {
                        lhs: format!("matrix(_x{})", cols),
                        rhs: format!("vector({})", v.len()),
                    });
                }
                let out = m
                    .iter()
                    .map(|row| row.iter().zip(v.iter()).map(|(&p, &q)| p + q).max().unwrap_or(0))
                    .collect();
                Ok(ExpressionDegree::Vector(out))
            }
            (ExpressionDegree::Matrix(x), ExpressionDegree::Matrix(y)) => {
                let x_cols = x.first().map(|r| r.len()).unwrap_or(0);
                let y_rows = y.len();
                if x_cols != y_rows {
                    return Err(TypeError::BadProdShape {
                        lhs: format!("matrix(_x{})", x_cols),
                        rhs: format!("matrix({}x_)", y_rows),
                    });
                }
                let y_cols = y.first().map(|r| r.len()).unwrap_or(0);
                let mut out = vec![vec![0u64; y_cols]; x.len()];
                for (i, row) in x.iter().enumerate() {
                    for j in 0..y_cols {
                        out[i][j] = row
                            .iter()
                            .enumerate()
                            .map(|(k, &p)| p + y[k][j])
                            .max()
                            .unwrap_or(0);
                    }
                }
                Ok(ExpressionDegree::Matrix(out))
            }
            _ => Err(TypeError::BadProdShape {
                lhs: a.dims().to_string(),
                rhs: b.dims().to_string(),
            }),
        }
    }
}

/// Dimensions rules for element-wise `add`/`sub`/`mul`: equal shapes, or one
/// side is a scalar broadcasting to the other.
pub fn broadcast_dims(a: Dimensions, b: Dimensions) -> Result<Dimensions, TypeError> {
    if a == b {
        Ok(a)
    } else if a.is_scalar() {
        Ok(b)
    } else if b.is_scalar() {
        Ok(a)
    } else {
        Err(TypeError::ShapeMismatch {
            expected: a.to_string(),
            got: b.to_string(),
        })
    }
}

/// Dimensions of a linear-algebraic `prod`.
pub fn prod_dims(a: Dimensions, b: Dimensions) -> Result<Dimensions, TypeError> {
    match (a, b) {
        (d1, d2) if d1.is_vector() && d2.is_vector() => {
            if d1.rows != d2.rows {
                return Err(TypeError::BadProdShape { lhs: d1.to_string(), rhs: d2.to_string() });
            }
            Ok(Dimensions::SCALAR)
        }
        (d1, d2) if d1.is_matrix() && d2.is_vector() => {
            if d1.cols != d2.rows {
                return Err(TypeError::BadProdShape { lhs: d1.to_string(), rhs: d2.to_string() });
            }
            Ok(Dimensions::vector(d1.rows))
        }
        (d1, d2) if d1.is_matrix() && d2.is_matrix() => {
            if d1.cols != d2.rows {
                return Err(TypeError::BadProdShape { lhs: d1.to_string(), rhs: d2.to_string() });
            }
            Ok(Dimensions::matrix(d1.rows, d2.cols))
        }
        (d1, d2) => Err(TypeError::BadProdShape { lhs: d1.to_string(), rhs: d2.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_allows_scalar_either_side() {
        let v = Dimensions::vector(4);
        assert_eq!(broadcast_dims(Dimensions::SCALAR, v).unwrap(), v);
        assert_eq!(broadcast_dims(v, Dimensions::SCALAR).unwrap(), v);
        assert!(broadcast_dims(v, Dimensions::vector(5)).is_err());
    }

    #[test]
    fn add_sub_is_elementwise_max() {
        let a = ExpressionDegree::Vector(vec![1, 2, 3]);
        let b = ExpressionDegree::Vector(vec![3, 1, 0]);
        assert_eq!(ExpressionDegree::add_sub(&a, &b).unwrap(), ExpressionDegree::Vector(vec![3, 2, 3]));
    }

    #[test]
    fn mul_is_elementwise_sum_with_scalar_broadcast() {
        let a = ExpressionDegree::Vector(vec![1, 2, 3]);
        let b = ExpressionDegree::Scalar(2);
        assert_eq!(ExpressionDegree::mul(&a, &b).unwrap(), ExpressionDegree::Vector(vec![3, 4, 5]));
    }

    #[test]
    fn exp_multiplies_every_cell() {
        let a = ExpressionDegree::Vector(vec![1, 2]);
        assert_eq!(ExpressionDegree::exp(&a, 3), ExpressionDegree::Vector(vec![3, 6]));
    }

    #[test]
    fn prod_dot_takes_max_of_sums() {
        let a = ExpressionDegree::Vector(vec![1, 2, 0]);
        let b = ExpressionDegree::Vector(vec![0, 2, 5]);
        assert_eq!(ExpressionDegree::prod(&a, &b).unwrap(), ExpressionDegree::Scalar(4));
    }

    #[test]
    fn prod_matrix_vector_is_rowwise() {
        let m = ExpressionDegree::Matrix(vec![vec![1, 0], vec![0, 2]]);
        let v = ExpressionDegree::Vector(vec![1, 1]);
        assert_eq!(ExpressionDegree::prod(&m, &v).unwrap(), ExpressionDegree::Vector(vec![2, 3]));
    }
}
