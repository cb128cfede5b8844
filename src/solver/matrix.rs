//! Indexed dense-matrix storage and the linear solves used by the
//! transient core.
//!
//! The network equations stay small (hundreds of nodes), so a row-major
//! dense layout with LU factorization and partial pivoting covers every
//! solve the integrator needs.

use crate::error::{Result, SurgeError};

/// A dense row-major matrix of `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    /// Create a zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Create an identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, 1.0);
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Get the element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Set the element at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Add to the element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] += value;
    }

    /// A row as a slice.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// A row as a mutable slice.
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Zero a row and place 1 on its diagonal (constraint row).
    pub fn set_unit_row(&mut self, row: usize) {
        self.row_mut(row).fill(0.0);
        self.set(row, row, 1.0);
    }

    /// Matrix x vector multiply.
    pub fn mul_vec(&self, v: &[f64]) -> Vec<f64> {
        debug_assert_eq!(v.len(), self.cols);
        let mut out = vec![0.0; self.rows];
        for (i, out_i) in out.iter_mut().enumerate() {
            let row = self.row(i);
            let mut acc = 0.0;
            for (a, b) in row.iter().zip(v) {
                acc += a * b;
            }
            *out_i = acc;
        }
        out
    }

    /// Matrix x matrix multiply.
    pub fn mul_mat(&self, other: &Matrix) -> Matrix {
        debug_assert_eq!(self.cols, other.rows);
        let mut out = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.get(i, k);
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    out.add(i, j, a * other.get(k, j));
                }
            }
        }
        out
    }

    /// Copy the strict upper triangle onto the lower triangle.
    ///
    /// The inductance matrix is assembled upper-triangular only; consumers
    /// call this on their private copy before factoring.
    pub fn mirror_upper_triangle(&mut self) {
        debug_assert_eq!(self.rows, self.cols);
        for i in 0..self.rows {
            for j in (i + 1)..self.cols {
                let v = self.get(i, j);
                self.set(j, i, v);
            }
        }
    }

    /// LU-factor a square matrix with partial pivoting.
    ///
    /// `name` labels the matrix in the [`SurgeError::SingularSystem`] error
    /// raised when a pivot vanishes.
    pub fn factor(&self, name: &'static str) -> Result<LuFactors> {
        debug_assert_eq!(self.rows, self.cols);
        let n = self.rows;
        let mut lu = self.data.clone();
        let mut pivots: Vec<usize> = (0..n).collect();

        for k in 0..n {
            // Find pivot
            let mut max_val = lu[k * n + k].abs();
            let mut max_row = k;
            for i in (k + 1)..n {
                let val = lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_val < 1e-15 {
                return Err(SurgeError::SingularSystem { matrix: name });
            }

            // Swap rows if needed
            if max_row != k {
                pivots.swap(k, max_row);
                for j in 0..n {
                    lu.swap(k * n + j, max_row * n + j);
                }
            }

            // Eliminate
            let pivot = lu[k * n + k];
            for i in (k + 1)..n {
                let factor = lu[i * n + k] / pivot;
                lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    lu[i * n + j] -= factor * lu[k * n + j];
                }
            }
        }

        Ok(LuFactors { lu, pivots, n })
    }
}

/// The LU decomposition of a square matrix, reusable across solves.
#[derive(Debug, Clone)]
pub struct LuFactors {
    lu: Vec<f64>,
    pivots: Vec<usize>,
    n: usize,
}

impl LuFactors {
    /// Solve `A x = b` using the precomputed factors.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        debug_assert_eq!(b.len(), self.n);
        let n = self.n;

        // Apply the pivot permutation to b
        let mut x: Vec<f64> = (0..n).map(|i| b[self.pivots[i]]).collect();

        // Forward substitution (L y = Pb)
        for i in 0..n {
            for j in 0..i {
                x[i] -= self.lu[i * n + j] * x[j];
            }
        }

        // Back substitution (U x = y)
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                x[i] -= self.lu[i * n + j] * x[j];
            }
            x[i] /= self.lu[i * n + i];
        }

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_solve() {
        let m = Matrix::identity(3);
        let lu = m.factor("test").unwrap();
        let x = lu.solve(&[1.0, 2.0, 3.0]);
        assert_eq!(x, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_lu_solve_round_trip() {
        let mut a = Matrix::zeros(3, 3);
        a.set(0, 0, 4.0);
        a.set(0, 1, 1.0);
        a.set(1, 0, 1.0);
        a.set(1, 1, 3.0);
        a.set(1, 2, 1.0);
        a.set(2, 1, 1.0);
        a.set(2, 2, 2.0);

        let x_expected = [1.0, -2.0, 3.0];
        let b = a.mul_vec(&x_expected);
        let x = a.factor("test").unwrap().solve(&b);
        for (xi, ei) in x.iter().zip(&x_expected) {
            assert!((xi - ei).abs() < 1e-12, "x = {x:?}");
        }
    }

    #[test]
    fn test_singular_matrix_detected() {
        let mut a = Matrix::zeros(2, 2);
        a.set(0, 0, 1.0);
        // Row 1 is all zeros.
        let result = a.factor("capacitance");
        assert!(matches!(
            result,
            Err(SurgeError::SingularSystem {
                matrix: "capacitance"
            })
        ));
    }

    #[test]
    fn test_mul_mat_against_known_product() {
        let mut a = Matrix::zeros(2, 3);
        let mut b = Matrix::zeros(3, 2);
        for j in 0..3 {
            a.set(0, j, (j + 1) as f64);
            a.set(1, j, (j + 4) as f64);
            b.set(j, 0, 1.0);
            b.set(j, 1, -1.0);
        }
        let p = a.mul_mat(&b);
        assert_eq!(p.get(0, 0), 6.0);
        assert_eq!(p.get(1, 0), 15.0);
        assert_eq!(p.get(0, 1), -6.0);
    }

    #[test]
    fn test_mirror_upper_triangle() {
        let mut m = Matrix::zeros(2, 2);
        m.set(0, 0, 1.0);
        m.set(0, 1, 0.5);
        m.set(1, 1, 2.0);
        m.mirror_upper_triangle();
        assert_eq!(m.get(1, 0), 0.5);
    }

    #[test]
    fn test_constraint_row() {
        let mut m = Matrix::zeros(3, 3);
        for i in 0..3 {
            for j in 0..3 {
                m.set(i, j, 9.0);
            }
        }
        m.set_unit_row(1);
        assert_eq!(m.row(1), &[0.0, 1.0, 0.0]);
    }
}
