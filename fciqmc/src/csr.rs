//! Compressed sparse row kernels for the deterministic companion.

use crate::error::{Error, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// CSR matrix, optionally symmetric-by-convention (one triangle stored).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    values: Vec<f64>,
    col_ind: Vec<usize>,
    row_ptr: Vec<usize>,
    symmetric: bool,
}

impl CsrMatrix {
    /// Builds a matrix from raw CSR arrays, validating the storage
    /// invariants.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `row_ptr` does not bracket the
    /// non-zeros, a column index is out of range or out of order, or
    /// symmetric storage strays below the diagonal or off the square.
    pub fn new(
        nrows: usize,
        ncols: usize,
        values: Vec<f64>,
        col_ind: Vec<usize>,
        row_ptr: Vec<usize>,
        symmetric: bool,
    ) -> Result<Self> {
        if values.len() != col_ind.len() {
            return Err(Error::Config("csr: values and col_ind lengths differ".into()));
        }
        if row_ptr.len() != nrows + 1 || row_ptr[0] != 0 || row_ptr[nrows] != values.len() {
            return Err(Error::Config("csr: row_ptr does not bracket the non-zeros".into()));
        }
        if symmetric && nrows != ncols {
            return Err(Error::Config("csr: symmetric storage requires a square matrix".into()));
        }
        for i in 0..nrows {
            let (lo, hi) = (row_ptr[i], row_ptr[i + 1]);
            if lo > hi {
                return Err(Error::Config("csr: row_ptr must be non-decreasing".into()));
            }
            for idx in lo..hi {
                let j = col_ind[idx];
                if j >= ncols {
                    return Err(Error::Config(format!("csr: column {j} out of range")));
                }
                if idx > lo && col_ind[idx - 1] >= j {
                    return Err(Error::Config(format!(
                        "csr: columns out of order in row {i}"
                    )));
                }
                if symmetric && j < i {
                    return Err(Error::Config(format!(
                        "csr: symmetric storage holds one triangle, found ({i}, {j})"
                    )));
                }
            }
        }
        Ok(Self {
            nrows,
            ncols,
            values,
            col_ind,
            row_ptr,
            symmetric,
        })
    }

    /// Builds a matrix from `(row, col, value)` triplets, summing duplicates.
    ///
    /// # Errors
    ///
    /// Returns a configuration error under the same conditions as
    /// [`Self::new`].
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        mut triplets: Vec<(usize, usize, f64)>,
        symmetric: bool,
    ) -> Result<Self> {
        triplets.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut values = Vec::with_capacity(triplets.len());
        let mut col_ind = Vec::with_capacity(triplets.len());
        let mut row_counts = vec![0_usize; nrows];
        let mut last = None;
        for (row, col, value) in triplets {
            if row >= nrows {
                return Err(Error::Config(format!("csr: row {row} out of range")));
            }
            if last == Some((row, col)) {
                // duplicate coordinate: fold into the previous entry
                *values.last_mut().unwrap_or_else(|| unreachable!()) += value;
            } else {
                values.push(value);
                col_ind.push(col);
                row_counts[row] += 1;
                last = Some((row, col));
            }
        }
        let mut row_ptr = vec![0; nrows + 1];
        for (i, &count) in row_counts.iter().enumerate() {
            row_ptr[i + 1] = row_ptr[i] + count;
        }
        Self::new(nrows, ncols, values, col_ind, row_ptr, symmetric)
    }

    /// Row count.
    #[must_use]
    pub const fn nrows(&self) -> usize {
        self.nrows
    }

    /// Column count.
    #[must_use]
    pub const fn ncols(&self) -> usize {
        self.ncols
    }

    /// Stored non-zero count.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Whether the storage is symmetric-by-convention.
    #[must_use]
    pub const fn symmetric(&self) -> bool {
        self.symmetric
    }

    /// Symmetric matrix-vector product `y = M x` with one triangle stored.
    ///
    /// Rows are distributed over the rayon pool; because every row scatters
    /// into the other triangle's entries of `y`, each worker accumulates into
    /// a thread-private buffer and the buffers are summed in a reduction.
    /// There are no shared-memory scatters.
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless the storage is symmetric.
    ///
    /// # Panics
    ///
    /// Panics if `x` does not match the matrix dimension.
    pub fn symv(&self, x: &[f64]) -> Result<Vec<f64>> {
        if !self.symmetric {
            return Err(Error::Config(
                "csr: symmetric product called on general storage".into(),
            ));
        }
        assert_eq!(x.len(), self.ncols);

        let y = (0..self.nrows)
            .into_par_iter()
            .fold(
                || vec![0.0; self.nrows],
                |mut acc, i| {
                    let mut rowx = 0.0;
                    for idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                        let j = self.col_ind[idx];
                        let v = self.values[idx];
                        // stored (i, j) contributes to y[j] directly and,
                        // off the diagonal, to y[i] through the transpose
                        acc[j] += v * x[i];
                        if j != i {
                            rowx += v * x[j];
                        }
                    }
                    acc[i] += rowx;
                    acc
                },
            )
            .reduce(
                || vec![0.0; self.nrows],
                |mut a, b| {
                    for (ai, bi) in a.iter_mut().zip(b) {
                        *ai += bi;
                    }
                    a
                },
            );
        Ok(y)
    }

    /// General matrix-vector product `y = M x`, single-threaded.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the storage is symmetric; use
    /// [`Self::symv`] there instead.
    ///
    /// # Panics
    ///
    /// Panics if `x` does not match the matrix dimension.
    pub fn gemv(&self, x: &[f64]) -> Result<Vec<f64>> {
        if self.symmetric {
            return Err(Error::Config(
                "csr: general product called on symmetric storage".into(),
            ));
        }
        assert_eq!(x.len(), self.ncols);
        Ok((0..self.nrows)
            .map(|i| self.row_dot(x, i))
            .collect())
    }

    /// Single row of the general product.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the storage is symmetric.
    ///
    /// # Panics
    ///
    /// Panics if `x` or `row` is out of range.
    pub fn gemv_row(&self, x: &[f64], row: usize) -> Result<f64> {
        if self.symmetric {
            return Err(Error::Config(
                "csr: general product called on symmetric storage".into(),
            ));
        }
        assert_eq!(x.len(), self.ncols);
        assert!(row < self.nrows);
        Ok(self.row_dot(x, row))
    }

    fn row_dot(&self, x: &[f64], i: usize) -> f64 {
        (self.row_ptr[i]..self.row_ptr[i + 1])
            .map(|idx| self.values[idx] * x[self.col_ind[idx]])
            .sum()
    }
}
