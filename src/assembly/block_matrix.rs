use crate::error::AssemblyError;
use crate::Real;
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use fxhash::FxHashMap;

/// An accumulating sparse matrix with fixed bounds.
///
/// Entries are stored in a hash map keyed by `(row, col)`. Entries that have been touched
/// stay in the sparsity pattern even if they sum to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockMatrix<T> {
    nrows: usize,
    ncols: usize,
    entries: FxHashMap<(usize, usize), T>,
}

impl<T: Real> BlockMatrix<T> {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            entries: FxHashMap::default(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Changes the bounds of the matrix, dropping entries that fall outside.
    pub fn resize(&mut self, nrows: usize, ncols: usize) {
        self.nrows = nrows;
        self.ncols = ncols;
        self.entries.retain(|&(i, j), _| i < nrows && j < ncols);
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn accumulate(&mut self, row: usize, col: usize, value: T) -> Result<(), AssemblyError> {
        self.check_bounds(row, col)?;
        *self.entries.entry((row, col)).or_insert_with(T::zero) += value;
        Ok(())
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<(), AssemblyError> {
        self.check_bounds(row, col)?;
        self.entries.insert((row, col), value);
        Ok(())
    }

    /// The value at `(row, col)`, zero if the entry was never touched.
    pub fn get(&self, row: usize, col: usize) -> T {
        self.entries.get(&(row, col)).copied().unwrap_or_else(T::zero)
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.entries.contains_key(&(row, col))
    }

    /// Entries as `(row, col, value)` triplets in row-major order.
    pub fn triplets(&self) -> Vec<(usize, usize, T)> {
        let mut triplets: Vec<_> = self
            .entries
            .iter()
            .map(|(&(i, j), &v)| (i, j, v))
            .collect();
        triplets.sort_unstable_by_key(|&(i, j, _)| (i, j));
        triplets
    }

    pub fn to_coo(&self) -> CooMatrix<T> {
        let mut coo = CooMatrix::new(self.nrows, self.ncols);
        for (i, j, v) in self.triplets() {
            coo.push(i, j, v);
        }
        coo
    }

    pub fn to_csr(&self) -> CsrMatrix<T> {
        CsrMatrix::from(&self.to_coo())
    }

    pub fn to_dense(&self) -> DMatrix<T> {
        DMatrix::from(&self.to_coo())
    }

    fn check_bounds(&self, row: usize, col: usize) -> Result<(), AssemblyError> {
        if row < self.nrows && col < self.ncols {
            Ok(())
        } else {
            Err(AssemblyError::OutOfBounds {
                row,
                col,
                nrows: self.nrows,
                ncols: self.ncols,
            })
        }
    }
}
