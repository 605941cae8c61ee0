/// A trait for matrix-like containers receiving Jacobians and parameter derivatives.
///
/// Entries are written one at a time through [`set`](Matrix::set), so the trait does not
/// depend on the container's memory layout: row-major `ndarray` arrays and column-major
/// `nalgebra` matrices are filled the same way.
///
/// # Examples
///
/// ```rust
/// use polyplan::prelude::Matrix;
///
/// let mut mat = vec![vec![0.0; 3]; 2];
/// assert_eq!(mat.dims(), (2, 3));
/// mat.set(1, 2, 4.0);
/// assert_eq!(mat[1][2], 4.0);
/// ```
pub trait Matrix<T> {
    /// Returns the dimensions of the matrix as (rows, columns).
    fn dims(&self) -> (usize, usize);

    /// Writes `value` at `(row, col)`.
    fn set(&mut self, row: usize, col: usize, value: T);

    /// Checks that the matrix has exactly the given shape.
    ///
    /// Containers that cannot guarantee a rectangular shape override this to check every
    /// row.
    fn has_shape(&self, rows: usize, cols: usize) -> bool {
        self.dims() == (rows, cols)
    }

    /// Returns the number of entries in row `row`.
    fn row_len(&self, _row: usize) -> usize {
        self.dims().1
    }
}

/// Implementation of Matrix trait for nested vectors, one inner vector per row.
impl<T> Matrix<T> for Vec<Vec<T>> {
    fn dims(&self) -> (usize, usize) {
        (self.len(), self.first().map_or(0, Vec::len))
    }

    fn set(&mut self, row: usize, col: usize, value: T) {
        self[row][col] = value;
    }

    fn has_shape(&self, rows: usize, cols: usize) -> bool {
        self.len() == rows && self.iter().all(|row| row.len() == cols)
    }

    fn row_len(&self, row: usize) -> usize {
        self[row].len()
    }
}

/// Implementation of Matrix trait for ndarray's Array2<T>.
#[cfg(feature = "ndarray")]
impl<T> Matrix<T> for ndarray::Array2<T> {
    fn dims(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    fn set(&mut self, row: usize, col: usize, value: T) {
        self[[row, col]] = value;
    }
}

/// Implementation of Matrix trait for nalgebra's DMatrix<T>.
#[cfg(feature = "nalgebra")]
impl<T: nalgebra::Scalar> Matrix<T> for nalgebra::DMatrix<T> {
    fn dims(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    fn set(&mut self, row: usize, col: usize, value: T) {
        self[(row, col)] = value;
    }
}
