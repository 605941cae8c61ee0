/// A trait for vector-like containers holding evaluation points and results.
///
/// Every evaluation entry point reads its inputs and writes its in-place outputs through
/// this trait, so plain slices, `Vec`s, fixed-size arrays and (behind the corresponding
/// features) `ndarray` and `nalgebra` vectors can be passed interchangeably.
///
/// # Examples
///
/// ```rust
/// use polyplan::prelude::Vector;
///
/// let mut vec = vec![1.0, 2.0, 3.0];
/// vec.as_mut_slice()[0] = 4.0;
/// assert_eq!(Vector::as_slice(&vec), &[4.0, 2.0, 3.0]);
/// assert_eq!(Vector::len(&[1.0, 2.0]), 2);
/// ```
pub trait Vector<T> {
    /// Returns a reference to the vector's data as a slice.
    fn as_slice(&self) -> &[T];

    /// Returns a mutable reference to the vector's data as a slice.
    fn as_mut_slice(&mut self) -> &mut [T];

    /// Returns the length of the vector.
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Checks if the vector is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Vector<T> for [T] {
    fn as_slice(&self) -> &[T] {
        self
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        self
    }
}

impl<T> Vector<T> for Vec<T> {
    fn as_slice(&self) -> &[T] {
        self
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        self
    }
}

/// Implementation of Vector trait for fixed-size arrays.
///
/// # Examples
///
/// ```rust
/// use polyplan::prelude::Vector;
///
/// let mut arr = [0.0; 3];
/// Vector::as_mut_slice(&mut arr)[1] = 1.0;
/// assert_eq!(arr, [0.0, 1.0, 0.0]);
/// ```
impl<T, const N: usize> Vector<T> for [T; N] {
    fn as_slice(&self) -> &[T] {
        &self[..]
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self[..]
    }

    fn len(&self) -> usize {
        N
    }
}

/// Implementation of Vector trait for ndarray's Array1<T>.
///
/// The array must use standard (contiguous) layout, which every freshly allocated
/// `Array1` does.
#[cfg(feature = "ndarray")]
impl<T> Vector<T> for ndarray::Array1<T> {
    fn as_slice(&self) -> &[T] {
        ndarray::Array1::as_slice(self).expect("ndarray vector must be contiguous")
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        self.as_slice_mut()
            .expect("ndarray vector must be contiguous")
    }
}

/// Implementation of Vector trait for nalgebra's DVector<T>.
#[cfg(feature = "nalgebra")]
impl<T: nalgebra::Scalar> Vector<T> for nalgebra::DVector<T> {
    fn as_slice(&self) -> &[T] {
        nalgebra::DVector::as_slice(self)
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        nalgebra::DVector::as_mut_slice(self)
    }
}
