use std::iter::zip;
use std::ops::{Index, IndexMut, Range};

/// Describes how to view a slice as an `N`-dimensional array.
#[derive(Clone, Copy)]
struct Layout<const N: usize> {
    shape: [usize; N],
    strides: [usize; N],
}

impl Layout<2> {
    fn transposed(self) -> Layout<2> {
        Layout {
            shape: [self.shape[1], self.shape[0]],
            strides: [self.strides[1], self.strides[0]],
        }
    }

    fn sliced(self, rows: Range<usize>, cols: Range<usize>) -> (usize, Layout<2>) {
        assert!(rows.end <= self.shape[0] && cols.end <= self.shape[1]);
        let offset = rows.start * self.strides[0] + cols.start * self.strides[1];
        let layout = Layout {
            shape: [rows.len(), cols.len()],
            strides: self.strides,
        };
        (offset, layout)
    }
}

impl<const N: usize> Layout<N> {
    /// Return true if all components of `index` are in-bounds.
    fn index_valid(&self, index: [usize; N]) -> bool {
        let mut valid = true;
        for i in 0..N {
            valid = valid && index[i] < self.shape[i]
        }
        valid
    }

    /// Return the offset in the slice that an index maps to.
    fn offset(&self, index: [usize; N]) -> usize {
        assert!(self.index_valid(index), "Index is out of bounds");
        let mut offset = 0;
        for i in 0..N {
            offset += index[i] * self.strides[i];
        }
        offset
    }

    /// Return the minimum length of slice that can hold every valid index.
    fn min_data_len(&self) -> usize {
        if self.shape.iter().any(|&size| size == 0) {
            return 0;
        }
        let max_offset: usize = zip(self.shape.iter(), self.strides.iter())
            .map(|(size, stride)| (size - 1) * stride)
            .sum();
        max_offset + 1
    }
}

/// Provides a non-owning view of a slice as a matrix.
///
/// The view carries row and column strides, so a logical transpose is just a
/// stride swap ([`transposed`](Matrix::transposed)) and never moves data.
#[derive(Clone, Copy)]
pub struct Matrix<'a, T = f32> {
    data: &'a [T],
    layout: Layout<2>,
}

impl<'a, T> Matrix<'a, T> {
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    pub fn rows(&self) -> usize {
        self.layout.shape[0]
    }

    pub fn cols(&self) -> usize {
        self.layout.shape[1]
    }

    pub fn row_stride(&self) -> usize {
        self.layout.strides[0]
    }

    pub fn col_stride(&self) -> usize {
        self.layout.strides[1]
    }

    /// Return a new view which transposes the columns and rows.
    pub fn transposed(self) -> Matrix<'a, T> {
        Matrix {
            data: self.data,
            layout: self.layout.transposed(),
        }
    }

    /// Return a view of the sub-block covering `rows` and `cols`.
    pub fn slice(&self, rows: Range<usize>, cols: Range<usize>) -> Matrix<'a, T> {
        let (offset, layout) = self.layout.sliced(rows, cols);
        Matrix {
            data: &self.data[offset..],
            layout,
        }
    }

    /// Constructs a Matrix from a slice.
    ///
    /// `strides` specifies the row and column strides or (cols, 1) (ie. row-
    /// major layout) if None.
    ///
    /// Panics if the slice is too short for the dimensions and strides
    /// specified.
    pub fn from_slice(
        data: &'a [T],
        rows: usize,
        cols: usize,
        strides: Option<(usize, usize)>,
    ) -> Matrix<'a, T> {
        let (row_stride, col_stride) = strides.unwrap_or((cols, 1));
        let layout = Layout {
            shape: [rows, cols],
            strides: [row_stride, col_stride],
        };
        assert!(data.len() >= layout.min_data_len(), "Slice is too short");
        Matrix { data, layout }
    }
}

impl<T> Index<[usize; 2]> for Matrix<'_, T> {
    type Output = T;
    fn index(&self, index: [usize; 2]) -> &Self::Output {
        &self.data[self.layout.offset(index)]
    }
}

/// Mutable counterpart of [`Matrix`].
pub struct MatrixMut<'a, T = f32> {
    data: &'a mut [T],
    layout: Layout<2>,
}

impl<'a, T> MatrixMut<'a, T> {
    pub fn data(&mut self) -> &mut [T] {
        self.data
    }

    pub fn rows(&self) -> usize {
        self.layout.shape[0]
    }

    pub fn cols(&self) -> usize {
        self.layout.shape[1]
    }

    pub fn row_stride(&self) -> usize {
        self.layout.strides[0]
    }

    pub fn col_stride(&self) -> usize {
        self.layout.strides[1]
    }

    /// Return a mutable view of the sub-block covering `rows` and `cols`.
    pub fn slice_mut(&mut self, rows: Range<usize>, cols: Range<usize>) -> MatrixMut<'_, T> {
        let (offset, layout) = self.layout.sliced(rows, cols);
        MatrixMut {
            data: &mut self.data[offset..],
            layout,
        }
    }

    /// Constructs a MatrixMut from a slice.
    ///
    /// `strides` specifies the row and column strides or (cols, 1) (ie. row-
    /// major layout) if None.
    ///
    /// Panics if the slice is too short for the dimensions and strides
    /// specified.
    pub fn from_slice(
        data: &'a mut [T],
        rows: usize,
        cols: usize,
        strides: Option<(usize, usize)>,
    ) -> MatrixMut<'a, T> {
        let (row_stride, col_stride) = strides.unwrap_or((cols, 1));
        let layout = Layout {
            shape: [rows, cols],
            strides: [row_stride, col_stride],
        };
        assert!(data.len() >= layout.min_data_len(), "Slice is too short");
        MatrixMut { data, layout }
    }
}

impl<T> Index<[usize; 2]> for MatrixMut<'_, T> {
    type Output = T;
    fn index(&self, index: [usize; 2]) -> &Self::Output {
        &self.data[self.layout.offset(index)]
    }
}

impl<T> IndexMut<[usize; 2]> for MatrixMut<'_, T> {
    fn index_mut(&mut self, index: [usize; 2]) -> &mut Self::Output {
        let offset = self.layout.offset(index);
        &mut self.data[offset]
    }
}

#[cfg(test)]
mod tests {
    use super::{Matrix, MatrixMut};

    #[test]
    fn test_row_major_indexing() {
        let data = [1., 2., 3., 4., 5., 6.];
        let mat = Matrix::from_slice(&data, 2, 3, None);
        assert_eq!(mat[[0, 0]], 1.);
        assert_eq!(mat[[0, 2]], 3.);
        assert_eq!(mat[[1, 1]], 5.);
    }

    #[test]
    fn test_column_major_indexing() {
        // 3x2 column-major view: columns are contiguous.
        let data = [1., 2., 3., 4., 5., 6.];
        let mat = Matrix::from_slice(&data, 3, 2, Some((1, 3)));
        assert_eq!(mat[[0, 0]], 1.);
        assert_eq!(mat[[2, 0]], 3.);
        assert_eq!(mat[[0, 1]], 4.);
    }

    #[test]
    fn test_transposed() {
        let data = [1., 2., 3., 4., 5., 6.];
        let mat = Matrix::from_slice(&data, 2, 3, None).transposed();
        assert_eq!(mat.rows(), 3);
        assert_eq!(mat.cols(), 2);
        for r in 0..3 {
            for c in 0..2 {
                assert_eq!(mat[[r, c]], data[c * 3 + r]);
            }
        }
    }

    #[test]
    fn test_slice_preserves_strides() {
        let data: Vec<f32> = (0..20).map(|x| x as f32).collect();
        let mat = Matrix::from_slice(&data, 4, 5, None);
        let block = mat.slice(1..3, 2..5);
        assert_eq!(block.rows(), 2);
        assert_eq!(block.cols(), 3);
        for r in 0..2 {
            for c in 0..3 {
                assert_eq!(block[[r, c]], mat[[r + 1, c + 2]]);
            }
        }
    }

    #[test]
    fn test_slice_mut_writes_through() {
        let mut data = vec![0.; 9];
        let mut mat = MatrixMut::from_slice(&mut data, 3, 3, None);
        let mut block = mat.slice_mut(1..3, 1..3);
        block[[0, 0]] = 1.;
        block[[1, 1]] = 2.;
        assert_eq!(data[4], 1.);
        assert_eq!(data[8], 2.);
    }

    #[test]
    #[should_panic(expected = "Slice is too short")]
    fn test_from_slice_too_short() {
        let data = [1., 2., 3.];
        Matrix::from_slice(&data, 2, 2, None);
    }
}
