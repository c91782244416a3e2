//! Staging of LHS row blocks into dense buffers, plus the workspace that
//! backs them.

use std::collections::TryReserveError;
use std::mem::size_of;

use vla_vec::{Grouping, VectorUnit};

use super::kernels::load_col_strip;
use crate::matrix::Matrix;

/// Granularity to which workspace allocations are rounded, in bytes.
pub(super) const PAGE_SIZE: usize = 4096;

/// Copy a row block of `a` into `panel`, column by column.
///
/// `a` has one row per staged output row and one column per depth step.
/// Element `(r, k)` lands at `panel[k * rows + r]`, so each depth step
/// occupies one contiguous group of `rows` values.
///
/// The copy is software-pipelined: the strip for depth step `k` is loaded
/// before the strip for step `k - 1` is stored, keeping a load in flight
/// across the stride boundary of a transposed source.
pub(super) fn pack_row_panel(vu: &VectorUnit, a: Matrix, panel: &mut [f32]) {
    let rows = a.rows();
    let depth = a.cols();
    if depth == 0 {
        return;
    }

    let mut r = 0;
    while r < rows {
        let vl = vu.vl(rows - r, Grouping::M4);
        let mut fragment = load_col_strip(a, r, 0, vl);
        for k in 1..depth {
            let next = load_col_strip(a, r, k, vl);
            fragment.store(&mut panel[(k - 1) * rows + r..][..vl]);
            fragment = next;
        }
        fragment.store(&mut panel[(depth - 1) * rows + r..][..vl]);
        r += vl;
    }
}

/// Copy a row block of `a` into `tile` with the same layout as
/// [`pack_row_panel`], walking depth-major rather than row-major.
///
/// Used by the reordering strategy, whose staged width tracks the widest
/// strip the vector unit can produce instead of a fixed row count.
pub(super) fn reorder_tile(vu: &VectorUnit, a: Matrix, tile: &mut [f32]) {
    let rows = a.rows();
    let depth = a.cols();
    for k in 0..depth {
        let mut r = 0;
        while r < rows {
            let vl = vu.vl(rows - r, Grouping::M8);
            load_col_strip(a, r, k, vl).store(&mut tile[k * rows + r..][..vl]);
            r += vl;
        }
    }
}

/// Growable buffer backing staged LHS panels.
///
/// Capacity requests are rounded up to [`PAGE_SIZE`] and allocation failure
/// is reported rather than aborting, so callers can fall back to reading the
/// LHS in place.
pub(super) struct Workspace {
    buf: Vec<f32>,
}

impl Workspace {
    pub fn new() -> Workspace {
        Workspace { buf: Vec::new() }
    }

    /// Ensure the workspace holds at least `len` zero-initialized floats.
    pub fn reserve(&mut self, len: usize) -> Result<(), TryReserveError> {
        let padded = (len * size_of::<f32>()).next_multiple_of(PAGE_SIZE) / size_of::<f32>();
        if padded > self.buf.len() {
            self.buf.try_reserve_exact(padded - self.buf.len())?;
            self.buf.resize(padded, 0.);
        }
        Ok(())
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.buf
    }
}

#[cfg(test)]
mod tests {
    use vla_vec::VectorUnit;

    use super::{pack_row_panel, reorder_tile, Workspace};
    use crate::matrix::Matrix;

    fn test_data(len: usize) -> Vec<f32> {
        (0..len).map(|x| x as f32).collect()
    }

    fn expected_panel(a: Matrix) -> Vec<f32> {
        let mut panel = vec![0.; a.rows() * a.cols()];
        for k in 0..a.cols() {
            for r in 0..a.rows() {
                panel[k * a.rows() + r] = a[[r, k]];
            }
        }
        panel
    }

    #[test]
    fn test_pack_row_panel() {
        let rows = 16;
        let depth = 5;
        let data = test_data(rows * depth);
        let a = Matrix::from_slice(&data, rows, depth, None);

        let mut panel = vec![0.; rows * depth];
        pack_row_panel(&VectorUnit::new(), a, &mut panel);
        assert_eq!(panel, expected_panel(a));
    }

    #[test]
    fn test_pack_row_panel_transposed() {
        // A transposed source has a row stride > 1, so strips are gathered
        // with strided loads.
        let rows = 16;
        let depth = 3;
        let data = test_data(rows * depth);
        let a = Matrix::from_slice(&data, depth, rows, None).transposed();

        let mut panel = vec![0.; rows * depth];
        pack_row_panel(&VectorUnit::new(), a, &mut panel);
        assert_eq!(panel, expected_panel(a));
    }

    #[test]
    fn test_pack_row_panel_multiple_strips() {
        // With a 64-bit vector unit an M4 strip covers 4 floats, so a
        // 16-row block takes several strips.
        let rows = 16;
        let depth = 4;
        let data = test_data(rows * depth);
        let a = Matrix::from_slice(&data, rows, depth, None);

        let mut panel = vec![0.; rows * depth];
        pack_row_panel(&VectorUnit::with_vlen(64).unwrap(), a, &mut panel);
        assert_eq!(panel, expected_panel(a));
    }

    #[test]
    fn test_pack_row_panel_zero_depth() {
        let a = Matrix::from_slice(&[], 4, 0, None);
        let mut panel = [];
        pack_row_panel(&VectorUnit::new(), a, &mut panel);
    }

    #[test]
    fn test_reorder_tile() {
        let rows = 11;
        let depth = 6;
        let data = test_data(rows * depth);
        let a = Matrix::from_slice(&data, rows, depth, None);

        let mut tile = vec![0.; rows * depth];
        reorder_tile(&VectorUnit::new(), a, &mut tile);
        assert_eq!(tile, expected_panel(a));
    }

    #[test]
    fn test_workspace_rounds_to_page() {
        let mut ws = Workspace::new();
        ws.reserve(0).unwrap();
        assert_eq!(ws.as_mut_slice().len(), 0);

        // One page holds 1024 floats.
        ws.reserve(1).unwrap();
        assert_eq!(ws.as_mut_slice().len(), 1024);

        ws.reserve(1024).unwrap();
        assert_eq!(ws.as_mut_slice().len(), 1024);

        ws.reserve(1025).unwrap();
        assert_eq!(ws.as_mut_slice().len(), 2048);
    }
}
