//! Micro-kernels performing the innermost outer-product accumulation.
//!
//! One generic kernel parameterized over the height replaces a per-variant
//! family: all heights and register groupings share the same loop structure
//! and differ only in the number of live accumulators and the strip width
//! requested from the vector unit.

use std::ops::Range;

use vla_vec::{Grouping, VectorUnit, Vf32};

use crate::matrix::{Matrix, MatrixMut};

/// LHS operand for one row block of a [`kernel`] call.
#[derive(Clone, Copy)]
pub(super) enum Lhs<'a> {
    /// Rows staged into a dense panel holding one group of `width` values
    /// per depth step.
    Packed { panel: &'a [f32], width: usize },

    /// Rows read in place from the source view, contiguously or strided
    /// depending on its layout.
    View(Matrix<'a>),
}

/// Load `len` elements of column `col` of `a`, starting at `row`.
pub(super) fn load_col_strip(a: Matrix, row: usize, col: usize, len: usize) -> Vf32 {
    let offset = row * a.row_stride() + col * a.col_stride();
    if a.row_stride() == 1 {
        Vf32::load(&a.data()[offset..offset + len])
    } else {
        Vf32::load_strided(&a.data()[offset..], a.row_stride(), len)
    }
}

/// Write `v` to column `col` of `out` starting at `row`, either overwriting
/// the existing values or accumulating into them.
///
/// Output columns must be contiguous.
pub(super) fn store_col_strip(
    out: &mut MatrixMut,
    row: usize,
    col: usize,
    v: Vf32,
    accumulate: bool,
) {
    debug_assert_eq!(out.row_stride(), 1);
    let offset = row + col * out.col_stride();
    let dest = &mut out.data()[offset..offset + v.len()];
    if accumulate {
        Vf32::load(dest).add(v).store(dest);
    } else {
        v.store(dest);
    }
}

/// Compute `out = lhs * rhs` (or `out += lhs * rhs` when `accumulate` is
/// set) for one row block and one column group.
///
/// `out` has as many columns as the micro-kernel height. The kernel keeps
/// one vector accumulator per output column and performs a rank-1 update per
/// depth step: a strip of LHS rows is loaded once, then fused into every
/// accumulator against a broadcast RHS scalar.
///
/// The accumulation order seen by each output element is the plain depth
/// order, independent of the grouping, strip width or staging in use, so
/// every variant produces identical bits for the same logical inputs.
pub(super) fn kernel(
    vu: &VectorUnit,
    grouping: Grouping,
    lhs: Lhs,
    rhs: Matrix,
    out: &mut MatrixMut,
    accumulate: bool,
) {
    match out.cols() {
        2 => tile::<2>(vu, grouping, lhs, rhs, out, accumulate),
        4 => tile::<4>(vu, grouping, lhs, rhs, out, accumulate),
        8 => tile::<8>(vu, grouping, lhs, rhs, out, accumulate),
        16 => tile::<16>(vu, grouping, lhs, rhs, out, accumulate),
        other => unreachable!("unsupported micro-kernel height {}", other),
    }
}

fn tile<const H: usize>(
    vu: &VectorUnit,
    grouping: Grouping,
    lhs: Lhs,
    rhs: Matrix,
    out: &mut MatrixMut,
    accumulate: bool,
) {
    let rows = out.rows();
    let depth = rhs.rows();
    debug_assert_eq!(out.cols(), H);

    let mut i = 0;
    while i < rows {
        let vl = vu.vl(rows - i, grouping);
        let mut acc = [Vf32::zero(vl); H];
        for k in 0..depth {
            let va = match lhs {
                Lhs::Packed { panel, width } => {
                    Vf32::load(&panel[k * width + i..k * width + i + vl])
                }
                Lhs::View(a) => load_col_strip(a, i, k, vl),
            };
            for h in 0..H {
                acc[h] = acc[h].mul_add_scalar(rhs[[k, h]], va);
            }
        }
        for h in 0..H {
            store_col_strip(out, i, h, acc[h], accumulate);
        }
        i += vl;
    }
}

/// Fallback for output rows or columns not covered by a full micro-kernel
/// shape.
///
/// Processes the given row and column ranges with a single accumulator per
/// strip, always reading the LHS in place. Strips run at the `M4` grouping;
/// with only one live accumulator there is no register pressure to force a
/// narrower choice.
pub(super) fn tail(
    vu: &VectorUnit,
    a: Matrix,
    rhs: Matrix,
    out: &mut MatrixMut,
    rows: Range<usize>,
    cols: Range<usize>,
    accumulate: bool,
) {
    let depth = a.cols();
    for j in cols {
        let mut i = rows.start;
        while i < rows.end {
            let vl = vu.vl(rows.end - i, Grouping::M4);
            let mut acc = Vf32::zero(vl);
            for k in 0..depth {
                acc = acc.mul_add_scalar(rhs[[k, j]], load_col_strip(a, i, k, vl));
            }
            store_col_strip(out, i, j, acc, accumulate);
            i += vl;
        }
    }
}
