//! Single precision matrix multiplication for a modeled vector-length
//! agnostic unit.
//!
//! This module provides a classic blocked GEMM: the output is divided into
//! cache-sized blocks, each computed by a grid of micro-kernel calls which
//! keep a group of vector accumulators live while streaming strips of the
//! LHS. Strip widths come from the vector unit at runtime, so the same code
//! serves every supported register width.

use std::ops::Range;
use std::time::Duration;

use vla_vec::{Grouping, VectorUnit, DEFAULT_VLEN};

use crate::iter_util::{range_chunks, MaybeParIter};
use crate::matrix::{Matrix, MatrixMut};
use crate::timer::Timer;

mod errors;
mod kernels;
mod packing;

pub use errors::GemmError;
use kernels::{kernel, tail, Lhs};
use packing::{pack_row_panel, reorder_tile, Workspace};

/// Micro-kernel heights accepted by [`GemmOptions::height`].
///
/// The height is the number of output columns computed per kernel call, and
/// with it the number of vector accumulators the kernel keeps live.
pub const SUPPORTED_HEIGHTS: [usize; 4] = [2, 4, 8, 16];

/// Rows of the output processed per main-grid step by the fixed-width
/// staging strategies. Staged panels hold this many values per depth step.
const ROW_BLOCK: usize = 16;

/// Cache blocking parameters, in elements.
///
/// The defaults suit a typical L2 of a few hundred KiB. Smaller blocks
/// mainly exist for tests; the blocked loops behave the same at any size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockSizes {
    /// Rows of the LHS (and output) per block. An `m x k` block of the LHS
    /// should fit in the outer-level cache.
    pub m: usize,
    /// Columns of the RHS (and output) per block.
    pub n: usize,
    /// Depth steps per block. Output values are written on the first depth
    /// block and accumulated in memory on the rest.
    pub k: usize,
}

impl Default for BlockSizes {
    fn default() -> Self {
        BlockSizes {
            m: 4032,
            n: 256,
            k: 256,
        }
    }
}

/// Strategy for staging LHS row blocks into contiguous storage before the
/// micro-kernels stream them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Packing {
    /// Stage row panels when the output is wide enough for the copy to
    /// amortize, otherwise read the LHS in place.
    #[default]
    Auto,
    /// Always stage fixed-width row panels.
    Panel,
    /// Never stage. Kernels read the LHS in place, strided if transposed.
    Direct,
    /// Stage tiles as wide as the vector unit's widest strip, refreshed at
    /// each row-block boundary.
    Reorder,
}

/// Configuration for a [`GemmExecutor`].
#[derive(Clone, Debug)]
pub struct GemmOptions {
    /// Vector register width in bits. Must be a power of two between
    /// [`vla_vec::VLEN_MIN`] and [`vla_vec::VLEN_MAX`].
    pub vlen_bits: usize,

    /// Data cache size used to pick a default micro-kernel height.
    pub l1_cache_bytes: usize,

    /// Micro-kernel height, one of [`SUPPORTED_HEIGHTS`], or `None` to
    /// choose from the cache size and vector width.
    pub height: Option<usize>,

    /// Register grouping used by the main-grid kernels.
    pub grouping: Grouping,

    /// LHS staging strategy.
    pub packing: Packing,

    /// Cache blocking parameters.
    pub block_sizes: BlockSizes,

    /// Log a summary line to stderr after each multiplication.
    pub verbose: bool,
}

impl Default for GemmOptions {
    fn default() -> Self {
        GemmOptions {
            vlen_bits: DEFAULT_VLEN,
            l1_cache_bytes: 32 * 1024,
            height: None,
            grouping: Grouping::M1,
            packing: Packing::Auto,
            block_sizes: BlockSizes::default(),
            verbose: false,
        }
    }
}

/// Staging strategy resolved for one multiplication.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Staging {
    Direct,
    Panel,
    Reorder,
}

/// Per-call execution parameters shared by the blocked loops.
#[derive(Clone, Copy)]
struct Plan {
    grouping: Grouping,
    height: usize,
    staging: Staging,
    blocks: BlockSizes,
}

/// Pick a micro-kernel height from the cache size and the widest strip the
/// vector unit can produce.
///
/// Taller kernels reuse each LHS strip across more output columns, but keep
/// a `k x height` slice of the RHS resident while a row block is processed.
/// The height is capped at the widest strip so a narrow unit is not asked to
/// fill more accumulator groups than it can usefully overlap.
fn auto_height(l1_cache_bytes: usize, max_vl: usize) -> usize {
    let by_cache = if l1_cache_bytes >= 128 * 1024 {
        16
    } else if l1_cache_bytes >= 64 * 1024 {
        8
    } else if l1_cache_bytes >= 32 * 1024 {
        4
    } else {
        2
    };
    by_cache.min(max_vl.clamp(2, 16))
}

/// Return true if staging LHS row blocks pays for itself.
///
/// A staged panel is reused for every column group of the block, so the copy
/// amortizes once a worker owns enough column groups.
fn pack_worthwhile(cols: usize, height: usize) -> bool {
    cols / height > 3
}

/// Decomposition of the output and depth axes into per-worker ranges.
///
/// Splitting is pure range arithmetic over the axis lengths. The arithmetic
/// supports any worker count, but the dispatch below always runs a single
/// worker: splitting the depth axis would additionally need per-worker
/// partial outputs to combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct WorkerGrid {
    m: usize,
    n: usize,
    k: usize,
}

impl Default for WorkerGrid {
    fn default() -> Self {
        WorkerGrid { m: 1, n: 1, k: 1 }
    }
}

impl WorkerGrid {
    fn count(&self) -> usize {
        self.m * self.n * self.k
    }

    /// Map a flat worker index to its grid coordinates.
    fn id(&self, index: usize) -> WorkerId {
        let mn = self.m * self.n;
        WorkerId {
            m: index % mn % self.m,
            n: index % mn / self.m,
            k: index / mn,
        }
    }
}

/// Coordinates of one worker within a [`WorkerGrid`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct WorkerId {
    m: usize,
    n: usize,
    k: usize,
}

/// Return the sub-range of `0..total` owned by worker `index` of `parts`.
///
/// Ranges are contiguous, disjoint and cover `0..total`. When `total` does
/// not divide evenly the trailing workers get shorter, possibly empty,
/// ranges.
fn worker_range(total: usize, parts: usize, index: usize) -> Range<usize> {
    let block = total.div_ceil(parts);
    (block * index).min(total)..(block * (index + 1)).min(total)
}

/// Executes single precision matrix multiplications (GEMM).
///
/// This computes `C = op_a(A) * op_b(B)` where `op` is an optional
/// transpose. An executor resolves its configuration once and can then run
/// any number of multiplications.
pub struct GemmExecutor {
    vu: VectorUnit,
    height: usize,
    grouping: Grouping,
    packing: Packing,
    blocks: BlockSizes,
    verbose: bool,
}

impl GemmExecutor {
    /// Create an executor with default options.
    pub fn new() -> GemmExecutor {
        // The default options are always valid.
        Self::with_options(GemmOptions::default()).unwrap()
    }

    /// Create an executor, validating `options`.
    pub fn with_options(options: GemmOptions) -> Result<GemmExecutor, GemmError> {
        let vu = VectorUnit::with_vlen(options.vlen_bits)
            .map_err(|_| GemmError::UnsupportedVectorLength)?;
        let height = match options.height {
            Some(height) => {
                if !SUPPORTED_HEIGHTS.contains(&height) {
                    return Err(GemmError::UnsupportedHeight);
                }
                height
            }
            None => auto_height(options.l1_cache_bytes, vu.max_vl(options.grouping)),
        };
        let BlockSizes { m, n, k } = options.block_sizes;
        if m == 0 || n == 0 || k == 0 {
            return Err(GemmError::InvalidBlockSize);
        }
        Ok(GemmExecutor {
            vu,
            height,
            grouping: options.grouping,
            packing: options.packing,
            blocks: options.block_sizes,
            verbose: options.verbose,
        })
    }

    /// Return the micro-kernel height in use.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Return the vector register width in bits.
    pub fn vlen_bits(&self) -> usize {
        self.vu.vlen_bits()
    }

    /// Compute `c = op_a(a) * op_b(b)` where `op` transposes its argument if
    /// the corresponding flag is set.
    ///
    /// All matrices are square with size `n` and stored in row-major order.
    /// The output is fully overwritten, so `c` does not need to be
    /// initialized.
    pub fn gemm(
        &self,
        trans_a: bool,
        trans_b: bool,
        a: &[f32],
        b: &[f32],
        c: &mut [f32],
        n: usize,
    ) -> Result<(), GemmError> {
        let len = n * n;
        if a.len() < len || b.len() < len {
            return Err(GemmError::InputNotLargeEnough);
        }
        if c.len() < len {
            return Err(GemmError::OutputNotLargeEnough);
        }
        if n == 0 {
            return Ok(());
        }
        if self.packing == Packing::Reorder && self.height > n {
            return Err(GemmError::HeightExceedsSize);
        }

        // The kernels accumulate down contiguous columns of a column-major
        // output, so compute C^T = op_b(B)^T * op_a(A)^T by swapping the
        // operands. Viewing a row-major buffer with swapped strides is
        // itself a transpose, so each operand view starts out transposed and
        // the caller's transpose flag, if set, transposes it back.
        let mut lhs = Matrix::from_slice(&b[..len], n, n, Some((1, n)));
        if trans_b {
            lhs = lhs.transposed();
        }
        let mut rhs = Matrix::from_slice(&a[..len], n, n, Some((1, n)));
        if trans_a {
            rhs = rhs.transposed();
        }

        let grid = WorkerGrid::default();
        let mut staging = match self.packing {
            Packing::Auto => {
                if pack_worthwhile(n.div_ceil(grid.n), self.height) {
                    Staging::Panel
                } else {
                    Staging::Direct
                }
            }
            Packing::Panel => Staging::Panel,
            Packing::Direct => Staging::Direct,
            Packing::Reorder => Staging::Reorder,
        };
        let staging_width = match staging {
            Staging::Direct => 0,
            Staging::Panel => ROW_BLOCK,
            Staging::Reorder => self.vu.max_vl(self.grouping).min(n),
        };

        let mut workspaces: Vec<Workspace> =
            (0..grid.count()).map(|_| Workspace::new()).collect();
        if staging_width > 0 {
            let reserved = workspaces
                .iter_mut()
                .try_for_each(|ws| ws.reserve(n * staging_width));
            if reserved.is_err() {
                // Allocation failure disables staging; the kernels read the
                // LHS in place instead.
                staging = Staging::Direct;
            }
        }

        let plan = Plan {
            grouping: self.grouping,
            height: self.height,
            staging,
            blocks: self.blocks,
        };

        let mut timer = Timer::new();
        timer.start();

        // Workers that split the N axis own disjoint, contiguous column
        // ranges of the column-major output.
        let col_block = n.div_ceil(grid.n);
        let jobs: Vec<_> = c[..len]
            .chunks_mut(col_block * n)
            .zip(workspaces.iter_mut())
            .enumerate()
            .collect();
        jobs.maybe_par_iter(grid.count() > 1)
            .for_each(|(index, (chunk, workspace))| {
                let id = grid.id(index);
                let rows = worker_range(n, grid.m, id.m);
                let cols = worker_range(n, grid.n, id.n);
                let depth = worker_range(n, grid.k, id.k);
                let mut c_cols = MatrixMut::from_slice(chunk, n, cols.len(), Some((1, n)));
                let c_block = c_cols.slice_mut(rows.clone(), 0..cols.len());
                gemm_blocked(
                    &self.vu,
                    &plan,
                    lhs.slice(rows, depth.clone()),
                    rhs.slice(depth, cols),
                    c_block,
                    workspace.as_mut_slice(),
                );
            });

        timer.end();
        if self.verbose {
            eprintln!(
                "gemm n={} height={} grouping={:?} staging={:?} elapsed={:.3}ms",
                n,
                self.height,
                self.grouping,
                staging,
                timer.elapsed_ms()
            );
        }
        Ok(())
    }

    /// Run [`gemm`](Self::gemm) and return the elapsed wall-clock time.
    pub fn timed_gemm(
        &self,
        trans_a: bool,
        trans_b: bool,
        a: &[f32],
        b: &[f32],
        c: &mut [f32],
        n: usize,
    ) -> Result<Duration, GemmError> {
        let mut timer = Timer::new();
        timer.start();
        self.gemm(trans_a, trans_b, a, b, c, n)?;
        timer.end();
        Ok(timer.elapsed_duration())
    }
}

impl Default for GemmExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute `c = op_a(a) * op_b(b)` using a default-configured executor.
///
/// See [`GemmExecutor::gemm`].
pub fn gemm(
    trans_a: bool,
    trans_b: bool,
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    n: usize,
) -> Result<(), GemmError> {
    GemmExecutor::new().gemm(trans_a, trans_b, a, b, c, n)
}

/// Multiply `lhs` by `rhs` into `c`, one cache block at a time.
///
/// Inputs are column-major views and `c` must have contiguous columns.
/// Blocks walk the depth axis outermost so each staged LHS block is consumed
/// by every column block before the workspace is refilled.
fn gemm_blocked(
    vu: &VectorUnit,
    plan: &Plan,
    lhs: Matrix,
    rhs: Matrix,
    mut c: MatrixMut,
    workspace: &mut [f32],
) {
    let m = lhs.rows();
    let cols = rhs.cols();
    let depth = lhs.cols();
    debug_assert_eq!(depth, rhs.rows());

    if m == 0 || cols == 0 {
        return;
    }
    if depth == 0 {
        // The sum over an empty depth axis is zero everywhere.
        for j in 0..cols {
            for i in 0..m {
                c[[i, j]] = 0.;
            }
        }
        return;
    }

    for k_block in range_chunks(0..depth, plan.blocks.k) {
        // Output values only exist once the first depth block has been
        // written, so later blocks accumulate instead of overwriting.
        let accumulate = k_block.start > 0;
        for m_block in range_chunks(0..m, plan.blocks.m) {
            let a_block = lhs.slice(m_block.clone(), k_block.clone());
            for n_block in range_chunks(0..cols, plan.blocks.n) {
                let b_block = rhs.slice(k_block.clone(), n_block.clone());
                let c_block = c.slice_mut(m_block.clone(), n_block.clone());
                compute_block(vu, plan, a_block, b_block, c_block, accumulate, workspace);
            }
        }
    }
}

/// Compute one cache block: a main grid of micro-kernel calls plus tail
/// strips for the rows and columns the grid does not cover.
fn compute_block(
    vu: &VectorUnit,
    plan: &Plan,
    a: Matrix,
    b: Matrix,
    mut c: MatrixMut,
    accumulate: bool,
    workspace: &mut [f32],
) {
    let mb = a.rows();
    let nb = b.cols();
    let kb = a.cols();
    let height = plan.height;

    let row_block = match plan.staging {
        Staging::Reorder => vu.max_vl(plan.grouping).min(mb),
        _ => ROW_BLOCK,
    };
    let mu = mb - mb % row_block;
    let nu = nb - nb % height;

    for i in (0..mu).step_by(row_block) {
        let rows = i..i + row_block;
        let a_rows = a.slice(rows.clone(), 0..kb);
        for j in (0..nu).step_by(height) {
            let lhs = match plan.staging {
                Staging::Direct => Lhs::View(a_rows),
                Staging::Panel => {
                    if j == 0 {
                        pack_row_panel(vu, a_rows, &mut workspace[..kb * ROW_BLOCK]);
                    }
                    Lhs::Packed {
                        panel: &workspace[..kb * ROW_BLOCK],
                        width: ROW_BLOCK,
                    }
                }
                Staging::Reorder => {
                    if j == 0 {
                        reorder_tile(vu, a_rows, &mut workspace[..kb * row_block]);
                    }
                    Lhs::Packed {
                        panel: &workspace[..kb * row_block],
                        width: row_block,
                    }
                }
            };
            let mut c_tile = c.slice_mut(rows.clone(), j..j + height);
            let b_cols = b.slice(0..kb, j..j + height);
            kernel(vu, plan.grouping, lhs, b_cols, &mut c_tile, accumulate);
        }
    }

    // Trailing columns over all rows, then trailing rows over the remaining
    // columns.
    tail(vu, a, b, &mut c, 0..mb, nu..nb, accumulate);
    tail(vu, a, b, &mut c, mu..mb, 0..nu, accumulate);
}
