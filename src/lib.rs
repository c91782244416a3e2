//! vla-gemm is a single precision matrix multiplication library built on a
//! modeled vector-length agnostic vector unit.
//!
//! The vector unit (see [vla-vec](vla_vec)) hands out strips whose width
//! depends on the configured register size and grouping, the way strip-mined
//! loops behave on vector-length agnostic hardware. All of the blocking,
//! staging and micro-kernel code in this crate is written against that
//! interface, so one binary serves every supported register width and
//! produces bit-identical results on all of them.
//!
//! # Example
//!
//! ```
//! let a = [1., 0., 0., 1.];
//! let b = [1., 2., 3., 4.];
//! let mut c = [0.; 4];
//!
//! // c = a * b, all matrices square and row-major.
//! vla_gemm::gemm(false, false, &a, &b, &mut c, 2).unwrap();
//! assert_eq!(c, b);
//! ```
//!
//! For control over the vector width, micro-kernel shape, staging strategy
//! and cache blocking, construct a [`GemmExecutor`] from [`GemmOptions`] and
//! reuse it across calls.

mod gemm;
mod iter_util;
mod matrix;
pub mod rng;
mod timer;

pub use gemm::{
    gemm, BlockSizes, GemmError, GemmExecutor, GemmOptions, Packing, SUPPORTED_HEIGHTS,
};
pub use matrix::{Matrix, MatrixMut};
pub use timer::Timer;
pub use vla_vec::{Grouping, VectorUnit};
