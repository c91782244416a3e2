//! Modeled vector unit for writing vector-length-agnostic f32 kernels.
//!
//! Vector-length-agnostic ISAs expose a register width that is fixed by the
//! hardware but unknown at compile time. Loops are written against a
//! *requested* element count and the unit reports how many lanes each
//! iteration actually covers. This crate models that contract in plain Rust
//! so kernels built on it can be exercised with any register width, then
//! mapped onto real vector intrinsics without changing their structure.
//!
//! The model consists of:
//!
//! - [`VectorUnit`], which fixes the register width and answers strip length
//!   queries.
//! - [`Grouping`], the register grouping factor a loop operates at.
//! - [`Vf32`], a variable-length vector of f32 lanes supporting the loads,
//!   stores and fused multiply-adds that strip-mined kernels need.
//!
//! # Example
//!
//! ```
//! use vla_vec::{Grouping, VectorUnit, Vf32};
//!
//! // Scale a slice by 2 without knowing the register width at compile time.
//! let vu = VectorUnit::new();
//! let mut data = vec![1.; 100];
//! let mut i = 0;
//! while i < data.len() {
//!     let vl = vu.vl(data.len() - i, Grouping::M1);
//!     let v = Vf32::load(&data[i..i + vl]);
//!     Vf32::zero(vl).mul_add_scalar(2., v).store(&mut data[i..i + vl]);
//!     i += vl;
//! }
//! assert!(data.iter().all(|&x| x == 2.));
//! ```

use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Smallest supported vector register width in bits.
pub const VLEN_MIN: usize = 64;

/// Largest supported vector register width in bits.
pub const VLEN_MAX: usize = 1024;

/// Register width assumed by [`VectorUnit::new`].
pub const DEFAULT_VLEN: usize = 256;

/// Maximum number of f32 lanes in a [`Vf32`].
///
/// This is the lane count of the widest grouping at the largest supported
/// register width.
pub const MAX_LANES: usize = VLEN_MAX / 4;

/// Register grouping factor used by a strip-mined loop.
///
/// Grouping registers lets a single operation cover more lanes at the cost
/// of using up the register file faster. A kernel that keeps many live
/// accumulators must use a narrow grouping, while a copy loop with no live
/// state can use the widest. The fractional [`Mf2`](Grouping::Mf2) grouping
/// covers half of one register.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Grouping {
    /// Half of one vector register.
    Mf2,
    /// One vector register.
    #[default]
    M1,
    /// A group of two vector registers.
    M2,
    /// A group of four vector registers.
    M4,
    /// A group of eight vector registers.
    M8,
}

impl Grouping {
    /// All supported grouping factors, from narrowest to widest.
    pub const ALL: [Grouping; 5] = [
        Grouping::Mf2,
        Grouping::M1,
        Grouping::M2,
        Grouping::M4,
        Grouping::M8,
    ];

    /// Return the number of f32 lanes one group spans at a register width of
    /// `vlen_bits`.
    #[inline]
    pub fn lanes(self, vlen_bits: usize) -> usize {
        match self {
            Grouping::Mf2 => vlen_bits / 64,
            Grouping::M1 => vlen_bits / 32,
            Grouping::M2 => vlen_bits / 16,
            Grouping::M4 => vlen_bits / 8,
            Grouping::M8 => vlen_bits / 4,
        }
    }
}

/// Error returned when constructing a [`VectorUnit`] with an unsupported
/// register width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VlenError {
    vlen_bits: usize,
}

impl Display for VlenError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            fmt,
            "unsupported vector length {} bits. VLEN must be a power of two between {} and {}",
            self.vlen_bits, VLEN_MIN, VLEN_MAX
        )
    }
}

impl Error for VlenError {}

/// A vector unit with a fixed register width.
///
/// The unit answers the two questions strip-mined loops ask: how many lanes
/// fit in a group ([`max_vl`](VectorUnit::max_vl)) and how many lanes the
/// next iteration should cover given the remaining element count
/// ([`vl`](VectorUnit::vl)).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VectorUnit {
    vlen_bits: usize,
}

impl VectorUnit {
    /// Create a unit with the default register width of [`DEFAULT_VLEN`]
    /// bits.
    pub fn new() -> VectorUnit {
        VectorUnit {
            vlen_bits: DEFAULT_VLEN,
        }
    }

    /// Create a unit with a register width of `vlen_bits`.
    ///
    /// The width must be a power of two between [`VLEN_MIN`] and
    /// [`VLEN_MAX`]. The lower bound guarantees that every [`Grouping`]
    /// spans at least one f32 lane.
    pub fn with_vlen(vlen_bits: usize) -> Result<VectorUnit, VlenError> {
        if !vlen_bits.is_power_of_two() || !(VLEN_MIN..=VLEN_MAX).contains(&vlen_bits) {
            return Err(VlenError { vlen_bits });
        }
        Ok(VectorUnit { vlen_bits })
    }

    /// Register width in bits.
    #[inline]
    pub fn vlen_bits(&self) -> usize {
        self.vlen_bits
    }

    /// Largest number of lanes a single operation can cover at `grouping`.
    #[inline]
    pub fn max_vl(&self, grouping: Grouping) -> usize {
        grouping.lanes(self.vlen_bits)
    }

    /// Number of lanes the next loop iteration should cover.
    ///
    /// `avl` is the number of elements the loop still has to process. The
    /// result is `avl` whenever it fits in one group and the full group size
    /// otherwise, so repeatedly advancing by `vl` visits every element with
    /// no lane processed twice.
    #[inline]
    pub fn vl(&self, avl: usize, grouping: Grouping) -> usize {
        avl.min(self.max_vl(grouping))
    }
}

impl Default for VectorUnit {
    fn default() -> Self {
        VectorUnit::new()
    }
}

/// A variable-length vector of f32 lanes.
///
/// A `Vf32` holds between 0 and [`MAX_LANES`] active lanes. Arithmetic
/// requires both operands to have the same length, mirroring hardware where
/// the active length is machine state rather than a per-value property.
#[derive(Clone, Copy, Debug)]
pub struct Vf32 {
    lanes: [f32; MAX_LANES],
    len: usize,
}

impl Vf32 {
    /// Return a vector of `len` zero lanes.
    #[inline]
    pub fn zero(len: usize) -> Vf32 {
        assert!(len <= MAX_LANES);
        Vf32 {
            lanes: [0.; MAX_LANES],
            len,
        }
    }

    /// Return a vector with `len` lanes all set to `value`.
    #[inline]
    pub fn splat(value: f32, len: usize) -> Vf32 {
        let mut lanes = [0.; MAX_LANES];
        for lane in lanes[..len].iter_mut() {
            *lane = value;
        }
        Vf32 { lanes, len }
    }

    /// Load one lane from each element of `src`.
    #[inline]
    pub fn load(src: &[f32]) -> Vf32 {
        assert!(src.len() <= MAX_LANES);
        let mut lanes = [0.; MAX_LANES];
        for i in 0..src.len() {
            lanes[i] = src[i];
        }
        Vf32 {
            lanes,
            len: src.len(),
        }
    }

    /// Load `len` lanes starting at `src[0]`, reading elements `stride`
    /// apart.
    #[inline]
    pub fn load_strided(src: &[f32], stride: usize, len: usize) -> Vf32 {
        assert!(len <= MAX_LANES);
        let mut lanes = [0.; MAX_LANES];
        for i in 0..len {
            lanes[i] = src[i * stride];
        }
        Vf32 { lanes, len }
    }

    /// Number of active lanes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Return true if the vector has no active lanes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Write the active lanes to `dest`, whose length must equal
    /// [`len`](Vf32::len).
    #[inline]
    pub fn store(&self, dest: &mut [f32]) {
        assert!(dest.len() == self.len);
        for i in 0..self.len {
            dest[i] = self.lanes[i];
        }
    }

    /// Return `self + scale * v` evaluated lanewise.
    ///
    /// Each lane is computed with a single rounding, matching a fused
    /// multiply-add against a broadcast scalar. Results therefore depend
    /// only on the sequence of accumulation steps, not on the register width
    /// or grouping a loop happens to run at.
    #[inline]
    pub fn mul_add_scalar(self, scale: f32, v: Vf32) -> Vf32 {
        assert!(v.len == self.len);
        let mut out = self;
        for i in 0..self.len {
            out.lanes[i] = f32::mul_add(scale, v.lanes[i], self.lanes[i]);
        }
        out
    }

    /// Return `self + v` evaluated lanewise.
    #[inline]
    pub fn add(self, v: Vf32) -> Vf32 {
        assert!(v.len == self.len);
        let mut out = self;
        for i in 0..self.len {
            out.lanes[i] += v.lanes[i];
        }
        out
    }
}
