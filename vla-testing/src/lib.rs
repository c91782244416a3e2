//! Internal testing utilities for the vla-gemm crates.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

/// Utility for creating parametrized (aka. table-driven) tests.
///
/// To create a table driven test:
///
/// 1. Import the `TestCases` trait
/// 2. Create a struct, conventionally named `Case`, that contains the data
///    for a single test case. This struct must implement `Debug`.
/// 3. Create a collection of `Case` instances (eg. an array or Vec),
///    conventionally named `cases`.
/// 4. Call `cases.test_each`, passing the test function as a closure
///
/// `test_each` runs every case and catches any panics, so a failure in one
/// case does not hide failures in later ones. If all cases pass, `test_each`
/// returns. Otherwise it panics with the count and debug representations of
/// the failing cases.
///
/// ## Example
///
/// ```
/// use vla_testing::TestCases;
///
/// // Add #[test] attribute
/// fn test_round_up() {
///   #[derive(Debug)]
///   struct Case {
///     value: usize,
///     factor: usize,
///     expected: usize,
///   }
///
///   let cases = [
///     Case { value: 5, factor: 4, expected: 8 },
///     Case { value: 8, factor: 4, expected: 8 },
///   ];
///
///   cases.test_each(|&Case { value, factor, expected }| {
///     assert_eq!(value.next_multiple_of(factor), expected);
///   });
/// }
/// # test_round_up();
/// ```
///
/// ## Unwind safety
///
/// Both test cases and the test function are required to be
/// [unwind safe](https://doc.rust-lang.org/std/panic/fn.catch_unwind.html).
///
/// Practically this means that the test case items and any values _captured_
/// by the test function closure must not contain interior mutability. If a
/// field or captured value does not satisfy this, either replace it with a
/// simpler description of how to construct the value inside the test
/// function, or wrap it with
/// [`AssertUnwindSafe`](std::panic::AssertUnwindSafe).
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call test function `test` with each test case in `self`, catching any panics.
    ///
    /// After all cases have been evaluated, return if no panics occurred or
    /// panic with details of failing cases otherwise.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Variant of [`test_each`](TestCases::test_each) which passes test cases
    /// to the test function by value.
    ///
    /// To support printing a debug representation of the case in the event
    /// of an error, each test case is formatted to a string before the test
    /// function is called. This adds a small amount of overhead compared to
    /// [`test_each`](TestCases::test_each).
    fn test_each_value(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe;
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let mut failures = Vec::new();
        for case in self {
            if std::panic::catch_unwind(|| {
                test(&case);
            })
            .is_err()
            {
                failures.push(case);
            }
        }
        assert_eq!(
            failures.len(),
            0,
            "{} test cases failed: {:?}",
            failures.len(),
            failures
        );
    }

    fn test_each_value(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe,
    {
        let mut failures = Vec::new();
        for case in self {
            let test = &test;
            let case_str = format!("{:?}", case);

            if std::panic::catch_unwind(move || {
                test(case);
            })
            .is_err()
            {
                failures.push(case_str);
            }
        }
        assert_eq!(
            failures.len(),
            0,
            "{} test cases failed: {:?}",
            failures.len(),
            failures
        );
    }
}

/// Compare two f32 slices elementwise and panic if any pair differs by more
/// than `atol + rtol * expected.abs()`.
///
/// The comparison is written so that a NaN on either side counts as a
/// mismatch.
pub fn expect_allclose(actual: &[f32], expected: &[f32], atol: f32, rtol: f32) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "lengths differ: {} vs {}",
        actual.len(),
        expected.len()
    );
    let mut mismatches = Vec::new();
    for (i, (&x, &y)) in actual.iter().zip(expected.iter()).enumerate() {
        let tolerance = atol + rtol * y.abs();
        let close = (x - y).abs() <= tolerance;
        if !close {
            mismatches.push((i, x, y));
        }
    }
    if let Some(&(i, x, y)) = mismatches.first() {
        panic!(
            "{} of {} elements differ. First mismatch at index {}: {} vs {}",
            mismatches.len(),
            actual.len(),
            i,
            x,
            y
        );
    }
}
