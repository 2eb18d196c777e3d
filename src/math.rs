// Copyright (c) 2022-2024, Richard Lincoln. All rights reserved.

use num_complex::Complex64;

pub const J: Complex64 = Complex64 { re: 0.0, im: 1.0 };

#[macro_export]
macro_rules! cmplx {
    () => {
        num_complex::Complex64::new(0.0, 0.0)
    };
    ($arg1:expr) => {
        num_complex::Complex64::new($arg1, 0.0)
    };
    ($arg1:expr, $arg2:expr) => {
        num_complex::Complex64::new($arg1, $arg2)
    };
}

/// Computes the infinity norm: `max(abs(a))`. Zero for an empty slice.
/// NaN entries propagate so that a diverged iterate never passes a
/// tolerance check.
pub fn norm_inf(a: &[f64]) -> f64 {
    a.iter().fold(0.0, |max: f64, v| {
        if max.is_nan() || v.is_nan() {
            f64::NAN
        } else {
            max.max(v.abs())
        }
    })
}

/// Returns the elements of `a` at the given indexes.
pub fn select<T: Copy>(a: &[T], ix: &[usize]) -> Vec<T> {
    ix.iter().map(|&i| a[i]).collect()
}

pub fn from_polar(vm: &[f64], va: &[f64]) -> Vec<Complex64> {
    vm.iter()
        .zip(va)
        .map(|(&m, &a)| Complex64::from_polar(m, a))
        .collect()
}
