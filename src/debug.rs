//! Compact formatting of vectors for debug and trace logging.

use num_complex::Complex64;
use pretty_dtoa::{dtoa, FmtFloatConfig};

const FLOAT_CONFIG: FmtFloatConfig = FmtFloatConfig::default()
    .add_point_zero(false)
    .max_significant_digits(9);

fn join<T>(v: &[T], f: impl Fn(&T) -> String) -> String {
    let a: Vec<String> = v.iter().map(f).collect();
    format!("[{}]", a.join(", "))
}

pub fn format_f64_vec(v: &[f64]) -> String {
    join(v, |&f| dtoa(f, FLOAT_CONFIG))
}

/// Formats complex values as `re±jim`.
pub fn format_rect_vec(v: &[Complex64]) -> String {
    join(v, |z| {
        format!(
            "{}{}j{}",
            dtoa(z.re, FLOAT_CONFIG),
            if z.im.is_sign_negative() { "-" } else { "+" },
            dtoa(z.im.abs(), FLOAT_CONFIG)
        )
    })
}

/// Formats complex values as magnitude and angle in degrees.
pub fn format_polar_vec(v: &[Complex64]) -> String {
    join(v, |z| {
        format!(
            "{}\u{2220}{}\u{00B0}",
            dtoa(z.norm(), FLOAT_CONFIG),
            dtoa(z.arg().to_degrees(), FLOAT_CONFIG)
        )
    })
}
