//! Numerical stability helpers for the closed-form geometric maps.

/// Clamps a cosine to `[-1, 1]` before `acos`.
pub fn clamp_cosine(cos: f64) -> f64 {
    cos.clamp(-1.0, 1.0)
}

/// `sin(x) / x`, continuous at zero.
pub fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-6 {
        1.0 - x * x / 6.0
    } else {
        x.sin() / x
    }
}

/// `x / sin(x)`, continuous at zero.
pub fn inv_sinc(x: f64) -> f64 {
    if x.abs() < 1e-6 {
        1.0 + x * x / 6.0
    } else {
        x / x.sin()
    }
}

/// True when every value is finite.
pub fn all_finite<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> bool {
    values.into_iter().all(|x| x.is_finite())
}
