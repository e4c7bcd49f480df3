//! Digamma function.
//!
//! Recurrence ψ(x) = ψ(x+1) − 1/x pushes the argument above 10, then the
//! asymptotic series (Bernoulli terms up to x^-10) finishes the job.

const ASYMPTOTIC_THRESHOLD: f64 = 10.0;

/// ψ(x) for positive real `x`. Non-positive or non-finite input yields NaN.
#[must_use]
pub fn digamma(x: f64) -> f64 {
    if !x.is_finite() || x <= 0.0 {
        return f64::NAN;
    }
    let mut x = x;
    let mut shift = 0.0;
    while x < ASYMPTOTIC_THRESHOLD {
        shift -= 1.0 / x;
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    let series = inv2
        * (1.0 / 12.0
            - inv2 * (1.0 / 120.0 - inv2 * (1.0 / 252.0 - inv2 * (1.0 / 240.0 - inv2 / 132.0))));
    shift + x.ln() - 0.5 * inv - series
}

/// ψ(n) for a count.
#[must_use]
pub fn digamma_count(n: usize) -> f64 {
    digamma(n as f64)
}
