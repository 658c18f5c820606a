//! Numerical utilities for logits and probability vectors.

pub trait SliceExt {
    fn sum(&self) -> f64;
    /// Arithmetic mean; zero for an empty slice.
    fn mean(&self) -> f64;
    fn scale(&mut self, factor: f64);
    fn dot(&self, other: &[f64]) -> f64;
    /// Largest absolute element; zero for an empty slice.
    fn norm_inf(&self) -> f64;
}
impl SliceExt for [f64] {
    fn sum(&self) -> f64 {
        self.iter().sum()
    }

    fn mean(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.sum() / self.len() as f64
        }
    }

    fn scale(&mut self, factor: f64) {
        for element in self {
            *element *= factor;
        }
    }

    fn dot(&self, other: &[f64]) -> f64 {
        debug_assert_eq!(
            self.len(),
            other.len(),
            "lengths do not match: {} ≠ {}",
            self.len(),
            other.len()
        );
        self.iter().zip(other).map(|(a, b)| a * b).sum()
    }

    fn norm_inf(&self) -> f64 {
        self.iter().fold(0.0, |max, element| f64::max(max, element.abs()))
    }
}

/// Inverse logit, 1 / (1 + e<sup>−x</sup>).
#[inline]
pub fn logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let exp = x.exp();
        exp / (1.0 + exp)
    }
}

/// ln(1 + e<sup>x</sup>) without overflow for large `x`.
#[inline]
pub fn log1p_exp(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

/// ln Σ e<sup>x<sub>i</sub></sup>, shifted by the maximum.
pub fn log_sum_exp(logits: &[f64]) -> f64 {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + logits.iter().map(|logit| (logit - max).exp()).sum::<f64>().ln()
}

/// Writes the softmax of `logits` into `probs`, returning the log normaliser.
pub fn softmax(logits: &[f64], probs: &mut [f64]) -> f64 {
    let normaliser = log_sum_exp(logits);
    for (prob, logit) in probs.iter_mut().zip(logits) {
        *prob = (logit - normaliser).exp();
    }
    normaliser
}
