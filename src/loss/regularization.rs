//! Regularization of degenerate splat scalings.

pub use super::*;

use burn::tensor::{Bool, ElementConversion};
use std::fmt;

/// Penalizing splats whose scalings are too big or nearly collapsed.
#[derive(Config, Copy, Debug)]
pub struct ScaleRegularizer {
    /// Scalings above it are penalized with `weight * scaling`.
    #[config(default = "20.0")]
    pub big_threshold: f64,

    /// Scalings below it are penalized with `-weight * ln(scaling)`.
    #[config(default = "1e-5")]
    pub small_threshold: f64,

    #[config(default = "0.1")]
    pub weight: f64,
}

/// The penalties and the counts of offending scalings.
#[derive(Clone)]
pub struct ScaleRegularization<B: Backend> {
    /// `[1]`
    pub big_loss: Tensor<B, 1>,
    pub big_count: usize,
    /// `[1]`
    pub small_loss: Tensor<B, 1>,
    pub small_count: usize,
}

impl ScaleRegularizer {
    /// Computing both penalties for the scalings of any shape.
    pub fn regularize<B: Backend, const D: usize>(
        &self,
        scalings: Tensor<B, D>,
    ) -> ScaleRegularization<B> {
        let (big_loss, big_count) = self.big_penalty(scalings.to_owned());
        let (small_loss, small_count) = self.small_penalty(scalings);

        ScaleRegularization {
            big_loss,
            big_count,
            small_loss,
            small_count,
        }
    }

    /// The mean of `weight * scaling` over the scalings above
    /// [`Self::big_threshold`].
    ///
    /// It is exactly zero if no scaling exceeds the threshold.
    pub fn big_penalty<B: Backend, const D: usize>(
        &self,
        scalings: Tensor<B, D>,
    ) -> (Tensor<B, 1>, usize) {
        let device = scalings.device();
        let mask = scalings.to_owned().greater_elem(self.big_threshold);
        let count = Self::count(mask.to_owned());
        if count == 0 {
            return (Tensor::zeros([1], &device), 0);
        }

        let loss = scalings
            .mask_fill(mask.bool_not(), 0.0)
            .sum()
            .mul_scalar(self.weight)
            .div_scalar(count as f64);

        (loss, count)
    }

    /// The mean of `-weight * ln(scaling)` over the scalings below
    /// [`Self::small_threshold`].
    ///
    /// It is exactly zero if no scaling falls below the threshold.
    pub fn small_penalty<B: Backend, const D: usize>(
        &self,
        scalings: Tensor<B, D>,
    ) -> (Tensor<B, 1>, usize) {
        let device = scalings.device();
        let mask = scalings.to_owned().lower_elem(self.small_threshold);
        let count = Self::count(mask.to_owned());
        if count == 0 {
            return (Tensor::zeros([1], &device), 0);
        }

        // NOTE: The other scalings are filled with one, whose logarithm is zero.
        let loss = scalings
            .mask_fill(mask.bool_not(), 1.0)
            .log()
            .neg()
            .sum()
            .mul_scalar(self.weight)
            .div_scalar(count as f64);

        (loss, count)
    }

    #[inline]
    fn count<B: Backend, const D: usize>(mask: Tensor<B, D, Bool>) -> usize {
        mask.int().sum().into_scalar().elem::<i64>() as usize
    }
}

impl<B: Backend> ScaleRegularization<B> {
    /// `big_loss + small_loss`
    #[inline]
    pub fn total(&self) -> Tensor<B, 1> {
        self.big_loss.to_owned() + self.small_loss.to_owned()
    }
}

impl Default for ScaleRegularizer {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> fmt::Debug for ScaleRegularization<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("ScaleRegularization<{}>", B::name()))
            .field("big_count", &self.big_count)
            .field("small_count", &self.small_count)
            .finish()
    }
}
