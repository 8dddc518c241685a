//! Training objectives.

pub mod metric;
pub mod regularization;

pub use crate::error::Error;
pub use burn::{
    config::Config,
    tensor::{backend::Backend, Tensor},
};
pub use metric::*;
pub use regularization::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The pixel-wise loss between the rendered and the target images.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PixelLossKind {
    /// Mean absolute error
    L1,
    /// Mean squared error
    #[default]
    L2,
}

/// A learned perceptual image distance, e.g., LPIPS.
pub trait PerceptualLoss<B: Backend> {
    /// ## Shapes
    ///
    /// * `lhs` - `[N, 3, H, W]`, ranging from `-1.0` to `1.0`
    /// * `rhs` - `[N, 3, H, W]`, ranging from `-1.0` to `1.0`
    /// * output - `[N]`
    fn distance(
        &self,
        lhs: Tensor<B, 4>,
        rhs: Tensor<B, 4>,
    ) -> Tensor<B, 1>;
}

/// The weights of the image losses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LossWeights {
    /// `lambda_l12`
    pub pixel: f64,
    /// `lambda_lpips`
    pub perceptual: f64,
}

/// The composition of the image losses and the scale regularization.
pub struct Objective<B: Backend> {
    pub perceptual_loss: Option<Box<dyn PerceptualLoss<B>>>,
    pub pixel_loss: PixelLossKind,
    pub regularizer: Option<ScaleRegularizer>,
    pub weights: LossWeights,
}

/// The terms of a composed loss.
#[derive(Clone)]
pub struct LossTerms<B: Backend> {
    /// `[1]`
    pub total: Tensor<B, 1>,
    /// `[1]`
    pub pixel: Tensor<B, 1>,
    /// `[1]`
    pub perceptual: Option<Tensor<B, 1>>,
    pub regularization: Option<ScaleRegularization<B>>,
}

impl PixelLossKind {
    /// Reducing the element-wise error of the images to a mean.
    pub fn forward<B: Backend, const D: usize>(
        self,
        rendered: Tensor<B, D>,
        target: Tensor<B, D>,
    ) -> Tensor<B, 1> {
        let error = rendered - target;
        match self {
            Self::L1 => error.abs().mean(),
            Self::L2 => error.powf_scalar(2.0).mean(),
        }
    }
}

impl LossWeights {
    /// The pixel weight complements the perceptual weight to one.
    #[inline]
    pub fn from_perceptual(lambda_lpips: f64) -> Self {
        Self {
            pixel: 1.0 - lambda_lpips,
            perceptual: lambda_lpips,
        }
    }

    #[inline]
    pub fn has_perceptual(&self) -> bool {
        self.perceptual != 0.0
    }
}

impl<B: Backend> Objective<B> {
    pub fn new(
        pixel_loss: PixelLossKind,
        weights: LossWeights,
        perceptual_loss: Option<Box<dyn PerceptualLoss<B>>>,
        regularizer: Option<ScaleRegularizer>,
    ) -> Result<Self, Error> {
        if weights.has_perceptual() && perceptual_loss.is_none() {
            return Err(Error::Validation(
                "perceptual loss".into(),
                "provided when its weight is non-zero".into(),
            ));
        }

        Ok(Self {
            perceptual_loss,
            pixel_loss,
            regularizer,
            weights,
        })
    }

    /// Regularizing the scalings if the objective has a regularizer.
    #[inline]
    pub fn regularize<const D: usize>(
        &self,
        scalings: Tensor<B, D>,
    ) -> Option<ScaleRegularization<B>> {
        self.regularizer
            .as_ref()
            .map(|regularizer| regularizer.regularize(scalings))
    }

    /// Composing the weighted image losses with the regularization.
    ///
    /// ## Shapes
    ///
    /// * `rendered` - `[N, 3, H, W]`, ranging from `0.0` to `1.0`
    /// * `target` - `[N, 3, H, W]`, ranging from `0.0` to `1.0`
    pub fn compose(
        &self,
        rendered: Tensor<B, 4>,
        target: Tensor<B, 4>,
        regularization: Option<ScaleRegularization<B>>,
    ) -> LossTerms<B> {
        let pixel = self
            .pixel_loss
            .forward(rendered.to_owned(), target.to_owned());

        let perceptual = self
            .perceptual_loss
            .as_ref()
            .filter(|_| self.weights.has_perceptual())
            .map(|metric| {
                metric
                    .distance(
                        rendered.mul_scalar(2.0).sub_scalar(1.0),
                        target.mul_scalar(2.0).sub_scalar(1.0),
                    )
                    .mean()
            });

        let mut total = pixel.to_owned().mul_scalar(self.weights.pixel);
        if let Some(perceptual) = &perceptual {
            total = total
                + perceptual.to_owned().mul_scalar(self.weights.perceptual);
        }
        if let Some(regularization) = &regularization {
            total = total + regularization.total();
        }

        LossTerms {
            total,
            pixel,
            perceptual,
            regularization,
        }
    }
}

impl<B: Backend> fmt::Debug for Objective<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("Objective<{}>", B::name()))
            .field("has_perceptual_loss", &self.perceptual_loss.is_some())
            .field("pixel_loss", &self.pixel_loss)
            .field("regularizer", &self.regularizer)
            .field("weights", &self.weights)
            .finish()
    }
}
